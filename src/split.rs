//! Train/test split of an exported dataset.
//!
//! Images are shuffled (deterministically when a seed is given) and a
//! `test_size` fraction of them moves to the test half. Annotations follow
//! their image. Images sharing an id always land on the same side.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};

use crate::assemble::ExportPayload;
use crate::error::CvatError;

/// Default fraction of images in the test half.
pub const DEFAULT_TEST_SIZE: f64 = 0.2;

/// Options for [`split_payload`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SplitOptions {
    /// Fraction of images assigned to the test half, in `(0, 1)`.
    pub test_size: f64,
    /// Random seed for a reproducible split.
    pub seed: Option<u64>,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            test_size: DEFAULT_TEST_SIZE,
            seed: None,
        }
    }
}

/// The two halves of a split. Both carry the source payload's `info`.
#[derive(Clone, Debug, PartialEq)]
pub struct SplitPayload {
    pub train: ExportPayload,
    pub test: ExportPayload,
}

/// Split `payload` into train and test halves.
///
/// The test half gets `ceil(n * test_size)` distinct image ids, clamped so
/// that neither half is empty. Images keep their original order within each
/// half.
///
/// # Errors
/// Returns [`CvatError::InvalidSplitParams`] if `test_size` is outside
/// `(0, 1)` or there are fewer than two distinct images.
pub fn split_payload(
    payload: &ExportPayload,
    options: &SplitOptions,
) -> Result<SplitPayload, CvatError> {
    if !(options.test_size > 0.0 && options.test_size < 1.0) {
        return Err(CvatError::InvalidSplitParams {
            message: format!("test size must be in (0, 1), got {}", options.test_size),
        });
    }

    let mut seen = HashSet::new();
    let mut ids: Vec<&str> = payload
        .images
        .iter()
        .map(|image| image.id.as_str())
        .filter(|id| seen.insert(*id))
        .collect();
    let n = ids.len();
    if n < 2 {
        return Err(CvatError::InvalidSplitParams {
            message: format!("need at least two distinct images to split, found {n}"),
        });
    }

    if let Some(seed) = options.seed {
        let mut rng = StdRng::seed_from_u64(seed);
        ids.shuffle(&mut rng);
    } else {
        let mut rng = rand::rng();
        ids.shuffle(&mut rng);
    }

    let test_count = ((n as f64 * options.test_size).ceil() as usize).clamp(1, n - 1);
    let test_ids: HashSet<&str> = ids[..test_count].iter().copied().collect();

    let half = |in_test: bool| ExportPayload {
        info: payload.info.clone(),
        images: payload
            .images
            .iter()
            .filter(|image| test_ids.contains(image.id.as_str()) == in_test)
            .cloned()
            .collect(),
        annotations: payload
            .annotations
            .iter()
            .filter(|record| test_ids.contains(record.image_id.as_str()) == in_test)
            .cloned()
            .collect(),
    };

    let split = SplitPayload {
        train: half(false),
        test: half(true),
    };
    log::info!(
        "Split {} image(s) into {} train / {} test",
        payload.images.len(),
        split.train.images.len(),
        split.test.images.len()
    );
    Ok(split)
}
