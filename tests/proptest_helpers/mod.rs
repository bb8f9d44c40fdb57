#![allow(dead_code)]

use cvatkit::mask::{Mask, RleBox};
use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// A mask of up to `max_side` x `max_side` pixels with random foreground.
pub fn arb_mask(max_side: u32) -> impl Strategy<Value = Mask> {
    (1..=max_side, 1..=max_side).prop_flat_map(|(width, height)| {
        prop::collection::vec(any::<bool>(), (width * height) as usize).prop_map(move |cells| {
            let mut mask = Mask::new(width, height);
            for (i, on) in cells.into_iter().enumerate() {
                let x = (i as u32 % width) as i64;
                let y = (i as u32 / width) as i64;
                mask.set(x, y, on);
            }
            mask
        })
    })
}

/// A mask together with a box that fits inside it.
pub fn arb_mask_and_box(max_side: u32) -> impl Strategy<Value = (Mask, RleBox)> {
    arb_mask(max_side).prop_flat_map(|mask| {
        let (w, h) = (mask.width(), mask.height());
        (0..w, 0..h)
            .prop_flat_map(move |(left, top)| (Just(left), Just(top), left..w, top..h))
            .prop_map(move |(left, top, right, bottom)| {
                (
                    mask.clone(),
                    RleBox {
                        left,
                        top,
                        right,
                        bottom,
                    },
                )
            })
    })
}

/// Foreground cells of `mask` restricted to `rle_box`.
pub fn restrict(mask: &Mask, rle_box: RleBox) -> Mask {
    let mut out = Mask::new(mask.width(), mask.height());
    for y in rle_box.top..=rle_box.bottom {
        for x in rle_box.left..=rle_box.right {
            let (x, y) = (i64::from(x), i64::from(y));
            out.set(x, y, mask.get(x, y));
        }
    }
    out
}
