//! Fuzz target for polygon rasterization and contour extraction.

#![no_main]

use cvatkit::mask::{mask_to_contour_points, rasterize_polygon};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 4096 {
        return;
    }
    let points: Vec<f64> = data
        .chunks_exact(2)
        .map(|b| f64::from(i16::from_le_bytes([b[0], b[1]])) / 256.0)
        .collect();

    if let Ok(mask) = rasterize_polygon(&points, 48, 48) {
        let _ = mask_to_contour_points(&mask);
    }
});
