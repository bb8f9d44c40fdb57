//! Fuzz target for run-length mask decoding.
//!
//! The first two bytes pick the image size; the rest are read as
//! little-endian `f32` values (runs followed by box corners). Anything that
//! decodes must survive a re-encode/decode cycle unchanged.

#![no_main]

use cvatkit::mask::{decode_rle, encode_rle, RleBox};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 || data.len() > 64 * 1024 {
        return;
    }
    let width = u32::from(data[0] % 64) + 1;
    let height = u32::from(data[1] % 64) + 1;
    let points: Vec<f64> = data[2..]
        .chunks_exact(4)
        .map(|b| f64::from(f32::from_le_bytes([b[0], b[1], b[2], b[3]])))
        .collect();

    let Ok(mask) = decode_rle(&points, height, width) else {
        return;
    };
    if let Some(rle_box) = RleBox::around(&mask) {
        let encoded = encode_rle(&mask, rle_box).expect("box around mask fits");
        let decoded = decode_rle(&encoded, height, width).expect("encoded mask decodes");
        assert_eq!(decoded, mask);
    }
});
