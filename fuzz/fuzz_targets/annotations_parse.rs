//! Fuzz target for job annotation and export payload parsing.

#![no_main]

use cvatkit::api::models::Annotations;
use cvatkit::assemble::ExportPayload;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = serde_json::from_slice::<Annotations>(data);
    let _ = serde_json::from_slice::<ExportPayload>(data);
});
