//! Criterion microbenches for the mask codec and annotation normalization.
//!
//! Run with: `cargo bench`
//!
//! These benchmarks measure the performance of:
//! - RLE mask decoding and encoding (decode_rle, encode_rle)
//! - Contour extraction (mask_to_contour_points)
//! - Normalizing a job's annotations (Normalizer::normalize_annotations)

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

use cvatkit::api::models::{Annotations, Job, Label, Task, TaskMeta};
use cvatkit::mask::{decode_rle, encode_rle, mask_to_contour_points, rasterize_polygon, RleBox};
use cvatkit::normalize::{LabelMap, NormalizeOptions, Normalizer};
use cvatkit::reconcile::reconcile_frames;
use cvatkit::report::ErrorSink;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

/// An ellipse-like blob rasterized from a 64-gon, so runs vary per row.
fn blob_points() -> Vec<f64> {
    (0..64)
        .flat_map(|i| {
            let t = i as f64 / 64.0 * std::f64::consts::TAU;
            [320.0 + 200.0 * t.cos(), 240.0 + 150.0 * t.sin()]
        })
        .collect()
}

fn bench_rle(c: &mut Criterion) {
    let mask = rasterize_polygon(&blob_points(), HEIGHT, WIDTH).expect("rasterize blob");
    let rle_box = RleBox::around(&mask).expect("blob is not empty");
    let encoded = encode_rle(&mask, rle_box).expect("encode blob");

    let mut group = c.benchmark_group("rle");
    group.throughput(Throughput::Elements(rle_box.area() as u64));

    group.bench_function("decode_rle", |b| {
        b.iter(|| {
            let mask = decode_rle(black_box(&encoded), HEIGHT, WIDTH).unwrap();
            black_box(mask)
        })
    });

    group.bench_function("encode_rle", |b| {
        b.iter(|| {
            let runs = encode_rle(black_box(&mask), rle_box).unwrap();
            black_box(runs)
        })
    });

    group.finish();
}

fn bench_contour(c: &mut Criterion) {
    let mask = rasterize_polygon(&blob_points(), HEIGHT, WIDTH).expect("rasterize blob");

    let mut group = c.benchmark_group("contour");
    group.throughput(Throughput::Elements(u64::from(WIDTH * HEIGHT)));

    group.bench_function("mask_to_contour_points", |b| {
        b.iter(|| {
            let points = mask_to_contour_points(black_box(&mask)).unwrap();
            black_box(points)
        })
    });

    group.finish();
}

/// Benchmark normalizing 500 shapes and a 100-frame track over 100 frames.
fn bench_normalize(c: &mut Criterion) {
    let task: Task = serde_json::from_value(serde_json::json!({"id": 1, "name": "bench"}))
        .expect("task fixture");
    let meta: TaskMeta = serde_json::from_value(serde_json::json!({
        "start_frame": 0,
        "stop_frame": 99,
        "frames": (0..100)
            .map(|i| serde_json::json!({"width": WIDTH, "height": HEIGHT, "name": format!("f{i:03}.jpg")}))
            .collect::<Vec<_>>(),
    }))
    .expect("meta fixture");
    let jobs: Vec<Job> = serde_json::from_value(serde_json::json!([
        {"id": 1, "task_id": 1, "status": "completed", "start_frame": 0, "stop_frame": 99}
    ]))
    .expect("job fixture");
    let labels: Vec<Label> = serde_json::from_value(serde_json::json!([
        {"id": 1, "name": "car", "attributes": [{"id": 10, "name": "color"}]}
    ]))
    .expect("label fixture");
    let annotations: Annotations = serde_json::from_value(serde_json::json!({
        "shapes": (0..500)
            .map(|i| serde_json::json!({
                "frame": i % 100, "label_id": 1, "type": "polygon",
                "points": [1.0, 1.0, 30.0, 2.0, 25.0, 40.0, 3.0, 35.0],
                "attributes": [{"spec_id": 10, "value": "red"}]
            }))
            .collect::<Vec<_>>(),
        "tracks": [{
            "id": 1, "frame": 0, "label_id": 1,
            "attributes": [{"spec_id": 10, "value": "blue"}],
            "shapes": (0..100)
                .map(|i| serde_json::json!({"frame": i, "type": "rectangle", "points": [0.0, 0.0, 9.0, 9.0]}))
                .collect::<Vec<_>>(),
        }],
    }))
    .expect("annotation fixture");

    let table = reconcile_frames(&task, &meta, &jobs).expect("reconcile fixture");
    let label_map = LabelMap::from_labels(&labels);
    let normalizer = Normalizer::new(&table, &label_map, NormalizeOptions::all());

    let mut group = c.benchmark_group("normalize");
    group.throughput(Throughput::Elements(600));

    group.bench_function("normalize_annotations", |b| {
        b.iter(|| {
            let mut sink = ErrorSink::new();
            let records = normalizer
                .normalize_annotations(black_box(&annotations), &mut sink)
                .unwrap();
            black_box(records)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_rle, bench_contour, bench_normalize);
criterion_main!(benches);
