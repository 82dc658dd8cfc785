// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the measurement hot path in the doorgauge-vision
// crate: one detection measured against a resolved scale, including the
// orientation estimate from the region's ink moments.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{Rgb, RgbImage};

use doorgauge_core::types::{BoundingBox, Detection, DetectionSource, Scale, ScaleSource};
use doorgauge_document::PageImage;
use doorgauge_vision::measure::{MeasureOutcome, MeasurementEngine};

/// Benchmark measuring a single axis-aligned door region on a small synthetic
/// page. This covers the crop, the adaptive binarization, and the moment
/// computation that run once per detection in a real document pass.
fn bench_measure_detection(c: &mut Criterion) {
    let bbox = BoundingBox::new(40, 30, 18, 40);
    let mut img = RgbImage::from_pixel(200, 200, Rgb([255u8, 255, 255]));
    for y in bbox.y..bbox.y + bbox.height {
        for x in bbox.x..bbox.x + bbox.width {
            img.put_pixel(x, y, Rgb([0u8, 0, 0]));
        }
    }
    let page = PageImage {
        index: 0,
        dpi: 400,
        image: img,
    };

    let detection = Detection {
        bbox,
        angle_deg: None,
        confidence: 0.9,
        source: DetectionSource::LearnedModel,
    };
    let scale = Scale::new(3.175, ScaleSource::TextRatio);
    let engine = MeasurementEngine::new(900.0, 0.5);

    c.bench_function("measure_detection (18x40 region)", |b| {
        b.iter(|| {
            let outcome = engine.measure(black_box(&page), scale, black_box(&detection));
            match outcome {
                MeasureOutcome::Door(record) => black_box(record.width_mm),
                MeasureOutcome::Skip(_) => panic!("benchmark detection must measure"),
            };
        });
    });
}

criterion_group!(benches, bench_measure_detection);
criterion_main!(benches);
