// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// doorgauge-vision — Vision stages of the Doorgauge pipeline.
//
// Scale resolution (printed-ratio text and graphic bar scales over OCR), door
// symbol detection (learned model with a deterministic template-matching
// fallback), and the measurement engine that turns detections into audited
// door records.

pub mod detect;
pub mod measure;
pub mod ocr;
pub mod scale;

pub use detect::{DoorDetector, detector_for};
pub use measure::MeasurementEngine;
pub use ocr::{OcrConfig, TextRecognizer};
pub use scale::{ResolveScale, ScaleResolver};
