// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Learned door detector — runs a `.rten` object-detection model trained on
// floor-plan door symbols.
//
// The model is loaded once per run and shared read-only across page workers.
// Input is the page letterboxed to the model's square input size, normalized
// to [0, 1] CHW; output is decoded as candidate rows of
// (center-x, center-y, width, height, objectness) in input coordinates.

use std::path::Path;

use image::imageops::FilterType;
use rten::Model;
use rten_tensor::{AsView, Layout, NdTensor};
use tracing::{debug, info, instrument};

use doorgauge_core::error::{DoorgaugeError, Result};
use doorgauge_core::types::{BoundingBox, Detection, DetectionSource};
use doorgauge_document::PageImage;

use crate::detect::{DoorDetector, suppress_overlaps};

/// Square input side the page is letterboxed to.
const INPUT_SIZE: usize = 640;

/// Candidates below this objectness are decode noise, discarded before NMS.
/// The caller-configured confidence threshold is applied later, at
/// measurement, so filtered-but-plausible candidates stay auditable.
const DECODE_FLOOR: f32 = 0.25;

/// Overlap above this collapses candidates into the strongest one.
const NMS_IOU: f64 = 0.5;

#[derive(Debug)]
pub struct LearnedDoorDetector {
    model: Model,
}

impl LearnedDoorDetector {
    /// Load the detection model from a `.rten` file.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        let model = Model::load_file(path_ref).map_err(|err| {
            DoorgaugeError::Model(format!(
                "failed to load detection model from {}: {}",
                path_ref.display(),
                err
            ))
        })?;
        info!("Door detection model loaded");
        Ok(Self { model })
    }

    /// Build the normalized CHW input tensor, top-left anchored, and return it
    /// with the letterbox scale factor.
    fn prepare_input(&self, page: &PageImage) -> (NdTensor<f32, 4>, f32) {
        let (page_w, page_h) = page.image.dimensions();
        let scale = INPUT_SIZE as f32 / page_w.max(page_h) as f32;
        let new_w = ((page_w as f32 * scale) as u32).clamp(1, INPUT_SIZE as u32);
        let new_h = ((page_h as f32 * scale) as u32).clamp(1, INPUT_SIZE as u32);

        let resized = image::imageops::resize(&page.image, new_w, new_h, FilterType::Triangle);

        let mut input = NdTensor::zeros([1, 3, INPUT_SIZE, INPUT_SIZE]);
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                input[[0, c, y as usize, x as usize]] = pixel.0[c] as f32 / 255.0;
            }
        }
        (input, scale)
    }

    /// Decode model output rows back into page-space detections.
    fn decode(&self, output: &NdTensor<f32, 3>, page: &PageImage, scale: f32) -> Vec<Detection> {
        let shape = output.shape();
        // Either (1, candidates, attributes) or the transposed export layout
        // (1, attributes, candidates); attribute count is small either way.
        let transposed = shape[1] <= 8 && shape[2] > 8;
        let (candidates, attributes) = if transposed {
            (shape[2], shape[1])
        } else {
            (shape[1], shape[2])
        };
        if attributes < 5 {
            debug!(?shape, "Model output has too few attributes; no detections");
            return Vec::new();
        }

        let at = |i: usize, a: usize| -> f32 {
            if transposed {
                output[[0, a, i]]
            } else {
                output[[0, i, a]]
            }
        };

        let (page_w, page_h) = page.image.dimensions();
        let mut detections = Vec::new();

        for i in 0..candidates {
            let confidence = at(i, 4);
            if confidence < DECODE_FLOOR {
                continue;
            }

            let cx = at(i, 0) / scale;
            let cy = at(i, 1) / scale;
            let w = at(i, 2) / scale;
            let h = at(i, 3) / scale;

            let x1 = (cx - w / 2.0).clamp(0.0, page_w as f32 - 1.0);
            let y1 = (cy - h / 2.0).clamp(0.0, page_h as f32 - 1.0);
            let x2 = (cx + w / 2.0).clamp(0.0, page_w as f32);
            let y2 = (cy + h / 2.0).clamp(0.0, page_h as f32);

            let bbox = BoundingBox::new(
                x1 as u32,
                y1 as u32,
                (x2 - x1).max(0.0) as u32,
                (y2 - y1).max(0.0) as u32,
            );

            detections.push(Detection {
                bbox,
                angle_deg: None,
                confidence: confidence.clamp(0.0, 1.0),
                source: DetectionSource::LearnedModel,
            });
        }

        detections
    }
}

impl DoorDetector for LearnedDoorDetector {
    fn source(&self) -> DetectionSource {
        DetectionSource::LearnedModel
    }

    #[instrument(skip_all, fields(page = page.index))]
    fn detect(&self, page: &PageImage) -> Result<Vec<Detection>> {
        let (input, scale) = self.prepare_input(page);

        let output = self
            .model
            .run_one(input.view().into(), None)
            .map_err(|err| DoorgaugeError::Model(format!("model inference failed: {}", err)))?;

        let output: NdTensor<f32, 3> = output.try_into().map_err(|_| {
            DoorgaugeError::Model("model output is not a rank-3 float tensor".into())
        })?;

        let detections = self.decode(&output, page, scale);
        let kept = suppress_overlaps(detections, NMS_IOU);
        debug!(page = page.index, detections = kept.len(), "Learned detection complete");
        Ok(kept)
    }
}
