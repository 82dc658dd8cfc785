// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Door symbol detection.
//
// Two interchangeable detector variants behind one trait: a learned model
// (when a model file is configured) and a deterministic template-matching
// fallback. Detectors return every candidate above a small internal noise
// floor; the configured confidence threshold is applied by the measurement
// engine so that weak detections become auditable low-confidence skips
// instead of silently vanishing.

pub mod learned;
pub mod template;

use std::sync::Arc;

use tracing::{info, warn};

use doorgauge_core::config::RunConfig;
use doorgauge_core::error::Result;
use doorgauge_core::types::{Detection, DetectionSource};
use doorgauge_document::PageImage;

pub use learned::LearnedDoorDetector;
pub use template::TemplateDoorDetector;

/// A door symbol detector. Implementations are `Send + Sync` so one instance
/// can be shared read-only across concurrent page workers.
pub trait DoorDetector: Send + Sync {
    /// Which provenance tag this detector's detections carry.
    fn source(&self) -> DetectionSource;

    /// Locate candidate door regions on a page. Detections are pure geometry
    /// plus confidence; they carry no measurement.
    fn detect(&self, page: &PageImage) -> Result<Vec<Detection>>;
}

/// Select the detector for a run, per configuration.
///
/// A configured model path selects the learned detector (loaded once here,
/// shared for the whole run). Without one, the template fallback is used and
/// its reduced recall is called out.
pub fn detector_for(config: &RunConfig) -> Result<Arc<dyn DoorDetector>> {
    match &config.model_path {
        Some(path) => {
            info!(model = %path.display(), "Using learned door detector");
            Ok(Arc::new(LearnedDoorDetector::load(path)?))
        }
        None => {
            warn!(
                "No detection model configured; falling back to template matching \
                 (lower recall, more missed doors)"
            );
            Ok(Arc::new(TemplateDoorDetector::new()))
        }
    }
}

/// Greedy intersection-over-union non-maximum suppression: keep the highest
/// confidence detection of each overlapping cluster.
pub fn suppress_overlaps(mut detections: Vec<Detection>, iou_threshold: f64) -> Vec<Detection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Detection> = Vec::new();
    for det in detections {
        if kept.iter().all(|k| k.bbox.iou(&det.bbox) <= iou_threshold) {
            kept.push(det);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use doorgauge_core::types::BoundingBox;

    fn det(x: u32, y: u32, confidence: f32) -> Detection {
        Detection {
            bbox: BoundingBox::new(x, y, 20, 40),
            angle_deg: None,
            confidence,
            source: DetectionSource::TemplateMatch,
        }
    }

    #[test]
    fn overlapping_detections_keep_highest_confidence() {
        let detections = vec![det(10, 10, 0.6), det(12, 10, 0.9), det(11, 11, 0.7)];
        let kept = suppress_overlaps(detections, 0.5);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn disjoint_detections_all_survive() {
        let detections = vec![det(0, 0, 0.6), det(200, 0, 0.7), det(0, 200, 0.8)];
        let kept = suppress_overlaps(detections, 0.5);
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert!(suppress_overlaps(Vec::new(), 0.5).is_empty());
    }
}
