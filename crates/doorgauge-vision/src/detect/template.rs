// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Template-matching door detector — the deterministic fallback when no
// learned model is available.
//
// A door appears on a plan as a leaf rectangle with a quarter-circle swing
// arc. The detector synthesizes that signature as an edge template, matches
// it against the page's Canny edge map at several scales with normalized
// cross-correlation, and de-duplicates overlapping hits. Recall is
// intentionally modest; misses are preferred over invented doors.

use image::GrayImage;
use imageproc::edges::canny;
use imageproc::template_matching::{MatchTemplateMethod, match_template};
use tracing::{debug, instrument};

use doorgauge_core::error::Result;
use doorgauge_core::types::{BoundingBox, Detection, DetectionSource};
use doorgauge_document::PageImage;

use crate::detect::{DoorDetector, suppress_overlaps};

/// Side of the synthesized base template, sized for a door at roughly 1:50
/// and 400 DPI before scaling.
const TEMPLATE_SIDE: u32 = 50;

/// Scales the template is matched at, covering common drawing ratios.
const MATCH_SCALES: [f32; 5] = [0.5, 0.75, 1.0, 1.5, 2.0];

/// Default normalized cross-correlation score below which a hit is discarded.
const SCORE_THRESHOLD: f32 = 0.6;

/// Overlap above this collapses hits into the strongest one.
const NMS_IOU: f64 = 0.5;

pub struct TemplateDoorDetector {
    templates: Vec<GrayImage>,
    score_threshold: f32,
}

impl TemplateDoorDetector {
    pub fn new() -> Self {
        Self {
            templates: vec![synthesize_door_template()],
            score_threshold: SCORE_THRESHOLD,
        }
    }

    /// Override the match score cutoff. Lower values trade false positives
    /// for recall on faint or stylized symbols.
    pub fn with_score_threshold(mut self, score_threshold: f32) -> Self {
        self.score_threshold = score_threshold;
        self
    }
}

impl Default for TemplateDoorDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl DoorDetector for TemplateDoorDetector {
    fn source(&self) -> DetectionSource {
        DetectionSource::TemplateMatch
    }

    #[instrument(skip_all, fields(page = page.index))]
    fn detect(&self, page: &PageImage) -> Result<Vec<Detection>> {
        let gray = image::DynamicImage::ImageRgb8(page.image.clone()).to_luma8();
        let edges = canny(&gray, 50.0, 150.0);

        let mut candidates = Vec::new();

        for template in &self.templates {
            for scale in MATCH_SCALES {
                let tw = ((TEMPLATE_SIDE as f32 * scale) as u32).max(8);
                let th = tw;
                if tw > edges.width() || th > edges.height() {
                    continue;
                }
                let resized = image::imageops::resize(
                    template,
                    tw,
                    th,
                    image::imageops::FilterType::Triangle,
                );

                let scores = match_template(
                    &edges,
                    &resized,
                    MatchTemplateMethod::CrossCorrelationNormalized,
                );

                for (x, y, score) in scores.enumerate_pixels() {
                    let score = score.0[0];
                    if score >= self.score_threshold {
                        candidates.push(Detection {
                            bbox: BoundingBox::new(x, y, tw, th),
                            angle_deg: None,
                            confidence: score.clamp(0.0, 1.0),
                            source: DetectionSource::TemplateMatch,
                        });
                    }
                }
            }
        }

        let kept = suppress_overlaps(candidates, NMS_IOU);
        debug!(
            page = page.index,
            detections = kept.len(),
            "Template matching complete"
        );
        Ok(kept)
    }
}

/// Draw the door signature as an edge image: a leaf rectangle at the hinge
/// side and a quarter-circle swing arc, white strokes on black, matching the
/// polarity of a Canny edge map.
fn synthesize_door_template() -> GrayImage {
    use image::Luma;
    use imageproc::drawing::draw_hollow_rect_mut;
    use imageproc::rect::Rect;

    let mut template = GrayImage::new(TEMPLATE_SIDE, TEMPLATE_SIDE);

    // Door leaf: a thin rectangle on the hinge edge.
    draw_hollow_rect_mut(
        &mut template,
        Rect::at(0, 20).of_size(6, 11),
        Luma([255u8]),
    );

    // Swing arc: quarter circle around the hinge at (5, 25), radius 20,
    // sweeping from straight down to the closed position.
    let (hinge_x, hinge_y, radius) = (5.0f32, 25.0f32, 20.0f32);
    let mut angle = 270.0f32;
    while angle <= 360.0 {
        let rad = angle.to_radians();
        let x = hinge_x + radius * rad.cos();
        let y = hinge_y + radius * rad.sin();
        if x >= 0.0 && y >= 0.0 && (x as u32) < TEMPLATE_SIDE && (y as u32) < TEMPLATE_SIDE {
            template.put_pixel(x as u32, y as u32, Luma([255u8]));
        }
        angle += 1.0;
    }

    template
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn template_has_ink() {
        let template = synthesize_door_template();
        let ink = template.pixels().filter(|p| p.0[0] > 0).count();
        assert!(ink > 50, "template should carry arc and leaf strokes, got {ink}");
    }

    /// Stamping the template's own pattern onto a clean page must produce at
    /// least one detection over the stamped location.
    #[test]
    fn finds_planted_door_symbol() {
        let template = synthesize_door_template();
        let mut page_img = RgbImage::from_pixel(300, 300, Rgb([255u8, 255, 255]));

        // Plant the symbol as dark ink at (100, 120).
        for (tx, ty, pixel) in template.enumerate_pixels() {
            if pixel.0[0] > 0 {
                page_img.put_pixel(100 + tx, 120 + ty, Rgb([0u8, 0, 0]));
            }
        }

        let page = PageImage {
            index: 0,
            dpi: 400,
            image: page_img,
        };

        // A relaxed cutoff keeps the assertion about localization, not the
        // absolute correlation value of a synthetic stamp.
        let detector = TemplateDoorDetector::new().with_score_threshold(0.35);
        let detections = detector.detect(&page).unwrap();

        assert!(
            detections.iter().any(|d| {
                let planted = BoundingBox::new(100, 120, TEMPLATE_SIDE, TEMPLATE_SIDE);
                d.bbox.iou(&planted) > 0.25
            }),
            "expected a detection overlapping the planted symbol, got {detections:?}"
        );
    }

    #[test]
    fn blank_page_yields_nothing() {
        let page = PageImage {
            index: 0,
            dpi: 400,
            image: RgbImage::from_pixel(200, 200, Rgb([255u8, 255, 255])),
        };
        let detector = TemplateDoorDetector::new();
        assert!(detector.detect(&page).unwrap().is_empty());
    }
}
