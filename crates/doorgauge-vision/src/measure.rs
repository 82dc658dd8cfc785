// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Measurement engine — turns a detection plus a resolved scale into an
// audited door record, or an explicit skip.
//
// This is the enforcement boundary for "guessing dimensions is not
// acceptable": without a resolved scale no record is ever produced.

use image::{DynamicImage, GrayImage};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use tracing::{debug, instrument};

use doorgauge_core::types::{Detection, DoorRecord, Scale, SkipReason, SkipRecord};
use doorgauge_document::PageImage;
use doorgauge_document::preprocess::adaptive_binarize;

/// Result of measuring one detection: a record or an auditable skip.
#[derive(Debug, Clone)]
pub enum MeasureOutcome {
    Door(DoorRecord),
    Skip(SkipRecord),
}

/// Measures detections against a page's resolved scale.
pub struct MeasurementEngine {
    min_width_mm: f64,
    confidence_threshold: f32,
}

impl MeasurementEngine {
    pub fn new(min_width_mm: f64, confidence_threshold: f32) -> Self {
        Self {
            min_width_mm,
            confidence_threshold,
        }
    }

    /// Measure one detection.
    ///
    /// Skip conditions, checked in order: no page scale; degenerate geometry;
    /// confidence below threshold. None of these are errors — each becomes a
    /// skip record the reporter surfaces.
    #[instrument(skip_all, fields(page = page.index))]
    pub fn measure(
        &self,
        page: &PageImage,
        scale: Option<Scale>,
        detection: &Detection,
    ) -> MeasureOutcome {
        let Some(scale) = scale else {
            return MeasureOutcome::Skip(SkipRecord {
                page_index: page.index,
                bbox: Some(detection.bbox),
                reason: SkipReason::ScaleUnresolved,
            });
        };

        if detection.bbox.is_degenerate() {
            return MeasureOutcome::Skip(SkipRecord {
                page_index: page.index,
                bbox: Some(detection.bbox),
                reason: SkipReason::DegenerateGeometry,
            });
        }

        if detection.confidence < self.confidence_threshold {
            return MeasureOutcome::Skip(SkipRecord {
                page_index: page.index,
                bbox: Some(detection.bbox),
                reason: SkipReason::LowConfidence,
            });
        }

        // Establish the leaf orientation: trust an angle the detector
        // supplied, otherwise estimate one from the region's ink moments.
        let mask = region_ink_mask(page, detection);
        let angle_deg = detection
            .angle_deg
            .or_else(|| mask.as_ref().map(estimate_leaf_angle));

        // Door leaf is the narrow dimension. For symbols materially off-axis,
        // normalize orientation first so the leaf axis is measured
        // independently of paper orientation.
        let leaf_px = match (angle_deg, &mask) {
            (Some(angle), Some(mask)) if is_off_axis(angle) => {
                rotated_leaf_extent(mask, angle).unwrap_or_else(|| detection.bbox.leaf_side_px())
            }
            _ => detection.bbox.leaf_side_px(),
        };

        let width_mm = round_mm(leaf_px as f64 * scale.mm_per_px);
        let compliant = width_mm >= self.min_width_mm;

        debug!(
            page = page.index,
            leaf_px,
            width_mm,
            compliant,
            "Door measured"
        );

        MeasureOutcome::Door(DoorRecord {
            page_index: page.index,
            bbox: detection.bbox,
            width_mm,
            angle_deg: angle_deg.map(|a| (a * 10.0).round() / 10.0),
            compliant,
            confidence: detection.confidence,
            detection_source: detection.source,
            scale_source: scale.source,
        })
    }
}

/// Round a width to one decimal place of a millimetre.
fn round_mm(width_mm: f64) -> f64 {
    (width_mm * 10.0).round() / 10.0
}

/// Whether an estimated leaf angle is far enough off-axis that the raw
/// bounding box would overstate the leaf width.
fn is_off_axis(angle_deg: f32) -> bool {
    let a = angle_deg.rem_euclid(180.0);
    (15.0..75.0).contains(&a) || (105.0..165.0).contains(&a)
}

/// Crop the detection region and binarize it into an ink mask (ink white on
/// black). `None` when the crop falls outside the page.
fn region_ink_mask(page: &PageImage, detection: &Detection) -> Option<GrayImage> {
    let (page_w, page_h) = page.image.dimensions();
    let bbox = detection.bbox;
    if bbox.x >= page_w || bbox.y >= page_h {
        return None;
    }
    let w = bbox.width.min(page_w - bbox.x);
    let h = bbox.height.min(page_h - bbox.y);
    if w == 0 || h == 0 {
        return None;
    }

    let crop = image::imageops::crop_imm(&page.image, bbox.x, bbox.y, w, h).to_image();
    let gray = DynamicImage::ImageRgb8(crop).to_luma8();
    Some(adaptive_binarize(&gray, 5, 2))
}

/// Estimate the leaf axis angle in degrees [0, 180) from the second-order
/// central moments of the ink mask.
fn estimate_leaf_angle(mask: &GrayImage) -> f32 {
    let mut count = 0.0f64;
    let mut sum_x = 0.0f64;
    let mut sum_y = 0.0f64;
    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel.0[0] > 0 {
            count += 1.0;
            sum_x += x as f64;
            sum_y += y as f64;
        }
    }
    if count == 0.0 {
        return 0.0;
    }

    let mean_x = sum_x / count;
    let mean_y = sum_y / count;

    let mut mu11 = 0.0f64;
    let mut mu20 = 0.0f64;
    let mut mu02 = 0.0f64;
    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel.0[0] > 0 {
            let dx = x as f64 - mean_x;
            let dy = y as f64 - mean_y;
            mu11 += dx * dy;
            mu20 += dx * dx;
            mu02 += dy * dy;
        }
    }

    if mu20 + mu02 == 0.0 {
        return 0.0;
    }

    let angle = 0.5 * (2.0 * mu11).atan2(mu20 - mu02);
    (angle.to_degrees() as f32).rem_euclid(180.0)
}

/// Rotate the ink mask to canonical orientation and return the narrow side of
/// the tight ink extent, in pixels.
fn rotated_leaf_extent(mask: &GrayImage, angle_deg: f32) -> Option<u32> {
    // Black fill: rotated-in background must read as paper, not ink.
    let rotated = rotate_about_center(
        mask,
        (-angle_deg).to_radians(),
        Interpolation::Bilinear,
        image::Luma([0u8]),
    );

    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0u32;
    let mut max_y = 0u32;
    let mut any = false;
    for (x, y, pixel) in rotated.enumerate_pixels() {
        if pixel.0[0] > 127 {
            any = true;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }
    if !any {
        return None;
    }

    let extent_w = max_x - min_x + 1;
    let extent_h = max_y - min_y + 1;
    Some(extent_w.min(extent_h))
}
