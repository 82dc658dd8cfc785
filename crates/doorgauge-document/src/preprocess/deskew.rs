// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Deskew — straightens slightly rotated scans before scale resolution and
// symbol detection, using the dominant Hough line angle.

use image::{DynamicImage, RgbImage};
use imageproc::edges::canny;
use imageproc::hough::{LineDetectionOptions, PolarLine, detect_lines};
use tracing::{debug, instrument, warn};

use crate::image_ops::ImageOps;

/// Skew below this is left alone — rotation would cost more fidelity than it
/// recovers.
const MIN_CORRECTION_DEG: f32 = 1.0;

/// Straighten a rasterized page.
///
/// Detects the dominant straight lines (walls, dimension lines) via Canny and
/// the Hough transform, takes the most frequent deviation from the nearest
/// axis, and rotates the page back by that angle. Returns the corrected image
/// and the applied correction in degrees (0.0 when no correction was made).
///
/// Deviations above 45° are treated as intentional orientation, not skew.
#[instrument(skip_all, fields(width = page.width(), height = page.height()))]
pub fn deskew(page: &RgbImage) -> (RgbImage, f32) {
    let gray = DynamicImage::ImageRgb8(page.clone()).to_luma8();
    let edges = canny(&gray, 50.0, 150.0);

    // Vote threshold proportional to the image diagonal so detection scales
    // with rasterization DPI.
    let diagonal = ((page.width() as f64).powi(2) + (page.height() as f64).powi(2)).sqrt();
    let options = LineDetectionOptions {
        vote_threshold: (diagonal * 0.2).max(100.0) as u32,
        suppression_radius: 8,
    };
    let lines = detect_lines(&edges, options);

    if lines.is_empty() {
        debug!("No lines detected; page left as-is");
        return (page.clone(), 0.0);
    }

    let skew = match dominant_skew(&lines) {
        Some(angle) => angle,
        None => {
            debug!("No near-axis lines; page left as-is");
            return (page.clone(), 0.0);
        }
    };

    if skew.abs() < MIN_CORRECTION_DEG {
        debug!(skew, "Skew below correction threshold");
        return (page.clone(), 0.0);
    }
    if skew.abs() > 45.0 {
        warn!(skew, "Implausible skew estimate; page left as-is");
        return (page.clone(), 0.0);
    }

    debug!(skew, "Correcting page skew");
    let corrected = ImageOps::from_dynamic(DynamicImage::ImageRgb8(page.clone()))
        .rotate(-skew)
        .into_dynamic()
        .to_rgb8();

    (corrected, -skew)
}

/// Most frequent per-degree deviation from the nearest drawing axis among
/// near-axis Hough lines, or `None` when no line is close to an axis.
///
/// A line's Hough angle is the angle of its normal (0..180°); an axis-aligned
/// line sits at 0, 90, or 180. Deviation is folded into [-45, 45].
fn dominant_skew(lines: &[PolarLine]) -> Option<f32> {
    // Index 0 maps to -45°, index 90 to +45°.
    let mut histogram = [0u32; 91];
    let mut considered = 0u32;

    for line in lines {
        let angle = line.angle_in_degrees as f32;
        let mut deviation = angle % 90.0;
        if deviation > 45.0 {
            deviation -= 90.0;
        }
        // Lines more than 30° off-axis are diagonal drawing content, not skew
        // evidence.
        if deviation.abs() > 30.0 {
            continue;
        }
        let bin = (deviation.round() as i32 + 45) as usize;
        histogram[bin] += 1;
        considered += 1;
    }

    if considered == 0 {
        return None;
    }

    let (best_bin, _) = histogram
        .iter()
        .enumerate()
        .max_by_key(|&(_, &count)| count)?;

    Some(best_bin as f32 - 45.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// A straight page must come back unchanged with a zero angle.
    #[test]
    fn straight_page_is_untouched() {
        let mut page = RgbImage::from_pixel(300, 200, Rgb([255u8, 255, 255]));
        // Axis-aligned dark horizontals, like walls.
        for x in 20..280 {
            page.put_pixel(x, 60, Rgb([0u8, 0, 0]));
            page.put_pixel(x, 140, Rgb([0u8, 0, 0]));
        }

        let (corrected, angle) = deskew(&page);
        assert_eq!(angle, 0.0);
        assert_eq!(corrected.dimensions(), page.dimensions());
    }

    #[test]
    fn blank_page_is_untouched() {
        let page = RgbImage::from_pixel(100, 100, Rgb([255u8, 255, 255]));
        let (_, angle) = deskew(&page);
        assert_eq!(angle, 0.0);
    }

    #[test]
    fn dominant_skew_folds_into_half_quadrant() {
        let lines = vec![
            PolarLine {
                r: 10.0,
                angle_in_degrees: 92,
            },
            PolarLine {
                r: 40.0,
                angle_in_degrees: 92,
            },
            PolarLine {
                r: 80.0,
                angle_in_degrees: 2,
            },
        ];
        let skew = dominant_skew(&lines).unwrap();
        assert!((skew - 2.0).abs() < 0.5, "expected ~2°, got {}", skew);
    }

    #[test]
    fn dominant_skew_ignores_diagonals() {
        let lines = vec![
            PolarLine {
                r: 10.0,
                angle_in_degrees: 45,
            },
            PolarLine {
                r: 20.0,
                angle_in_degrees: 135,
            },
        ];
        assert!(dominant_skew(&lines).is_none());
    }
}
