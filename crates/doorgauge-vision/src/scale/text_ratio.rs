// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text-ratio scale strategy — reads printed scale annotations such as `1:50`,
// `1/4" = 1'`, or `1/100` off the page and converts the ratio to mm per
// pixel using the page's known rasterization DPI.

use std::sync::{Arc, LazyLock};

use image::DynamicImage;
use regex::Regex;
use tracing::{debug, warn};

use doorgauge_core::types::{Scale, ScaleSource};
use doorgauge_core::units::paper_mm_per_px;
use doorgauge_document::PageImage;
use doorgauge_document::preprocess::otsu_binarize;

use crate::ocr::TextRecognizer;
use crate::scale::ScaleStrategy;

/// `1:50` — the unambiguous metric ratio form.
static RATIO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"1\s*:\s*(\d+)").unwrap_or_else(|e| panic!("static ratio regex: {e}"))
});

/// `1/4" = 1'` — imperial architect's scale. Group 1/2 are the paper inches
/// fraction, group 3 the real feet.
static IMPERIAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\d+)\s*/\s*(\d+)\s*["”]\s*=\s*(\d+)\s*['’]"#)
        .unwrap_or_else(|e| panic!("static imperial regex: {e}"))
});

/// `1/100` — bare fraction form, checked last because it also matches inside
/// imperial expressions.
static FRACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"1\s*/\s*(\d+)").unwrap_or_else(|e| panic!("static fraction regex: {e}"))
});

/// Parse recognised page text into a dimensionless drawing ratio: real-world
/// length per paper length. `1:50` parses to 50.0.
///
/// Patterns are tried in priority order; the first match wins.
pub fn parse_scale_ratio(text: &str) -> Option<f64> {
    if let Some(caps) = RATIO_RE.captures(text) {
        let denominator: f64 = caps[1].parse().ok()?;
        if denominator >= 1.0 {
            return Some(denominator);
        }
    }

    if let Some(caps) = IMPERIAL_RE.captures(text) {
        let numerator: f64 = caps[1].parse().ok()?;
        let denominator: f64 = caps[2].parse().ok()?;
        let feet: f64 = caps[3].parse().ok()?;
        if numerator > 0.0 && denominator > 0.0 {
            // N paper inches represent `feet` real feet: ratio = real / paper.
            let paper_inches = numerator / denominator;
            return Some(feet * 12.0 / paper_inches);
        }
    }

    if let Some(caps) = FRACTION_RE.captures(text) {
        let denominator: f64 = caps[1].parse().ok()?;
        if denominator >= 1.0 {
            return Some(denominator);
        }
    }

    None
}

/// Scale strategy that OCRs the full page for a printed ratio.
pub struct TextRatioStrategy {
    ocr: Arc<TextRecognizer>,
}

impl TextRatioStrategy {
    pub fn new(ocr: Arc<TextRecognizer>) -> Self {
        Self { ocr }
    }
}

impl ScaleStrategy for TextRatioStrategy {
    fn name(&self) -> &'static str {
        "text-ratio"
    }

    fn resolve(&self, page: &PageImage) -> Option<Scale> {
        // Binarize for OCR contrast; scan exposure varies wildly.
        let gray = DynamicImage::ImageRgb8(page.image.clone()).to_luma8();
        let binary = otsu_binarize(&gray);

        let text = match self
            .ocr
            .recognize_text(&DynamicImage::ImageLuma8(binary))
        {
            Ok(text) => text,
            Err(err) => {
                warn!(page = page.index, %err, "OCR failed during text-ratio resolution");
                return None;
            }
        };

        let ratio = parse_scale_ratio(&text)?;
        debug!(page = page.index, ratio, "Printed scale ratio parsed");

        Scale::new(ratio * paper_mm_per_px(page.dpi), ScaleSource::TextRatio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_metric_ratio() {
        assert_eq!(parse_scale_ratio("SCALE 1:50"), Some(50.0));
        assert_eq!(parse_scale_ratio("1 : 100"), Some(100.0));
    }

    #[test]
    fn parses_bare_fraction() {
        assert_eq!(parse_scale_ratio("scale 1/200"), Some(200.0));
    }

    #[test]
    fn parses_imperial_expression() {
        // 1/4 inch on paper per real foot: ratio = 12 / (1/4) = 48.
        assert_eq!(parse_scale_ratio(r#"1/4" = 1'"#), Some(48.0));
        // 1/8" = 1' doubles it.
        assert_eq!(parse_scale_ratio(r#"1/8" = 1'"#), Some(96.0));
    }

    #[test]
    fn ratio_takes_priority_over_fraction() {
        // Both forms present: the explicit colon ratio wins.
        assert_eq!(parse_scale_ratio("1:50 or maybe 1/200"), Some(50.0));
    }

    #[test]
    fn rejects_text_without_scale() {
        assert_eq!(parse_scale_ratio("GROUND FLOOR PLAN"), None);
        assert_eq!(parse_scale_ratio(""), None);
    }

    #[test]
    fn ratio_to_mm_per_px_at_400_dpi() {
        // The documented scenario: 1:50 at 400 DPI is 50 * 25.4/400 = 3.175.
        let ratio = parse_scale_ratio("1:50").unwrap();
        let mm_per_px = ratio * paper_mm_per_px(400);
        assert!((mm_per_px - 3.175).abs() < 1e-9);
    }
}
