// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bar-graphic scale strategy — measures a drawn, tick-marked scale bar.
//
// Heuristic fallback for pages without printed ratio text: find long
// horizontal edge segments, OCR the band around each candidate for labelled
// endpoint values (`0  1m  2m`), and divide the labelled real length by the
// bar's pixel length. Results are validated against the plausibility band by
// the resolver before acceptance.

use std::sync::{Arc, LazyLock};

use image::{DynamicImage, GrayImage};
use imageproc::edges::canny;
use regex::Regex;
use tracing::{debug, warn};

use doorgauge_core::types::{Scale, ScaleSource};
use doorgauge_core::units::to_mm;
use doorgauge_document::PageImage;

use crate::ocr::TextRecognizer;
use crate::scale::ScaleStrategy;

/// Gaps up to this many pixels inside one bar are bridged (tick openings).
const MAX_SEGMENT_GAP: u32 = 10;

/// Candidate bars examined per page, longest first.
const MAX_CANDIDATES: usize = 5;

/// Labelled length values with a unit, e.g. `5m`, `2.5 m`, `10'`. `mm` must
/// precede `m` in the alternation so it is not half-matched.
static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\d+(?:\.\d+)?)\s*(mm|cm|ft|in|m|'|")"#)
        .unwrap_or_else(|e| panic!("static label regex: {e}"))
});

/// A horizontal edge segment: a candidate scale bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    x: u32,
    y: u32,
    length: u32,
}

/// Parse all labelled lengths in OCR text, converted to mm, in reading order.
fn parse_bar_labels(text: &str) -> Vec<f64> {
    LABEL_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let value: f64 = caps[1].parse().ok()?;
            to_mm(value, &caps[2])
        })
        .collect()
}

/// Find long horizontal runs in an edge image, bridging tick gaps, longest
/// first, with near-duplicate rows suppressed.
fn find_horizontal_segments(edges: &GrayImage, min_length: u32) -> Vec<Segment> {
    let (width, height) = edges.dimensions();
    let mut segments = Vec::new();

    for y in 0..height {
        let mut run_start: Option<u32> = None;
        let mut last_edge: u32 = 0;

        for x in 0..width {
            let is_edge = edges.get_pixel(x, y).0[0] > 0;
            match (is_edge, run_start) {
                (true, None) => {
                    run_start = Some(x);
                    last_edge = x;
                }
                (true, Some(_)) => last_edge = x,
                (false, Some(start)) => {
                    if x - last_edge > MAX_SEGMENT_GAP {
                        let length = last_edge - start + 1;
                        if length >= min_length {
                            segments.push(Segment {
                                x: start,
                                y,
                                length,
                            });
                        }
                        run_start = None;
                    }
                }
                (false, None) => {}
            }
        }
        if let Some(start) = run_start {
            let length = last_edge - start + 1;
            if length >= min_length {
                segments.push(Segment {
                    x: start,
                    y,
                    length,
                });
            }
        }
    }

    // Longest first; drop near-duplicates from adjacent rows of the same bar.
    segments.sort_by(|a, b| b.length.cmp(&a.length));
    let mut kept: Vec<Segment> = Vec::new();
    for seg in segments {
        let duplicate = kept.iter().any(|k| {
            (k.y as i64 - seg.y as i64).abs() < 5
                && seg.x < k.x + k.length
                && k.x < seg.x + seg.length
        });
        if !duplicate {
            kept.push(seg);
        }
        if kept.len() >= MAX_CANDIDATES {
            break;
        }
    }
    kept
}

/// Scale strategy that measures a graphic bar scale.
pub struct BarGraphicStrategy {
    ocr: Arc<TextRecognizer>,
}

impl BarGraphicStrategy {
    pub fn new(ocr: Arc<TextRecognizer>) -> Self {
        Self { ocr }
    }

    /// OCR the band around a candidate bar and derive mm-per-px from its
    /// endpoint labels, if it has at least two.
    fn measure_candidate(&self, page: &PageImage, gray: &GrayImage, seg: Segment) -> Option<Scale> {
        let (width, height) = gray.dimensions();

        // Labels sit on or just under the bar; take a generous band.
        let band_x = seg.x.saturating_sub(20);
        let band_y = seg.y.saturating_sub(20);
        let band_w = (seg.length + 40).min(width - band_x);
        let band_h = 40.min(height - band_y);
        if band_w == 0 || band_h == 0 {
            return None;
        }

        let band = image::imageops::crop_imm(gray, band_x, band_y, band_w, band_h).to_image();
        let text = match self.ocr.recognize_text(&DynamicImage::ImageLuma8(band)) {
            Ok(text) => text,
            Err(err) => {
                warn!(page = page.index, %err, "OCR failed on scale-bar band");
                return None;
            }
        };

        let labels = parse_bar_labels(&text);
        if labels.len() < 2 {
            return None;
        }

        // First and last label span the bar's extreme ticks.
        let mm_distance = (labels[labels.len() - 1] - labels[0]).abs();
        if mm_distance <= 0.0 {
            return None;
        }

        let mm_per_px = mm_distance / seg.length as f64;
        debug!(
            page = page.index,
            bar_px = seg.length,
            mm_distance,
            mm_per_px,
            "Scale bar measured"
        );
        Scale::new(mm_per_px, ScaleSource::BarGraphic)
    }
}

impl ScaleStrategy for BarGraphicStrategy {
    fn name(&self) -> &'static str {
        "bar-graphic"
    }

    fn resolve(&self, page: &PageImage) -> Option<Scale> {
        let gray = DynamicImage::ImageRgb8(page.image.clone()).to_luma8();
        let edges = canny(&gray, 50.0, 150.0);

        // A plotted scale bar is at least ~6 mm of paper long.
        let min_length = (page.dpi as f64 * 0.25) as u32;
        let candidates = find_horizontal_segments(&edges, min_length);
        debug!(
            page = page.index,
            candidates = candidates.len(),
            "Scale-bar candidates found"
        );

        candidates
            .into_iter()
            .find_map(|seg| self.measure_candidate(page, &gray, seg))
    }
}
