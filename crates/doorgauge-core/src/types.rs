// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Doorgauge measurement pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Plausibility band for a resolved scale, in mm per pixel.
///
/// Covers printed ratios of roughly 1:1 up to 1:1000 at common rasterization
/// resolutions. Candidates outside this band would put door widths orders of
/// magnitude away from real-world norms and are rejected.
pub const MIN_MM_PER_PX: f64 = 0.05;
pub const MAX_MM_PER_PX: f64 = 60.0;

/// Axis-aligned region of interest on a page image, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A box with zero extent on either axis cannot be measured.
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// The shorter side — the door-leaf axis of an axis-aligned door symbol.
    pub fn leaf_side_px(&self) -> u32 {
        self.width.min(self.height)
    }

    /// Intersection-over-union with another box. Zero for disjoint boxes.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let x_left = self.x.max(other.x);
        let y_top = self.y.max(other.y);
        let x_right = (self.x + self.width).min(other.x + other.width);
        let y_bottom = (self.y + self.height).min(other.y + other.height);

        if x_right <= x_left || y_bottom <= y_top {
            return 0.0;
        }

        let intersection = (x_right - x_left) as f64 * (y_bottom - y_top) as f64;
        let area_a = self.width as f64 * self.height as f64;
        let area_b = other.width as f64 * other.height as f64;
        let union = area_a + area_b - intersection;

        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

/// How a page's scale was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScaleSource {
    /// Parsed from printed ratio text such as `1:50`. Unambiguous when present.
    TextRatio,
    /// Measured from a graphic bar scale. Heuristic; validated for plausibility.
    BarGraphic,
}

impl ScaleSource {
    /// Provenance tag carried into reports.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::TextRatio => "text-ratio",
            Self::BarGraphic => "bar-graphic",
        }
    }
}

/// A page's resolved conversion factor: real-world millimetres per pixel.
///
/// A page that could not be resolved carries no `Scale` at all; the
/// `"unresolved"` provenance tag appears only in skip records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scale {
    pub mm_per_px: f64,
    pub source: ScaleSource,
}

impl Scale {
    /// Construct a scale, rejecting non-positive or non-finite factors.
    pub fn new(mm_per_px: f64, source: ScaleSource) -> Option<Self> {
        if mm_per_px.is_finite() && mm_per_px > 0.0 {
            Some(Self { mm_per_px, source })
        } else {
            None
        }
    }

    /// Whether the factor falls inside the real-world plausibility band.
    pub fn is_plausible(&self) -> bool {
        (MIN_MM_PER_PX..=MAX_MM_PER_PX).contains(&self.mm_per_px)
    }
}

/// Which detector produced a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionSource {
    /// Learned object detector.
    LearnedModel,
    /// Deterministic template-matching fallback. Lower recall than the
    /// learned path; flagged so report consumers can weigh it.
    TemplateMatch,
}

impl DetectionSource {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::LearnedModel => "learned-model",
            Self::TemplateMatch => "template-match",
        }
    }
}

/// A candidate door region: pure geometry plus confidence, prior to any
/// measurement. Ephemeral — owned by its page's processing pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    /// Leaf orientation in degrees, when the detector established one.
    pub angle_deg: Option<f32>,
    /// Detection confidence in [0, 1].
    pub confidence: f32,
    pub source: DetectionSource,
}

/// A finalized, measured, classified door entry. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoorRecord {
    /// Zero-based page index.
    pub page_index: usize,
    pub bbox: BoundingBox,
    /// Measured clear-opening width in millimetres, rounded to one decimal.
    pub width_mm: f64,
    /// Leaf orientation in degrees, when one was established.
    pub angle_deg: Option<f32>,
    /// `width_mm >= threshold` at measurement time.
    pub compliant: bool,
    pub confidence: f32,
    pub detection_source: DetectionSource,
    /// Scale provenance, for auditability of the measurement.
    pub scale_source: ScaleSource,
}

/// Why a page or detection produced no measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "reason", content = "detail")]
pub enum SkipReason {
    /// Neither scale strategy succeeded on the page. Expected and common.
    ScaleUnresolved,
    /// The page worker exceeded its time budget.
    DetectorTimeout,
    /// Bounding geometry with zero width or height.
    DegenerateGeometry,
    /// Detection confidence below the configured threshold.
    LowConfidence,
    /// The page failed outright (rasterization or detector error).
    PageFailed(String),
}

impl SkipReason {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::ScaleUnresolved => "scale-unresolved",
            Self::DetectorTimeout => "detector-timeout",
            Self::DegenerateGeometry => "degenerate-geometry",
            Self::LowConfidence => "low-confidence",
            Self::PageFailed(_) => "page-failed",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PageFailed(detail) => write!(f, "page-failed: {detail}"),
            other => f.write_str(other.tag()),
        }
    }
}

/// A structured record of a door (or page) that was not measured, and why.
///
/// Every detection resolves to exactly one [`DoorRecord`] or one
/// `SkipRecord` — nothing is silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipRecord {
    pub page_index: usize,
    /// Absent for page-scoped skips (unresolved scale, timeout).
    pub bbox: Option<BoundingBox>,
    pub reason: SkipReason,
}

/// Everything one page worker produced. Workers complete in any order; the
/// runner reassembles outcomes by `page_index` so output is deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageOutcome {
    pub page_index: usize,
    /// The scale the page resolved to, if any.
    pub scale: Option<Scale>,
    pub doors: Vec<DoorRecord>,
    pub skips: Vec<SkipRecord>,
}

impl PageOutcome {
    /// An outcome for a page that produced nothing but a single skip.
    pub fn skipped(page_index: usize, reason: SkipReason) -> Self {
        Self {
            page_index,
            scale: None,
            doors: Vec::new(),
            skips: vec![SkipRecord {
                page_index,
                bbox: None,
                reason,
            }],
        }
    }
}

/// Aggregate counts for a completed run. Derived from the page outcomes,
/// never independently mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_doors: usize,
    pub compliant_doors: usize,
    pub non_compliant_doors: usize,
    pub skipped: usize,
    pub pages_processed: usize,
    /// Pages where no scale could be established.
    pub pages_unresolved: usize,
    /// The threshold the verdicts were computed against, in mm.
    pub min_width_mm: f64,
    pub compliance_percentage: f64,
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl RunSummary {
    /// Derive the summary from per-page outcomes.
    pub fn from_outcomes(outcomes: &[PageOutcome], min_width_mm: f64, duration_ms: u64) -> Self {
        let total_doors: usize = outcomes.iter().map(|o| o.doors.len()).sum();
        let compliant_doors: usize = outcomes
            .iter()
            .flat_map(|o| &o.doors)
            .filter(|d| d.compliant)
            .count();
        let skipped: usize = outcomes.iter().map(|o| o.skips.len()).sum();
        let pages_unresolved = outcomes.iter().filter(|o| o.scale.is_none()).count();

        let compliance_percentage = if total_doors > 0 {
            (compliant_doors as f64 / total_doors as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        };

        Self {
            total_doors,
            compliant_doors,
            non_compliant_doors: total_doors - compliant_doors,
            skipped,
            pages_processed: outcomes.len(),
            pages_unresolved,
            min_width_mm,
            compliance_percentage,
            duration_ms,
            completed_at: Utc::now(),
        }
    }

    /// True when the run measured nothing because no page resolved a scale —
    /// a caller-visible condition distinct from a normal zero-violations run.
    pub fn nothing_measurable(&self) -> bool {
        self.total_doors == 0 && self.pages_processed > 0 && self.pages_unresolved > 0
    }
}
