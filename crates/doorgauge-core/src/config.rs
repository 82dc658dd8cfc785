// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Run configuration.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DoorgaugeError, Result};

/// Which scale-resolution strategy is consulted first when both a printed
/// ratio and a graphic bar scale could be present on a page.
///
/// Text-first is the default: ratio text is unambiguous when present, while
/// bar measurement is heuristic. The ordering is a policy knob, not an
/// architectural constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScalePriority {
    TextFirst,
    BarFirst,
}

impl FromStr for ScalePriority {
    type Err = DoorgaugeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "text-first" => Ok(Self::TextFirst),
            "bar" | "bar-first" => Ok(Self::BarFirst),
            other => Err(DoorgaugeError::InvalidConfig(format!(
                "unknown scale priority {other:?} (expected \"text\" or \"bar\")"
            ))),
        }
    }
}

/// Settings for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Minimum acceptable clear-opening width in mm.
    pub min_width_mm: f64,
    /// Rasterization resolution. Values below 300 lose thin line detail.
    pub dpi: u32,
    /// Directory report files and annotated pages are written under.
    pub output_dir: PathBuf,
    /// Process every PDF in subdirectories of a directory argument.
    pub recursive: bool,
    /// Retain intermediate raster and preprocessing artifacts.
    pub debug: bool,
    /// Detections scoring below this are recorded as low-confidence skips.
    pub confidence_threshold: f32,
    /// Per-page time budget; an elapsed budget marks the page skipped.
    pub page_timeout_secs: u64,
    /// Worker pool size. Zero means one worker per available CPU.
    pub workers: usize,
    pub scale_priority: ScalePriority,
    /// Learned door-detection model (`.rten`). Absent means the deterministic
    /// template-matching fallback is used.
    pub model_path: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            min_width_mm: 900.0,
            dpi: 400,
            output_dir: PathBuf::from("doorgauge-output"),
            recursive: false,
            debug: false,
            confidence_threshold: 0.5,
            page_timeout_secs: 120,
            workers: 0,
            scale_priority: ScalePriority::TextFirst,
            model_path: None,
        }
    }
}

impl RunConfig {
    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(self.min_width_mm.is_finite() && self.min_width_mm > 0.0) {
            return Err(DoorgaugeError::InvalidConfig(format!(
                "min_width_mm must be positive, got {}",
                self.min_width_mm
            )));
        }
        if self.dpi < 72 {
            return Err(DoorgaugeError::InvalidConfig(format!(
                "dpi must be at least 72, got {}",
                self.dpi
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(DoorgaugeError::InvalidConfig(format!(
                "confidence_threshold must be in [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if self.page_timeout_secs == 0 {
            return Err(DoorgaugeError::InvalidConfig(
                "page_timeout_secs must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documentation() {
        let config = RunConfig::default();
        assert_eq!(config.min_width_mm, 900.0);
        assert_eq!(config.dpi, 400);
        assert_eq!(config.confidence_threshold, 0.5);
        assert_eq!(config.page_timeout_secs, 120);
        assert_eq!(config.scale_priority, ScalePriority::TextFirst);
        assert!(config.model_path.is_none());
        assert!(!config.recursive);
        assert!(!config.debug);
        config.validate().expect("defaults must validate");
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = RunConfig {
            min_width_mm: 0.0,
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());

        config.min_width_mm = 900.0;
        config.dpi = 50;
        assert!(config.validate().is_err());

        config.dpi = 400;
        config.confidence_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn scale_priority_from_str() {
        assert_eq!(
            "text".parse::<ScalePriority>().unwrap(),
            ScalePriority::TextFirst
        );
        assert_eq!(
            "bar-first".parse::<ScalePriority>().unwrap(),
            ScalePriority::BarFirst
        );
        assert!("graphical".parse::<ScalePriority>().is_err());
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = RunConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: RunConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.min_width_mm, config.min_width_mm);
        assert_eq!(back.scale_priority, config.scale_priority);
    }
}
