// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Doorgauge.

use thiserror::Error;

/// Top-level error type for all Doorgauge operations.
///
/// Only genuinely fatal conditions surface as errors. Per-page and
/// per-detection conditions (unresolved scale, timeouts, weak detections)
/// travel as [`crate::types::SkipRecord`]s instead, so a run can finish and
/// report them.
#[derive(Debug, Error)]
pub enum DoorgaugeError {
    // -- Document errors --
    #[error("PDF operation failed: {0}")]
    Pdf(String),

    #[error("image processing failed: {0}")]
    Image(String),

    // -- Vision errors --
    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("detection model error: {0}")]
    Model(String),

    // -- Reporting --
    #[error("report generation failed: {0}")]
    Report(String),

    // -- Configuration --
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // -- Run control --
    #[error("run cancelled before completion")]
    Cancelled,

    #[error("internal pipeline error: {0}")]
    Internal(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DoorgaugeError>;
