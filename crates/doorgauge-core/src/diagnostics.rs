// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operator-facing diagnostics.
//
// Every error and every skip reason is mapped to plain English with a clear
// suggestion, so an auditor reading a run's output can tell why a door was
// not measured without reading source code.

use crate::error::DoorgaugeError;
use crate::types::SkipReason;

/// Severity of a condition from the operator's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Input quality problem — a better scan or higher DPI may fix it.
    InputQuality,
    /// The operator must change something (paths, permissions, models).
    ActionRequired,
    /// Cannot be fixed by rerunning — corrupt input, unsupported format.
    Permanent,
}

/// A plain-English explanation with an actionable suggestion.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Summary of what went wrong.
    pub message: String,
    /// What the operator should try.
    pub suggestion: String,
    pub severity: Severity,
}

/// Explain a fatal error in operator terms.
pub fn explain_error(err: &DoorgaugeError) -> Diagnostic {
    match err {
        DoorgaugeError::Pdf(detail) => Diagnostic {
            message: format!("The document could not be read: {detail}"),
            suggestion: "Check that the path points at a valid, uncorrupted PDF. \
                         Re-export the drawing if the file was truncated."
                .into(),
            severity: Severity::Permanent,
        },
        DoorgaugeError::Image(detail) => Diagnostic {
            message: format!("Page image processing failed: {detail}"),
            suggestion: "Try a lower --dpi if memory is tight, or a higher one if \
                         thin lines are dropping out."
                .into(),
            severity: Severity::InputQuality,
        },
        DoorgaugeError::Ocr(detail) => Diagnostic {
            message: format!("Text recognition is unavailable: {detail}"),
            suggestion: "Doorgauge needs the ocrs model files. Run `ocrs-cli` once to \
                         download them into the model cache."
                .into(),
            severity: Severity::ActionRequired,
        },
        DoorgaugeError::Model(detail) => Diagnostic {
            message: format!("The door-detection model could not be used: {detail}"),
            suggestion: "Check the --model path, or omit it to fall back to template \
                         matching (lower recall)."
                .into(),
            severity: Severity::ActionRequired,
        },
        DoorgaugeError::Report(detail) => Diagnostic {
            message: format!("Report files could not be written: {detail}"),
            suggestion: "Check that the output directory exists and is writable.".into(),
            severity: Severity::ActionRequired,
        },
        DoorgaugeError::InvalidConfig(detail) => Diagnostic {
            message: format!("The configuration is invalid: {detail}"),
            suggestion: "Adjust the flagged option and rerun.".into(),
            severity: Severity::ActionRequired,
        },
        DoorgaugeError::Cancelled => Diagnostic {
            message: "The run was cancelled before completion.".into(),
            suggestion: "No report files were written. Rerun to get results.".into(),
            severity: Severity::ActionRequired,
        },
        DoorgaugeError::Internal(detail) => Diagnostic {
            message: format!("An internal pipeline error occurred: {detail}"),
            suggestion: "This is unexpected — rerun with --debug and file an issue.".into(),
            severity: Severity::Permanent,
        },
        DoorgaugeError::Io(detail) => Diagnostic {
            message: format!("A file operation failed: {detail}"),
            suggestion: "Check paths and permissions, then rerun.".into(),
            severity: Severity::ActionRequired,
        },
        DoorgaugeError::Serialization(detail) => Diagnostic {
            message: format!("Report serialization failed: {detail}"),
            suggestion: "This is unexpected — rerun with --debug and file an issue.".into(),
            severity: Severity::Permanent,
        },
    }
}

/// Explain a skip record's reason in operator terms.
pub fn explain_skip(reason: &SkipReason) -> Diagnostic {
    match reason {
        SkipReason::ScaleUnresolved => Diagnostic {
            message: "No scale could be established for this page, so nothing on it \
                      was measured."
                .into(),
            suggestion: "Make sure the drawing carries a printed ratio (e.g. 1:50) or \
                         a labelled bar scale, or rescan at a higher DPI."
                .into(),
            severity: Severity::InputQuality,
        },
        SkipReason::DetectorTimeout => Diagnostic {
            message: "Processing this page exceeded the time budget.".into(),
            suggestion: "Raise --page-timeout, or lower --dpi to shrink the page image.".into(),
            severity: Severity::ActionRequired,
        },
        SkipReason::DegenerateGeometry => Diagnostic {
            message: "A detected region had zero width or height and was not measured.".into(),
            suggestion: "Usually an artifact of a noisy scan; a cleaner export helps.".into(),
            severity: Severity::InputQuality,
        },
        SkipReason::LowConfidence => Diagnostic {
            message: "A candidate region scored below the confidence threshold.".into(),
            suggestion: "Lower --confidence to include weaker detections, at the cost \
                         of false positives."
                .into(),
            severity: Severity::InputQuality,
        },
        SkipReason::PageFailed(detail) => Diagnostic {
            message: format!("This page failed outright: {detail}"),
            suggestion: "Rerun with --debug to retain intermediate artifacts for \
                         inspection."
                .into(),
            severity: Severity::InputQuality,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_skip_reason_has_a_diagnostic() {
        let reasons = [
            SkipReason::ScaleUnresolved,
            SkipReason::DetectorTimeout,
            SkipReason::DegenerateGeometry,
            SkipReason::LowConfidence,
            SkipReason::PageFailed("raster error".into()),
        ];
        for reason in &reasons {
            let diag = explain_skip(reason);
            assert!(!diag.message.is_empty());
            assert!(!diag.suggestion.is_empty());
        }
    }

    #[test]
    fn unresolved_scale_is_input_quality() {
        let diag = explain_skip(&SkipReason::ScaleUnresolved);
        assert_eq!(diag.severity, Severity::InputQuality);
    }

    #[test]
    fn cancelled_mentions_no_reports() {
        let diag = explain_error(&DoorgaugeError::Cancelled);
        assert!(diag.suggestion.contains("No report files"));
    }
}
