// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Report writers — a tabular CSV per door and a machine-readable JSON report
// carrying the same data plus the aggregate summary and every skip record.
// Original page and detection ordering is preserved for reproducibility.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use doorgauge_core::error::{DoorgaugeError, Result};
use doorgauge_core::types::{DoorRecord, RunSummary, SkipRecord};

/// The machine-readable report: everything an auditor needs to reproduce the
/// verdicts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonReport {
    pub summary: RunSummary,
    pub doors: Vec<DoorRecord>,
    pub skips: Vec<SkipRecord>,
}

/// Write the per-door CSV: one row per measured door, in page/position order.
#[instrument(skip_all, fields(path = %path.as_ref().display(), doors = doors.len()))]
pub fn write_csv_report(path: impl AsRef<Path>, doors: &[DoorRecord]) -> Result<()> {
    let path_ref = path.as_ref();
    let file = File::create(path_ref).map_err(|err| {
        DoorgaugeError::Report(format!(
            "failed to create {}: {}",
            path_ref.display(),
            err
        ))
    })?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "page,x,y,width_mm,angle_deg,compliant")
        .map_err(|err| DoorgaugeError::Report(format!("failed to write CSV header: {}", err)))?;

    for door in doors {
        let angle = door
            .angle_deg
            .map(|a| format!("{a:.1}"))
            .unwrap_or_default();
        writeln!(
            writer,
            "{},{},{},{:.1},{},{}",
            door.page_index, door.bbox.x, door.bbox.y, door.width_mm, angle, door.compliant
        )
        .map_err(|err| DoorgaugeError::Report(format!("failed to write CSV row: {}", err)))?;
    }

    writer
        .flush()
        .map_err(|err| DoorgaugeError::Report(format!("failed to flush CSV: {}", err)))?;

    debug!("CSV report written");
    Ok(())
}

/// Write the JSON report.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn write_json_report(path: impl AsRef<Path>, report: &JsonReport) -> Result<()> {
    let path_ref = path.as_ref();
    let file = File::create(path_ref).map_err(|err| {
        DoorgaugeError::Report(format!(
            "failed to create {}: {}",
            path_ref.display(),
            err
        ))
    })?;

    serde_json::to_writer_pretty(BufWriter::new(file), report)?;

    info!(
        doors = report.doors.len(),
        skips = report.skips.len(),
        "JSON report written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use doorgauge_core::types::{
        BoundingBox, DetectionSource, PageOutcome, Scale, ScaleSource, SkipReason,
    };

    fn sample_doors() -> Vec<DoorRecord> {
        vec![
            DoorRecord {
                page_index: 0,
                bbox: BoundingBox::new(40, 30, 18, 40),
                width_mm: 920.0,
                angle_deg: Some(90.0),
                compliant: true,
                confidence: 0.92,
                detection_source: DetectionSource::LearnedModel,
                scale_source: ScaleSource::TextRatio,
            },
            DoorRecord {
                page_index: 1,
                bbox: BoundingBox::new(200, 110, 14, 38),
                width_mm: 711.2,
                angle_deg: None,
                compliant: false,
                confidence: 0.64,
                detection_source: DetectionSource::TemplateMatch,
                scale_source: ScaleSource::BarGraphic,
            },
        ]
    }

    fn sample_report() -> JsonReport {
        let doors = sample_doors();
        let outcomes = vec![PageOutcome {
            page_index: 0,
            scale: Scale::new(3.175, ScaleSource::TextRatio),
            doors: doors.clone(),
            skips: vec![SkipRecord {
                page_index: 0,
                bbox: Some(BoundingBox::new(5, 5, 10, 10)),
                reason: SkipReason::LowConfidence,
            }],
        }];
        JsonReport {
            summary: RunSummary::from_outcomes(&outcomes, 900.0, 42),
            doors,
            skips: vec![SkipRecord {
                page_index: 0,
                bbox: Some(BoundingBox::new(5, 5, 10, 10)),
                reason: SkipReason::LowConfidence,
            }],
        }
    }

    #[test]
    fn csv_has_header_and_one_row_per_door() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doors.csv");

        write_csv_report(&path, &sample_doors()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "page,x,y,width_mm,angle_deg,compliant");
        assert!(lines[1].starts_with("0,40,30,920.0,90.0,true"));
        // A missing angle leaves its column empty.
        assert!(lines[2].contains(",711.2,,false"));
    }

    #[test]
    fn json_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doors.json");

        let report = sample_report();
        write_json_report(&path, &report).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let back: JsonReport = serde_json::from_str(&content).unwrap();
        assert_eq!(back.doors, report.doors);
        assert_eq!(back.skips, report.skips);
        assert_eq!(back.summary.total_doors, report.summary.total_doors);
    }

    /// Every stored verdict must be recomputable from the stored width and the
    /// stored threshold.
    #[test]
    fn verdicts_recompute_from_stored_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doors.json");
        write_json_report(&path, &sample_report()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let back: JsonReport = serde_json::from_str(&content).unwrap();

        for door in &back.doors {
            let recomputed = door.width_mm >= back.summary.min_width_mm;
            assert_eq!(
                recomputed, door.compliant,
                "stored verdict disagrees with stored width for {door:?}"
            );
        }
    }

    #[test]
    fn unwritable_path_is_report_error() {
        let err = write_csv_report("/nonexistent-dir/doors.csv", &[]).unwrap_err();
        assert!(matches!(err, DoorgaugeError::Report(_)));
    }
}
