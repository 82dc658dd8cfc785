// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// doorgauge-pipeline — Orchestration layer of Doorgauge.
//
// Runs the per-document pipeline (bounded parallel page workers with
// timeouts), writes the CSV and JSON reports, and renders the annotated page
// overlays.

pub mod annotate;
pub mod report;
pub mod runner;

pub use report::JsonReport;
pub use runner::{Pipeline, RunOutput};
