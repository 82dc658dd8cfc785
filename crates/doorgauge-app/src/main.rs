// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Doorgauge — floor-plan door detection and accessibility measurement CLI.
//
// Entry point. Initialises logging, builds the run configuration and the
// shared vision components (OCR engine, detector), and drives the pipeline
// over one PDF or a directory of PDFs.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use doorgauge_core::config::{RunConfig, ScalePriority};
use doorgauge_core::diagnostics::{explain_error, explain_skip};
use doorgauge_core::error::{DoorgaugeError, Result};
use doorgauge_document::pdf::raster::is_pdf_path;
use doorgauge_pipeline::{Pipeline, RunOutput};
use doorgauge_vision::detect::detector_for;
use doorgauge_vision::ocr::{OcrConfig, TextRecognizer};
use doorgauge_vision::scale::ScaleResolver;

#[derive(Parser)]
#[command(name = "doorgauge")]
#[command(about = "Detect and measure door openings in floor-plan PDFs")]
struct Cli {
    /// Path to a floor-plan PDF, or a directory of PDFs.
    path: PathBuf,

    /// Minimum acceptable clear-opening width in mm.
    #[arg(long, default_value_t = 900.0)]
    min_width: f64,

    /// Directory to write reports and annotated pages under.
    #[arg(long, default_value = "doorgauge-output")]
    output_dir: PathBuf,

    /// Rasterization resolution for PDF pages.
    #[arg(long, default_value_t = 400)]
    dpi: u32,

    /// Also process PDFs in subdirectories.
    #[arg(long)]
    recursive: bool,

    /// Retain intermediate raster and preprocessing artifacts.
    #[arg(long)]
    debug: bool,

    /// Detection confidence threshold in [0, 1].
    #[arg(long, default_value_t = 0.5)]
    confidence: f32,

    /// Learned door-detection model (.rten). Omit for template fallback.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Which scale source to trust first: "text" or "bar".
    #[arg(long, default_value = "text")]
    scale_priority: String,

    /// Per-page time budget in seconds.
    #[arg(long, default_value_t = 120)]
    page_timeout: u64,

    /// Worker pool size (0 = one per CPU).
    #[arg(long, default_value_t = 0)]
    workers: usize,

    /// Directory holding the ocrs model files (defaults to the ocrs cache).
    #[arg(long)]
    ocr_models: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            let diag = explain_error(&err);
            error!("{}", diag.message);
            error!("{}", diag.suggestion);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let scale_priority: ScalePriority = cli.scale_priority.parse()?;
    let config = RunConfig {
        min_width_mm: cli.min_width,
        dpi: cli.dpi,
        output_dir: cli.output_dir,
        recursive: cli.recursive,
        debug: cli.debug,
        confidence_threshold: cli.confidence,
        page_timeout_secs: cli.page_timeout,
        workers: cli.workers,
        scale_priority,
        model_path: cli.model,
    };
    config.validate()?;

    // Run-scoped shared state: OCR engine and detector load once, then serve
    // every page worker read-only.
    let ocr_config = match &cli.ocr_models {
        Some(dir) => OcrConfig::from_dir(dir),
        None => OcrConfig::default(),
    };
    let ocr = Arc::new(TextRecognizer::new(ocr_config)?);
    let resolver = Arc::new(ScaleResolver::for_run(ocr, config.scale_priority));
    let detector = detector_for(&config)?;
    let pipeline = Pipeline::new(config, detector, resolver)?;

    let pdfs = collect_pdfs(&cli.path, cli.recursive)?;
    info!(documents = pdfs.len(), "Starting run");

    let mut any_doors = false;
    let mut any_unmeasurable = false;
    let mut failures = 0usize;

    for pdf in &pdfs {
        // Ctrl-c drops the in-flight document future, which aborts its page
        // workers before any report file is written.
        let output = tokio::select! {
            result = pipeline.process_document(pdf) => result,
            _ = tokio::signal::ctrl_c() => return Err(DoorgaugeError::Cancelled),
        };

        match output {
            Ok(output) => {
                report_outcome(&output);
                any_doors |= output.summary.total_doors > 0;
                any_unmeasurable |= output.summary.nothing_measurable();
            }
            Err(err) if pdfs.len() == 1 => return Err(err),
            Err(err) => {
                let diag = explain_error(&err);
                error!(document = %pdf.display(), "{}", diag.message);
                failures += 1;
            }
        }
    }

    if failures == pdfs.len() {
        return Err(DoorgaugeError::Pdf(format!(
            "all {} documents failed to process",
            pdfs.len()
        )));
    }

    // Nothing measurable anywhere is a caller-visible condition distinct from
    // a clean zero-violations run.
    if !any_doors && any_unmeasurable {
        error!(
            "No page in any document resolved a scale; nothing was measurable. \
             Guessing dimensions is not acceptable, so no widths were reported."
        );
        return Ok(ExitCode::from(2));
    }

    Ok(ExitCode::SUCCESS)
}

/// Log one document's results at operator level.
fn report_outcome(output: &RunOutput) {
    let summary = &output.summary;
    info!(
        document = %output.source.display(),
        total = summary.total_doors,
        compliant = summary.compliant_doors,
        non_compliant = summary.non_compliant_doors,
        skipped = summary.skipped,
        compliance_pct = summary.compliance_percentage,
        report = %output.json_path.display(),
        "Document processed"
    );

    if summary.non_compliant_doors > 0 {
        warn!(
            "{} door(s) below the {}mm threshold — see {}",
            summary.non_compliant_doors,
            summary.min_width_mm,
            output.csv_path.display()
        );
    }

    for outcome in &output.outcomes {
        for skip in &outcome.skips {
            let diag = explain_skip(&skip.reason);
            info!(
                page = skip.page_index,
                reason = %skip.reason,
                "{}",
                diag.message
            );
        }
    }
}

/// Expand the input path into the list of PDFs to process, in stable order.
fn collect_pdfs(path: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        if !is_pdf_path(path) {
            return Err(DoorgaugeError::Pdf(format!(
                "not a PDF file: {}",
                path.display()
            )));
        }
        return Ok(vec![path.to_path_buf()]);
    }

    if path.is_dir() {
        let mut pdfs = Vec::new();
        walk_dir(path, recursive, &mut pdfs)?;
        if pdfs.is_empty() {
            return Err(DoorgaugeError::Pdf(format!(
                "no PDF files found in {}",
                path.display()
            )));
        }
        pdfs.sort();
        return Ok(pdfs);
    }

    Err(DoorgaugeError::Pdf(format!(
        "path not found: {}",
        path.display()
    )))
}

fn walk_dir(dir: &Path, recursive: bool, pdfs: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let entry_path = entry.path();
        if entry_path.is_dir() {
            if recursive {
                walk_dir(&entry_path, recursive, pdfs)?;
            }
        } else if is_pdf_path(&entry_path) {
            pdfs.push(entry_path);
        }
    }
    Ok(())
}
