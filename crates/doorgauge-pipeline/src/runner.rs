// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-document runner.
//
// Pages are independent after rasterization, so scale resolution, detection,
// and measurement run concurrently across pages on a bounded worker pool.
// Workers complete in any order; outcomes are reassembled by page index so
// output ordering is deterministic. Each page runs under a time budget —
// an elapsed budget marks the page skipped instead of hanging the run.
//
// Report files are written only after every page completes, so dropping the
// in-flight future (ctrl-c in the CLI) aborts workers without leaving
// partial CSV/JSON behind. Per-page overlays are whole-page artifacts and
// are written as each page finishes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ab_glyph::FontVec;
use image::DynamicImage;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use doorgauge_core::config::RunConfig;
use doorgauge_core::error::{DoorgaugeError, Result};
use doorgauge_core::types::{DoorRecord, PageOutcome, RunSummary, SkipReason, SkipRecord};
use doorgauge_document::preprocess::{deskew, enhance_for_detection};
use doorgauge_document::{PageImage, PdfRasterizer};
use doorgauge_vision::detect::DoorDetector;
use doorgauge_vision::measure::{MeasureOutcome, MeasurementEngine};
use doorgauge_vision::scale::ResolveScale;

use crate::annotate::{annotate_page, load_system_font};
use crate::report::{JsonReport, write_csv_report, write_json_report};

/// Everything a completed run produced.
#[derive(Debug)]
pub struct RunOutput {
    pub source: PathBuf,
    /// Per-page outcomes, in page order.
    pub outcomes: Vec<PageOutcome>,
    pub summary: RunSummary,
    pub csv_path: PathBuf,
    pub json_path: PathBuf,
}

/// Run-scoped state shared read-only by page workers.
struct PageContext {
    detector: Arc<dyn DoorDetector>,
    resolver: Arc<dyn ResolveScale>,
    engine: MeasurementEngine,
    min_width_mm: f64,
    debug: bool,
    doc_dir: PathBuf,
    stem: String,
    font: Option<FontVec>,
}

/// The document pipeline: rasterize, then per page resolve scale, detect,
/// measure, and annotate; finally aggregate and write reports.
///
/// The detector and scale resolver are injected so runs can be configured
/// with a learned or template detector — and tests with mocks.
pub struct Pipeline {
    config: RunConfig,
    detector: Arc<dyn DoorDetector>,
    resolver: Arc<dyn ResolveScale>,
}

impl Pipeline {
    pub fn new(
        config: RunConfig,
        detector: Arc<dyn DoorDetector>,
        resolver: Arc<dyn ResolveScale>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            detector,
            resolver,
        })
    }

    /// Process one PDF end to end and write its reports.
    ///
    /// Fatal conditions (unreadable document, unwritable output directory)
    /// surface as errors; per-page and per-detection conditions become skip
    /// records inside the output.
    #[instrument(skip_all, fields(path = %pdf_path.as_ref().display()))]
    pub async fn process_document(&self, pdf_path: impl AsRef<Path>) -> Result<RunOutput> {
        let pdf_path = pdf_path.as_ref();
        let started = Instant::now();

        let rasterizer = PdfRasterizer::open(pdf_path, self.config.dpi)?;
        let stem = pdf_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".into());

        let ctx = self.page_context(&stem)?;
        info!(
            pages = rasterizer.page_count(),
            workers = self.worker_count(),
            "Processing document"
        );

        let semaphore = Arc::new(Semaphore::new(self.worker_count()));
        let mut join_set = JoinSet::new();
        let mut render_failures: Vec<PageOutcome> = Vec::new();

        for index in 0..rasterizer.page_count() {
            let permit = acquire(&semaphore).await?;
            // Rasterization stays in the orchestrator; everything after it is
            // page-parallel.
            match rasterizer.render_page(index) {
                Ok(page) => self.spawn_page(&mut join_set, page, permit, Arc::clone(&ctx)),
                Err(err) => {
                    warn!(page = index, %err, "Page failed to rasterize");
                    render_failures.push(PageOutcome::skipped(
                        index,
                        SkipReason::PageFailed(err.to_string()),
                    ));
                }
            }
        }

        let mut outcomes = collect_outcomes(join_set).await?;
        outcomes.extend(render_failures);
        outcomes.sort_by_key(|o| o.page_index);

        let summary = RunSummary::from_outcomes(
            &outcomes,
            self.config.min_width_mm,
            started.elapsed().as_millis() as u64,
        );

        let doors: Vec<DoorRecord> = outcomes.iter().flat_map(|o| o.doors.clone()).collect();
        let skips: Vec<SkipRecord> = outcomes.iter().flat_map(|o| o.skips.clone()).collect();

        let csv_path = ctx.doc_dir.join(format!("{stem}_doors.csv"));
        let json_path = ctx.doc_dir.join(format!("{stem}_doors.json"));
        write_csv_report(&csv_path, &doors)?;
        write_json_report(
            &json_path,
            &JsonReport {
                summary: summary.clone(),
                doors,
                skips,
            },
        )?;

        info!(
            total = summary.total_doors,
            compliant = summary.compliant_doors,
            non_compliant = summary.non_compliant_doors,
            skipped = summary.skipped,
            duration_ms = summary.duration_ms,
            "Document complete"
        );

        Ok(RunOutput {
            source: pdf_path.to_path_buf(),
            outcomes,
            summary,
            csv_path,
            json_path,
        })
    }

    /// Run the per-page stages over already-rasterized pages, without report
    /// writing. This is the seam the document entry point builds on; it also
    /// serves callers that bring their own page images.
    pub async fn process_pages(
        &self,
        stem: &str,
        pages: Vec<PageImage>,
    ) -> Result<Vec<PageOutcome>> {
        let ctx = self.page_context(stem)?;
        let semaphore = Arc::new(Semaphore::new(self.worker_count()));
        let mut join_set = JoinSet::new();

        for page in pages {
            let permit = acquire(&semaphore).await?;
            self.spawn_page(&mut join_set, page, permit, Arc::clone(&ctx));
        }

        let mut outcomes = collect_outcomes(join_set).await?;
        outcomes.sort_by_key(|o| o.page_index);
        Ok(outcomes)
    }

    fn worker_count(&self) -> usize {
        if self.config.workers == 0 {
            num_cpus::get()
        } else {
            self.config.workers
        }
    }

    /// Build the shared worker context, creating the document's output
    /// directory. An unwritable directory is fatal.
    fn page_context(&self, stem: &str) -> Result<Arc<PageContext>> {
        let doc_dir = self.config.output_dir.join(stem);
        std::fs::create_dir_all(&doc_dir).map_err(|err| {
            DoorgaugeError::Report(format!(
                "output directory {} is not writable: {}",
                doc_dir.display(),
                err
            ))
        })?;

        Ok(Arc::new(PageContext {
            detector: Arc::clone(&self.detector),
            resolver: Arc::clone(&self.resolver),
            engine: MeasurementEngine::new(
                self.config.min_width_mm,
                self.config.confidence_threshold,
            ),
            min_width_mm: self.config.min_width_mm,
            debug: self.config.debug,
            doc_dir,
            stem: stem.to_string(),
            font: load_system_font(),
        }))
    }

    fn spawn_page(
        &self,
        join_set: &mut JoinSet<PageOutcome>,
        page: PageImage,
        permit: OwnedSemaphorePermit,
        ctx: Arc<PageContext>,
    ) {
        let timeout = Duration::from_secs(self.config.page_timeout_secs);
        join_set.spawn(async move {
            let _permit = permit;
            let index = page.index;
            let handle = tokio::task::spawn_blocking(move || analyze_page(page, &ctx));

            match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(join_err)) => {
                    warn!(page = index, %join_err, "Page worker failed");
                    PageOutcome::skipped(index, SkipReason::PageFailed(join_err.to_string()))
                }
                Err(_elapsed) => {
                    warn!(page = index, "Page exceeded its time budget");
                    PageOutcome::skipped(index, SkipReason::DetectorTimeout)
                }
            }
        });
    }
}

async fn acquire(semaphore: &Arc<Semaphore>) -> Result<OwnedSemaphorePermit> {
    Arc::clone(semaphore)
        .acquire_owned()
        .await
        .map_err(|_| DoorgaugeError::Cancelled)
}

async fn collect_outcomes(mut join_set: JoinSet<PageOutcome>) -> Result<Vec<PageOutcome>> {
    let mut outcomes = Vec::new();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) if err.is_cancelled() => return Err(DoorgaugeError::Cancelled),
            Err(err) => {
                return Err(DoorgaugeError::Internal(format!(
                    "page worker panicked: {err}"
                )));
            }
        }
    }
    Ok(outcomes)
}

/// The page-scoped pipeline: deskew, resolve scale, detect, measure,
/// annotate. Runs on a blocking worker thread.
///
/// Every detection resolves to exactly one door record or one skip record.
fn analyze_page(page: PageImage, ctx: &PageContext) -> PageOutcome {
    let index = page.index;
    info!(page = index, "Processing page");

    let (corrected, skew) = deskew(&page.image);
    if skew != 0.0 {
        info!(page = index, skew, "Page deskewed");
    }
    let page = PageImage {
        index,
        dpi: page.dpi,
        image: corrected,
    };

    if ctx.debug {
        save_debug_artifacts(&page, ctx);
    }

    let scale = ctx.resolver.resolve(&page);

    let detections = match ctx.detector.detect(&page) {
        Ok(detections) => detections,
        Err(err) => {
            warn!(page = index, %err, "Detector failed on page");
            return PageOutcome {
                page_index: index,
                scale,
                doors: Vec::new(),
                skips: vec![SkipRecord {
                    page_index: index,
                    bbox: None,
                    reason: SkipReason::PageFailed(err.to_string()),
                }],
            };
        }
    };
    debug!(page = index, detections = detections.len(), "Detection complete");

    let mut doors = Vec::new();
    let mut skips = Vec::new();
    for detection in &detections {
        match ctx.engine.measure(&page, scale, detection) {
            MeasureOutcome::Door(record) => doors.push(record),
            MeasureOutcome::Skip(skip) => skips.push(skip),
        }
    }

    let overlay = annotate_page(&page, &doors, &skips, ctx.min_width_mm, ctx.font.as_ref());
    let overlay_path = ctx
        .doc_dir
        .join(format!("{}_page{}_annotated.png", ctx.stem, index));
    if let Err(err) = overlay.save(&overlay_path) {
        warn!(page = index, %err, "Failed to write annotated overlay");
    }

    PageOutcome {
        page_index: index,
        scale,
        doors,
        skips,
    }
}

/// Retain intermediate artifacts for inspection: the (deskewed) raster and
/// the detection ink mask.
fn save_debug_artifacts(page: &PageImage, ctx: &PageContext) {
    let raster_path = ctx
        .doc_dir
        .join(format!("{}_page{}.png", ctx.stem, page.index));
    if let Err(err) = page.image.save(&raster_path) {
        warn!(page = page.index, %err, "Failed to write raster artifact");
    }

    let gray = DynamicImage::ImageRgb8(page.image.clone()).to_luma8();
    let ink = enhance_for_detection(&gray);
    let ink_path = ctx
        .doc_dir
        .join(format!("{}_page{}_ink.png", ctx.stem, page.index));
    if let Err(err) = ink.save(&ink_path) {
        warn!(page = page.index, %err, "Failed to write ink-mask artifact");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doorgauge_core::types::{BoundingBox, Detection, DetectionSource, Scale, ScaleSource};
    use image::{Rgb, RgbImage};

    /// Detector stub returning the same fixed detections for every page.
    struct FixedDetector {
        detections: Vec<Detection>,
    }

    impl DoorDetector for FixedDetector {
        fn source(&self) -> DetectionSource {
            DetectionSource::TemplateMatch
        }

        fn detect(&self, _page: &PageImage) -> Result<Vec<Detection>> {
            Ok(self.detections.clone())
        }
    }

    /// Resolver stub with one scale slot per page index.
    struct PerPageResolver {
        scales: Vec<Option<Scale>>,
    }

    impl ResolveScale for PerPageResolver {
        fn resolve(&self, page: &PageImage) -> Option<Scale> {
            self.scales.get(page.index).copied().flatten()
        }
    }

    fn blank_page(index: usize) -> PageImage {
        PageImage {
            index,
            dpi: 400,
            image: RgbImage::from_pixel(120, 120, Rgb([255u8, 255, 255])),
        }
    }

    fn detection(x: u32) -> Detection {
        Detection {
            bbox: BoundingBox::new(x, 10, 18, 40),
            angle_deg: Some(0.0),
            confidence: 0.9,
            source: DetectionSource::TemplateMatch,
        }
    }

    fn pipeline(
        output_dir: &Path,
        detections: Vec<Detection>,
        scales: Vec<Option<Scale>>,
    ) -> Pipeline {
        let config = RunConfig {
            output_dir: output_dir.to_path_buf(),
            workers: 2,
            ..RunConfig::default()
        };
        Pipeline::new(
            config,
            Arc::new(FixedDetector { detections }),
            Arc::new(PerPageResolver { scales }),
        )
        .unwrap()
    }

    /// An unresolved page yields zero door records and exactly one skip per
    /// detection.
    #[tokio::test]
    async fn unresolved_scale_skips_every_detection() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(
            dir.path(),
            vec![detection(10), detection(60)],
            vec![None],
        );

        let outcomes = pipeline
            .process_pages("plan", vec![blank_page(0)])
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].doors.is_empty());
        assert_eq!(outcomes[0].skips.len(), 2);
        assert!(
            outcomes[0]
                .skips
                .iter()
                .all(|s| s.reason == SkipReason::ScaleUnresolved && s.bbox.is_some())
        );
    }

    /// Each page measures with its own scale; a cross-page leak would make
    /// both widths equal.
    #[tokio::test]
    async fn pages_use_their_own_scale() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(
            dir.path(),
            vec![detection(10)],
            vec![
                Scale::new(1.0, ScaleSource::TextRatio),
                Scale::new(2.0, ScaleSource::BarGraphic),
            ],
        );

        let outcomes = pipeline
            .process_pages("plan", vec![blank_page(0), blank_page(1)])
            .await
            .unwrap();

        assert_eq!(outcomes[0].doors[0].width_mm, 18.0);
        assert_eq!(outcomes[1].doors[0].width_mm, 36.0);
        assert_eq!(outcomes[0].doors[0].scale_source, ScaleSource::TextRatio);
        assert_eq!(outcomes[1].doors[0].scale_source, ScaleSource::BarGraphic);
    }

    /// Workers race, but outcomes come back in page order.
    #[tokio::test]
    async fn outcomes_are_ordered_by_page_index() {
        let dir = tempfile::tempdir().unwrap();
        let scale = Scale::new(1.0, ScaleSource::TextRatio);
        let pipeline = pipeline(
            dir.path(),
            vec![detection(10)],
            vec![scale, scale, scale, scale],
        );

        let pages = (0..4).map(blank_page).collect();
        let outcomes = pipeline.process_pages("plan", pages).await.unwrap();

        let indices: Vec<usize> = outcomes.iter().map(|o| o.page_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    /// Two identical runs produce identical door records, order and values.
    #[tokio::test]
    async fn runs_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let scale = Scale::new(3.175, ScaleSource::TextRatio);
        let pipeline = pipeline(
            dir.path(),
            vec![detection(10), detection(60)],
            vec![scale, scale],
        );

        let pages = || vec![blank_page(0), blank_page(1)];
        let first = pipeline.process_pages("plan", pages()).await.unwrap();
        let second = pipeline.process_pages("plan", pages()).await.unwrap();

        let doors_of = |outcomes: &[PageOutcome]| -> Vec<DoorRecord> {
            outcomes.iter().flat_map(|o| o.doors.clone()).collect()
        };
        assert_eq!(doors_of(&first), doors_of(&second));
    }

    /// A detector error on a page becomes a page-failed skip, not a run error.
    #[tokio::test]
    async fn detector_failure_is_page_scoped() {
        struct FailingDetector;
        impl DoorDetector for FailingDetector {
            fn source(&self) -> DetectionSource {
                DetectionSource::LearnedModel
            }
            fn detect(&self, _page: &PageImage) -> Result<Vec<Detection>> {
                Err(DoorgaugeError::Model("inference exploded".into()))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig {
            output_dir: dir.path().to_path_buf(),
            workers: 1,
            ..RunConfig::default()
        };
        let pipeline = Pipeline::new(
            config,
            Arc::new(FailingDetector),
            Arc::new(PerPageResolver {
                scales: vec![Scale::new(1.0, ScaleSource::TextRatio)],
            }),
        )
        .unwrap();

        let outcomes = pipeline
            .process_pages("plan", vec![blank_page(0)])
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].doors.is_empty());
        assert!(matches!(
            outcomes[0].skips[0].reason,
            SkipReason::PageFailed(_)
        ));
    }

    /// Annotated overlays are written per page as workers finish.
    #[tokio::test]
    async fn overlay_files_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(
            dir.path(),
            vec![detection(10)],
            vec![Scale::new(1.0, ScaleSource::TextRatio)],
        );

        pipeline
            .process_pages("plan", vec![blank_page(0)])
            .await
            .unwrap();

        assert!(dir.path().join("plan/plan_page0_annotated.png").exists());
    }
}
