// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF rasterizer — renders each page of a floor-plan PDF to a high-resolution
// RGB image using the pure-Rust `hayro` renderer.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hayro::{InterpreterSettings, Pdf, RenderSettings};
use image::RgbImage;
use tracing::{debug, info, instrument};

use doorgauge_core::error::{DoorgaugeError, Result};

/// PDF user space is 1/72 inch; rendering at `dpi` means scaling by `dpi / 72`.
const PDF_POINTS_PER_INCH: f32 = 72.0;

/// One rasterized page: the image plus the metadata the rest of the pipeline
/// needs to interpret it.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// Zero-based index in document order.
    pub index: usize,
    /// The resolution this page was rendered at.
    pub dpi: u32,
    pub image: RgbImage,
}

impl PageImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Renders the pages of one PDF document at a fixed DPI.
///
/// The document is parsed once at construction; pages are rendered on demand,
/// in document order, and [`pages`](Self::pages) can be called again to
/// restart the sequence from the beginning.
pub struct PdfRasterizer {
    pdf: Pdf,
    dpi: u32,
    page_count: usize,
    source: PathBuf,
}

impl std::fmt::Debug for PdfRasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfRasterizer")
            .field("dpi", &self.dpi)
            .field("page_count", &self.page_count)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl PdfRasterizer {
    /// Open a PDF from the filesystem.
    ///
    /// Fails with [`DoorgaugeError::Pdf`] if the file cannot be read or is not
    /// a parseable PDF.
    #[instrument(skip_all, fields(path = %path.as_ref().display(), dpi))]
    pub fn open(path: impl AsRef<Path>, dpi: u32) -> Result<Self> {
        let path_ref = path.as_ref();
        info!("Opening PDF: {}", path_ref.display());

        let data = std::fs::read(path_ref).map_err(|err| {
            DoorgaugeError::Pdf(format!("failed to read {}: {}", path_ref.display(), err))
        })?;

        let pdf = Pdf::new(Arc::new(data)).map_err(|err| {
            DoorgaugeError::Pdf(format!(
                "failed to parse {}: {:?}",
                path_ref.display(),
                err
            ))
        })?;

        let page_count = pdf.pages().len();
        if page_count == 0 {
            return Err(DoorgaugeError::Pdf(format!(
                "{} contains no pages",
                path_ref.display()
            )));
        }

        debug!(pages = page_count, "PDF loaded");

        Ok(Self {
            pdf,
            dpi,
            page_count,
            source: path_ref.to_path_buf(),
        })
    }

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// The source path the document was opened from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// The DPI pages are rendered at.
    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    /// Render a single page (zero-based index) to an RGB image.
    #[instrument(skip(self), fields(index))]
    pub fn render_page(&self, index: usize) -> Result<PageImage> {
        let page = self.pdf.pages().get(index).ok_or_else(|| {
            DoorgaugeError::Pdf(format!(
                "page {} out of range (document has {} pages)",
                index, self.page_count
            ))
        })?;

        let media_box = page.media_box();
        let width = media_box.x1 - media_box.x0;
        let height = media_box.y1 - media_box.y0;
        if width <= 0.0 || height <= 0.0 {
            return Err(DoorgaugeError::Pdf(format!(
                "page {} has invalid media box {}x{}",
                index, width, height
            )));
        }

        let scale = self.dpi as f32 / PDF_POINTS_PER_INCH;
        let settings = RenderSettings {
            x_scale: scale,
            y_scale: scale,
            ..Default::default()
        };

        let pixmap = hayro::render(page, &InterpreterSettings::default(), &settings);

        // The pixmap is RGBA; drop the alpha channel.
        let rgba = pixmap.data_as_u8_slice();
        let mut rgb = Vec::with_capacity(pixmap.width() as usize * pixmap.height() as usize * 3);
        for chunk in rgba.chunks(4) {
            rgb.push(chunk[0]);
            rgb.push(chunk[1]);
            rgb.push(chunk[2]);
        }

        let image = RgbImage::from_raw(u32::from(pixmap.width()), u32::from(pixmap.height()), rgb)
            .ok_or_else(|| {
                DoorgaugeError::Pdf(format!("page {} produced a malformed pixmap", index))
            })?;

        debug!(
            index,
            width = image.width(),
            height = image.height(),
            "Page rasterized"
        );

        Ok(PageImage {
            index,
            dpi: self.dpi,
            image,
        })
    }

    /// Lazy iterator over all pages in document order.
    ///
    /// Each call starts over from page zero, so a consumer can make multiple
    /// passes without re-opening the document.
    pub fn pages(&self) -> impl Iterator<Item = Result<PageImage>> + '_ {
        (0..self.page_count).map(|index| self.render_page(index))
    }
}

/// Whether a path looks like a PDF, by extension.
pub fn is_pdf_path(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_pdf_path_by_extension() {
        assert!(is_pdf_path("plan.pdf"));
        assert!(is_pdf_path("PLAN.PDF"));
        assert!(!is_pdf_path("plan.png"));
        assert!(!is_pdf_path("plan"));
    }

    #[test]
    fn open_missing_file_is_pdf_error() {
        let err = PdfRasterizer::open("/nonexistent/plan.pdf", 400).unwrap_err();
        assert!(matches!(err, DoorgaugeError::Pdf(_)));
    }

    #[test]
    fn open_non_pdf_bytes_is_pdf_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bogus.pdf");
        std::fs::write(&path, b"not a pdf at all").unwrap();

        let err = PdfRasterizer::open(&path, 400).unwrap_err();
        assert!(matches!(err, DoorgaugeError::Pdf(_)));
    }
}
