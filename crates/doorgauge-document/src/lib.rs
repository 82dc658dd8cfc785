// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// doorgauge-document — Document handling for the Doorgauge pipeline.
//
// Provides PDF rasterization (one high-resolution image per page), basic
// image operations (crop, rotate, grayscale, contrast), and the preprocessing
// steps floor-plan pages go through before vision work (deskew, enhancement,
// binarization).

pub mod image_ops;
pub mod pdf;
pub mod preprocess;

// Re-export the primary types so callers can use `doorgauge_document::PdfRasterizer` etc.
pub use image_ops::ImageOps;
pub use pdf::raster::{PageImage, PdfRasterizer};
