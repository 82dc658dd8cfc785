// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page preprocessing — deskew and enhancement steps applied between
// rasterization and vision work.

pub mod deskew;
pub mod enhance;

pub use deskew::deskew;
pub use enhance::{adaptive_binarize, enhance_for_detection, otsu_binarize, otsu_threshold};
