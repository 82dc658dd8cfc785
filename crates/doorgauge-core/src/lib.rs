// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Doorgauge — Core types, configuration, and error definitions shared across
// all crates.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod types;
pub mod units;

pub use config::{RunConfig, ScalePriority};
pub use error::DoorgaugeError;
pub use types::*;
