// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — leveled recompression of engine-produced PDFs.

pub mod compress;
pub mod fingerprint;
pub mod policy;
pub mod xobject;

pub use compress::{CompressionReport, PdfCompressor};
pub use policy::{LevelProfile, SavePolicy};
