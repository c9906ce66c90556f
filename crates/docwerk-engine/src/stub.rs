// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub converter for platforms without a supported document engine. There is
// no stub pool: legacy jobs see no pool at all and fail straight away.

use std::path::Path;

use docwerk_core::error::{DocwerkError, Result};

use crate::engine::PackageConverter;

pub struct StubPackageConverter;

impl PackageConverter for StubPackageConverter {
    fn convert(&self, input: &Path, _output: &Path) -> Result<()> {
        tracing::warn!(input = %input.display(), "No document engine on this platform");
        Err(DocwerkError::EngineUnavailable(
            "no document engine is supported on this platform".into(),
        ))
    }
}
