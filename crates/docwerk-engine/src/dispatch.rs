// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Conversion routing.
//
// The route is chosen once from the input extension. `.docx` goes through the
// stateless package converter; `.doc` needs a pooled engine session, which is
// released on every exit path by the lease guard.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use docwerk_core::DocumentKind;
use docwerk_core::config::ConfigReader;
use docwerk_core::error::{DocwerkError, Result};
use docwerk_core::human_errors::humanize_error;
use tracing::{info, instrument, warn};

use crate::engine::PackageConverter;
use crate::pool::{DEFAULT_ACQUIRE_TIMEOUT, EnginePool, MAX_ACQUIRE_TIMEOUT};

/// Conversion strategy for one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionRoute {
    /// Compound-file `.doc` through a pooled engine session.
    LegacyBinary,
    /// Zip-of-XML `.docx` through a one-shot conversion.
    XmlPackage,
}

impl ConversionRoute {
    pub fn for_path(path: &Path) -> Result<Self> {
        match DocumentKind::from_path(path) {
            Some(DocumentKind::LegacyBinary) => Ok(Self::LegacyBinary),
            Some(DocumentKind::XmlPackage) => Ok(Self::XmlPackage),
            None => Err(DocwerkError::UnsupportedFormat(
                path.extension()
                    .map(|e| format!(".{}", e.to_string_lossy()))
                    .unwrap_or_else(|| path.display().to_string()),
            )),
        }
    }
}

/// Result of one conversion as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionOutcome {
    pub success: bool,
    pub message: String,
}

pub struct ConversionDispatcher {
    pool: Option<Arc<EnginePool>>,
    package: Arc<dyn PackageConverter>,
    acquire_timeout: Duration,
    embed_fonts: bool,
}

impl ConversionDispatcher {
    /// `pool` is `None` where legacy conversion is not available.
    pub fn new(pool: Option<Arc<EnginePool>>, package: Arc<dyn PackageConverter>) -> Self {
        Self {
            pool,
            package,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            embed_fonts: true,
        }
    }

    pub fn from_config(
        pool: Option<Arc<EnginePool>>,
        package: Arc<dyn PackageConverter>,
        config: &dyn ConfigReader,
    ) -> Self {
        let secs = config.get_i64(
            "engine.acquire_timeout_secs",
            DEFAULT_ACQUIRE_TIMEOUT.as_secs() as i64,
        );
        let max = MAX_ACQUIRE_TIMEOUT.as_secs() as i64;
        Self::new(pool, package).with_acquire_timeout(Duration::from_secs(secs.clamp(0, max) as u64))
    }

    /// Capped at [`MAX_ACQUIRE_TIMEOUT`].
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout.min(MAX_ACQUIRE_TIMEOUT);
        self
    }

    pub fn pool(&self) -> Option<&Arc<EnginePool>> {
        self.pool.as_ref()
    }

    /// Convert and describe the result in user terms. Never fails.
    pub fn convert(&self, input: &Path, output: &Path) -> ConversionOutcome {
        match self.try_convert(input, output) {
            Ok(path) => ConversionOutcome {
                success: true,
                message: format!("Converted to {}", path.display()),
            },
            Err(err) => {
                warn!(input = %input.display(), error = %err, "Conversion failed");
                ConversionOutcome {
                    success: false,
                    message: humanize_error(&err).message,
                }
            }
        }
    }

    /// Convert `input` to a PDF at `output` and return the written path.
    #[instrument(skip(self), fields(input = %input.display()))]
    pub fn try_convert(&self, input: &Path, output: &Path) -> Result<PathBuf> {
        if !input.exists() {
            return Err(DocwerkError::NotFound(input.to_path_buf()));
        }
        let route = ConversionRoute::for_path(input)?;

        if let Some(parent) = output.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|err| DocwerkError::on_write(err, parent))?;
        }

        match route {
            ConversionRoute::XmlPackage => self.package.convert(input, output)?,
            ConversionRoute::LegacyBinary => self.convert_legacy(input, output)?,
        }

        let written = std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(DocwerkError::SaveFailed(format!(
                "no PDF was written to {}",
                output.display()
            )));
        }
        info!(?route, output = %output.display(), bytes = written, "Converted");
        Ok(output.to_path_buf())
    }

    fn convert_legacy(&self, input: &Path, output: &Path) -> Result<()> {
        let pool = self.pool.as_ref().ok_or_else(|| {
            DocwerkError::EngineUnavailable(".doc conversion is not available here".into())
        })?;
        let mut lease = pool.acquire(self.acquire_timeout)?;
        let engine = lease.engine();
        let doc = engine.open_read_only(input)?;
        engine.export_pdf(doc, output, self.embed_fonts)
    }
}
