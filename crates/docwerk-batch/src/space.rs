// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Free disk space checks before each conversion.

use std::path::Path;

use docwerk_core::error::{DocwerkError, Result};

const MB: f64 = 1024.0 * 1024.0;

/// Reports free bytes on the volume holding a path.
pub trait SpaceProbe: Send + Sync {
    fn available_bytes(&self, path: &Path) -> Result<u64>;
}

/// [`SpaceProbe`] backed by `fs2`.
#[derive(Debug, Default, Clone, Copy)]
pub struct VolumeSpace;

impl SpaceProbe for VolumeSpace {
    fn available_bytes(&self, path: &Path) -> Result<u64> {
        Ok(fs2::available_space(existing_ancestor(path))?)
    }
}

/// Nearest existing directory at or above `path`, so a not-yet-created
/// output folder is measured on the volume it will live on.
fn existing_ancestor(path: &Path) -> &Path {
    path.ancestors()
        .find(|p| !p.as_os_str().is_empty() && p.exists())
        .unwrap_or_else(|| Path::new("."))
}

/// Fail with [`DocwerkError::InsufficientDiskSpace`] unless `required` bytes
/// are free under `target`.
pub fn ensure_free_space(probe: &dyn SpaceProbe, target: &Path, required: u64) -> Result<()> {
    let free = probe.available_bytes(target)?;
    if free < required {
        return Err(DocwerkError::InsufficientDiskSpace {
            free_mb: free as f64 / MB,
            required_mb: required as f64 / MB,
        });
    }
    Ok(())
}
