// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Filesystem helpers: input discovery, size formatting, and output size
// estimates used by the disk-space check.

use std::path::{Path, PathBuf};

use docwerk_core::DocumentKind;
use docwerk_core::error::Result;
use tracing::debug;

/// Assumed PDF size when the input cannot be measured.
pub const FALLBACK_PDF_ESTIMATE: u64 = 10 * 1024 * 1024;

/// Supported documents in `dir`, sorted by path. Word's `~$` lock files are
/// ignored.
pub fn collect_documents(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    walk(dir, recursive, &mut found)?;
    found.sort();
    debug!(dir = %dir.display(), count = found.len(), "Collected documents");
    Ok(found)
}

fn walk(dir: &Path, recursive: bool, found: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if recursive {
                walk(&path, recursive, found)?;
            }
        } else if DocumentKind::from_path(&path).is_some() && !is_lock_file(&path) {
            found.push(path);
        }
    }
    Ok(())
}

fn is_lock_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("~$"))
}

/// Format a byte count as `B`, `KB`, or `MB`.
pub fn human_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    if bytes < KB {
        format!("{bytes} B")
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}

/// Expected PDF size for an input: 1.3 times its size, or 10 MB when the
/// input cannot be read.
pub fn estimate_pdf_size(path: &Path) -> u64 {
    std::fs::metadata(path)
        .map(|m| m.len().saturating_mul(13) / 10)
        .unwrap_or(FALLBACK_PDF_ESTIMATE)
}
