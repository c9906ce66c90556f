// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Docwerk.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Top-level error type for all Docwerk operations.
#[derive(Debug, Error)]
pub enum DocwerkError {
    // -- Validation errors --
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("not a regular file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("unsupported extension: {0}")]
    UnsupportedExtension(String),

    #[error("file is too large: {size_mb:.1} MB (maximum {max_mb} MB)")]
    TooLarge { size_mb: f64, max_mb: u64 },

    #[error("file is not readable: {}", .0.display())]
    Unreadable(PathBuf),

    #[error("file is corrupt: {0}")]
    CorruptContainer(String),

    // -- Engine errors --
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("document engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("document engine is not responding")]
    EngineUnresponsive,

    #[error("engine pool is closed")]
    PoolClosed,

    #[error("could not open document: {0}")]
    DocumentOpenFailed(String),

    #[error("could not save PDF: {0}")]
    SaveFailed(String),

    #[error("out of memory while converting {0}")]
    OutOfMemory(String),

    // -- Compression errors (never fatal to a job) --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    // -- Storage / environment --
    #[error("insufficient disk space: {free_mb:.1} MB free, {required_mb:.1} MB required")]
    InsufficientDiskSpace { free_mb: f64, required_mb: f64 },

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("recovery checkpoint is invalid: {0}")]
    Checkpoint(String),

    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DocwerkError {
    /// Wrap an I/O failure while writing under `path`. Access problems become
    /// [`DocwerkError::PermissionDenied`] so they read differently to the user.
    pub fn on_write(err: std::io::Error, path: &Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.display().to_string()),
            _ => Self::Io(err),
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocwerkError>;
