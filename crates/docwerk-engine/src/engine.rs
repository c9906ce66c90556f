// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for external document engines.

use std::path::Path;

use docwerk_core::error::Result;

/// Handle to a document opened inside one engine session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentToken(pub u64);

/// One live session of an external document engine.
///
/// A session owns its private initialization context (profile directory) and
/// is used by one thread at a time, hence `Send` but not `Sync`.
pub trait DocumentEngine: Send {
    /// Cheap liveness probe run before every hand-out from the pool.
    fn is_responsive(&mut self) -> bool;

    /// Open `path` read-only, without any interactive prompt.
    fn open_read_only(&mut self, path: &Path) -> Result<DocumentToken>;

    /// Export an open document to PDF at `output`.
    fn export_pdf(&mut self, doc: DocumentToken, output: &Path, embed_fonts: bool) -> Result<()>;

    /// Number of documents currently open in this session.
    fn open_document_count(&self) -> usize;

    /// Close every open document without saving.
    fn close_all_documents(&mut self);

    /// Terminate the session and release its context. Idempotent.
    fn shutdown(&mut self);
}

/// Starts new engine sessions. Shared by the pool across threads.
pub trait EngineFactory: Send + Sync {
    /// Human-readable engine name for logs.
    fn name(&self) -> &str;

    /// Start a fresh session with its own initialization context.
    fn create(&self) -> Result<Box<dyn DocumentEngine>>;
}

/// Stateless one-shot converter for XML-package (`.docx`) documents.
pub trait PackageConverter: Send + Sync {
    fn convert(&self, input: &Path, output: &Path) -> Result<()>;
}
