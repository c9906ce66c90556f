// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process fake engine shared by the engine integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use docwerk_core::error::{DocwerkError, Result};
use docwerk_engine::{DocumentEngine, DocumentToken, EngineFactory, PackageConverter};

pub const FAKE_PDF: &[u8] = b"%PDF-1.4\n% fake\n%%EOF\n";

/// Counters and switches shared between a factory and its engines.
#[derive(Default)]
pub struct Probe {
    pub created: AtomicUsize,
    pub shut_down: AtomicUsize,
    pub exported: AtomicUsize,
    /// New engines report themselves unresponsive while set.
    pub unresponsive: AtomicBool,
    /// `create` fails while set.
    pub refuse: AtomicBool,
    /// Engines leave one document open even after `close_all_documents`.
    pub leak_documents: AtomicBool,
}

pub struct FakeEngine {
    probe: Arc<Probe>,
    open: usize,
    responsive: bool,
    alive: bool,
}

impl DocumentEngine for FakeEngine {
    fn is_responsive(&mut self) -> bool {
        self.alive && self.responsive && !self.probe.unresponsive.load(Ordering::SeqCst)
    }

    fn open_read_only(&mut self, path: &Path) -> Result<DocumentToken> {
        if !path.exists() {
            return Err(DocwerkError::DocumentOpenFailed(path.display().to_string()));
        }
        self.open += 1;
        Ok(DocumentToken(self.open as u64))
    }

    fn export_pdf(&mut self, _doc: DocumentToken, output: &Path, _embed_fonts: bool) -> Result<()> {
        std::fs::write(output, FAKE_PDF)?;
        self.probe.exported.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn open_document_count(&self) -> usize {
        self.open
    }

    fn close_all_documents(&mut self) {
        self.open = if self.probe.leak_documents.load(Ordering::SeqCst) {
            1
        } else {
            0
        };
    }

    fn shutdown(&mut self) {
        if self.alive {
            self.alive = false;
            self.probe.shut_down.fetch_add(1, Ordering::SeqCst);
        }
    }
}

pub struct FakeFactory {
    pub probe: Arc<Probe>,
}

impl FakeFactory {
    pub fn new() -> (Arc<Self>, Arc<Probe>) {
        let probe = Arc::new(Probe::default());
        (
            Arc::new(Self {
                probe: Arc::clone(&probe),
            }),
            probe,
        )
    }
}

impl EngineFactory for FakeFactory {
    fn name(&self) -> &str {
        "fake"
    }

    fn create(&self) -> Result<Box<dyn DocumentEngine>> {
        if self.probe.refuse.load(Ordering::SeqCst) {
            return Err(DocwerkError::EngineUnavailable("fake engine refused".into()));
        }
        self.probe.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeEngine {
            probe: Arc::clone(&self.probe),
            open: 0,
            responsive: true,
            alive: true,
        }))
    }
}

/// Package converter that copies a fixed PDF, or fails when `fail` is set.
pub struct FakePackageConverter {
    pub fail: Option<fn() -> DocwerkError>,
}

impl PackageConverter for FakePackageConverter {
    fn convert(&self, _input: &Path, output: &Path) -> Result<()> {
        if let Some(fail) = self.fail {
            return Err(fail());
        }
        std::fs::write(output, FAKE_PDF)?;
        Ok(())
    }
}
