// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Crash-recovery checkpoints.
//
// During a batch the orchestrator periodically writes `recovery.json` with the
// full input list and the indices already handled. After a crash the next
// start offers to resume with only the remaining files. The file is written
// atomically (temp file + rename in the same directory) so a crash mid-write
// leaves the previous checkpoint intact.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use docwerk_core::error::{DocwerkError, Result};

/// File name of the checkpoint inside the recovery directory.
pub const RECOVERY_FILE: &str = "recovery.json";

/// Durable snapshot of batch progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryCheckpoint {
    pub timestamp: DateTime<Utc>,
    pub files: Vec<PathBuf>,
    pub output_folder: Option<PathBuf>,
    /// Indices that finished without failing (succeeded or skipped).
    pub processed: BTreeSet<usize>,
    pub failed: BTreeSet<usize>,
    pub total: usize,
    pub remaining: usize,
}

impl RecoveryCheckpoint {
    /// Build a checkpoint stamped with the current time.
    pub fn new(
        files: Vec<PathBuf>,
        output_folder: Option<PathBuf>,
        processed: BTreeSet<usize>,
        failed: BTreeSet<usize>,
    ) -> Result<Self> {
        let mut checkpoint = Self {
            timestamp: Utc::now(),
            total: files.len(),
            files,
            output_folder,
            processed,
            failed,
            remaining: 0,
        };
        checkpoint.validate()?;
        checkpoint.remaining = checkpoint.compute_remaining();
        Ok(checkpoint)
    }

    fn validate(&self) -> Result<()> {
        if self.total != self.files.len() {
            return Err(DocwerkError::Checkpoint(format!(
                "total is {} but {} files are listed",
                self.total,
                self.files.len()
            )));
        }
        if let Some(index) = self.processed.intersection(&self.failed).next() {
            return Err(DocwerkError::Checkpoint(format!(
                "file {index} is both processed and failed"
            )));
        }
        if let Some(index) = self
            .processed
            .iter()
            .chain(&self.failed)
            .find(|&&i| i >= self.total)
        {
            return Err(DocwerkError::Checkpoint(format!(
                "index {index} is out of range for {} files",
                self.total
            )));
        }
        Ok(())
    }

    fn compute_remaining(&self) -> usize {
        self.total - self.processed.len() - self.failed.len()
    }

    /// Inputs not yet processed or failed, in batch order.
    pub fn remaining_files(&self) -> Vec<PathBuf> {
        self.files
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.processed.contains(i) && !self.failed.contains(i))
            .map(|(_, path)| path.clone())
            .collect()
    }

    /// Text for the "resume?" prompt.
    pub fn summary(&self) -> String {
        let when = self.timestamp.with_timezone(&Local).format("%d.%m.%Y %H:%M");
        format!(
            "Unfinished conversion from {when}\n\n\
             Total files: {}\n\
             Processed:   {}\n\
             Failed:      {}\n\
             Remaining:   {}\n\n\
             Resume the conversion?",
            self.total,
            self.processed.len(),
            self.failed.len(),
            self.remaining
        )
    }
}

/// Reads and writes `recovery.json` inside one directory.
#[derive(Debug, Clone)]
pub struct RecoveryStore {
    dir: PathBuf,
}

impl RecoveryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(RECOVERY_FILE)
    }

    pub fn exists(&self) -> bool {
        self.path().is_file()
    }

    /// Write `checkpoint` atomically.
    #[instrument(skip_all, fields(path = %self.path().display()))]
    pub fn save(&self, checkpoint: &RecoveryCheckpoint) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_vec_pretty(checkpoint)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".recovery-")
            .suffix(".json")
            .tempfile_in(&self.dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.path())
            .map_err(|e| DocwerkError::Io(e.error))?;

        info!(
            processed = checkpoint.processed.len(),
            failed = checkpoint.failed.len(),
            remaining = checkpoint.remaining,
            "Checkpoint saved"
        );
        Ok(())
    }

    /// Load and validate the checkpoint. `Ok(None)` when there is none.
    pub fn load(&self) -> Result<Option<RecoveryCheckpoint>> {
        let path = self.path();
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let mut checkpoint: RecoveryCheckpoint = serde_json::from_slice(&bytes)?;
        checkpoint.validate()?;
        let stored = checkpoint.remaining;
        checkpoint.remaining = checkpoint.compute_remaining();
        if stored != checkpoint.remaining {
            warn!(stored, actual = checkpoint.remaining, "Checkpoint remaining count corrected");
        }
        info!(remaining = checkpoint.remaining, "Found unfinished batch");
        Ok(Some(checkpoint))
    }

    /// Delete the checkpoint. Returns whether one existed.
    pub fn clear(&self) -> Result<bool> {
        match std::fs::remove_file(self.path()) {
            Ok(()) => {
                info!("Checkpoint cleared");
                Ok(true)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}
