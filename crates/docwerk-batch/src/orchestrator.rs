// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch orchestration.
//
// Runs a list of inputs through validate -> free-space check -> output
// resolution -> conversion -> optional recompression, one job at a time on
// the calling thread. Job failures are recorded, never propagated. Progress
// is checkpointed every few jobs so a crashed batch can resume.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use docwerk_core::human_errors::humanize_error;
use docwerk_core::{CollisionPolicy, CompressionSettings, ConversionJob, JobStatus, BatchResult};
use docwerk_document::{FileValidator, PdfCompressor, estimate_pdf_size};
use docwerk_engine::ConversionDispatcher;

use crate::confirm::OverwriteDecider;
use crate::output::{OutputDecision, resolve_output};
use crate::recovery::{RecoveryCheckpoint, RecoveryStore};
use crate::space::{SpaceProbe, VolumeSpace, ensure_free_space};

/// Jobs between two checkpoints.
pub const CHECKPOINT_INTERVAL: usize = 5;

/// Advisory stop request, checked between jobs.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Receives job status changes and progress. Called on the batch thread.
pub trait BatchObserver: Send + Sync {
    fn job_updated(&self, _job: &ConversionJob) {}

    /// `done` of `total` jobs have reached a terminal state.
    fn progress(&self, _done: usize, _total: usize) {}
}

/// Observer that ignores everything.
pub struct SilentObserver;

impl BatchObserver for SilentObserver {}

pub struct BatchOrchestrator {
    validator: FileValidator,
    dispatcher: ConversionDispatcher,
    compressor: PdfCompressor,
    compression: CompressionSettings,
    policy: CollisionPolicy,
    decider: Option<Arc<dyn OverwriteDecider>>,
    space: Box<dyn SpaceProbe>,
    recovery: Option<RecoveryStore>,
    checkpoint_interval: usize,
}

impl BatchOrchestrator {
    pub fn new(validator: FileValidator, dispatcher: ConversionDispatcher) -> Self {
        Self {
            validator,
            dispatcher,
            compressor: PdfCompressor::new(),
            compression: CompressionSettings::disabled(),
            policy: CollisionPolicy::Overwrite,
            decider: None,
            space: Box::new(VolumeSpace),
            recovery: None,
            checkpoint_interval: CHECKPOINT_INTERVAL,
        }
    }

    pub fn with_compression(mut self, settings: CompressionSettings) -> Self {
        self.compression = settings;
        self
    }

    pub fn with_collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_decider(mut self, decider: Arc<dyn OverwriteDecider>) -> Self {
        self.decider = Some(decider);
        self
    }

    pub fn with_space_probe(mut self, probe: Box<dyn SpaceProbe>) -> Self {
        self.space = probe;
        self
    }

    pub fn with_recovery(mut self, store: RecoveryStore) -> Self {
        self.recovery = Some(store);
        self
    }

    pub fn with_checkpoint_interval(mut self, every: usize) -> Self {
        self.checkpoint_interval = every.max(1);
        self
    }

    pub fn dispatcher(&self) -> &ConversionDispatcher {
        &self.dispatcher
    }

    /// Convert every file in order, stopping early if `cancel` is set.
    #[instrument(skip_all, fields(total = files.len()))]
    pub fn run(
        &self,
        files: &[PathBuf],
        output_dir: Option<&Path>,
        cancel: &CancellationFlag,
        observer: &dyn BatchObserver,
    ) -> BatchResult {
        let started = Instant::now();
        let total = files.len();
        let mut result = BatchResult::new(total);
        let mut processed = BTreeSet::new();
        let mut failed = BTreeSet::new();

        info!(total, output_dir = ?output_dir, "Batch started");

        for (index, input) in files.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(done = result.completed(), "Batch cancelled");
                result.cancelled = true;
                break;
            }

            let mut job = ConversionJob::new(index, input);
            self.run_job(&mut job, output_dir, observer);

            match job.status {
                JobStatus::Failed => failed.insert(index),
                _ => processed.insert(index),
            };
            result.record(&job);
            observer.progress(result.completed(), total);

            if (index + 1) % self.checkpoint_interval == 0 {
                self.checkpoint(files, output_dir, &processed, &failed);
            }
        }

        if let Some(store) = &self.recovery
            && let Err(err) = store.clear()
        {
            warn!(error = %err, "Could not clear checkpoint");
        }

        result.elapsed = started.elapsed();
        info!(
            success = result.success,
            failed = result.failed,
            skipped = result.skipped,
            elapsed_secs = result.elapsed.as_secs_f64(),
            "Batch finished"
        );
        result
    }

    fn run_job(&self, job: &mut ConversionJob, output_dir: Option<&Path>, observer: &dyn BatchObserver) {
        set_status(job, JobStatus::Validating, observer);

        let validation = self.validator.validate(&job.input, true);
        if !validation.valid {
            return finish(job, JobStatus::Failed, validation.reason, observer);
        }

        let target = output_dir
            .map(Path::to_path_buf)
            .or_else(|| job.input.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        if let Err(err) = ensure_free_space(self.space.as_ref(), &target, estimate_pdf_size(&job.input)) {
            return finish(job, JobStatus::Failed, humanize_error(&err).message, observer);
        }

        let output = match resolve_output(&job.input, output_dir, self.policy, self.decider.as_deref()) {
            OutputDecision::Write(path) => path,
            OutputDecision::Skip(path) => {
                let message = format!("Skipped, {} already exists", path.display());
                return finish(job, JobStatus::Skipped, message, observer);
            }
        };
        job.output = Some(output.clone());

        set_status(job, JobStatus::Converting, observer);
        let outcome = self.dispatcher.convert(&job.input, &output);
        if !outcome.success {
            return finish(job, JobStatus::Failed, outcome.message, observer);
        }

        let mut message = outcome.message;
        if self.compression.enabled {
            set_status(job, JobStatus::Compressing, observer);
            if self.compressor.compress(&output, &self.compression) {
                message.push_str(&format!(" (compressed at level {})", self.compression.level));
            }
        }
        finish(job, JobStatus::Succeeded, message, observer);
    }

    fn checkpoint(
        &self,
        files: &[PathBuf],
        output_dir: Option<&Path>,
        processed: &BTreeSet<usize>,
        failed: &BTreeSet<usize>,
    ) {
        let Some(store) = &self.recovery else {
            return;
        };
        let saved = RecoveryCheckpoint::new(
            files.to_vec(),
            output_dir.map(Path::to_path_buf),
            processed.clone(),
            failed.clone(),
        )
        .and_then(|checkpoint| store.save(&checkpoint));
        if let Err(err) = saved {
            warn!(error = %err, "Could not save checkpoint");
        }
    }
}

fn set_status(job: &mut ConversionJob, status: JobStatus, observer: &dyn BatchObserver) {
    match job.advance(status) {
        Ok(()) => {
            debug!(job = %job.id, index = job.index, ?status, "Job status");
            observer.job_updated(job);
        }
        Err(err) => warn!(index = job.index, error = %err, "Ignored status change"),
    }
}

fn finish(job: &mut ConversionJob, status: JobStatus, message: String, observer: &dyn BatchObserver) {
    match job.finish(status, message) {
        Ok(()) => {
            match status {
                JobStatus::Succeeded => info!(file = %job.file_name(), "Job succeeded"),
                _ => warn!(
                    file = %job.file_name(),
                    ?status,
                    message = job.message.as_deref().unwrap_or_default(),
                    "Job did not succeed"
                ),
            }
            observer.job_updated(job);
        }
        Err(err) => warn!(index = job.index, error = %err, "Ignored status change"),
    }
}
