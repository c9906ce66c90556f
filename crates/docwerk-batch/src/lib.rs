// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docwerk-batch — Runs many conversions as one batch.
//
// Owns the per-job pipeline, output collision handling (including interactive
// overwrite confirmation), the free-space check, and the recovery checkpoint
// that lets an interrupted batch resume where it stopped.

pub mod confirm;
pub mod orchestrator;
pub mod output;
pub mod recovery;
pub mod space;

pub use confirm::{ChannelDecider, OverwriteDecider, OverwriteRequest};
pub use orchestrator::{BatchObserver, BatchOrchestrator, CancellationFlag, SilentObserver};
pub use output::{OutputDecision, auto_numbered, default_output_path, resolve_output};
pub use recovery::{RecoveryCheckpoint, RecoveryStore};
pub use space::{SpaceProbe, VolumeSpace};
