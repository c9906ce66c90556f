// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Docwerk converter.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DocwerkError, Result};

/// Unique identifier for a conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Supported input document kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    /// Compound-file `.doc` (OLE2 signature).
    LegacyBinary,
    /// Zip-of-XML `.docx`.
    XmlPackage,
}

impl DocumentKind {
    /// Extensions accepted as input, lowercase and without the dot.
    pub const EXTENSIONS: [&'static str; 2] = ["doc", "docx"];

    /// Infer the document kind from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "doc" => Some(Self::LegacyBinary),
            "docx" => Some(Self::XmlPackage),
            _ => None,
        }
    }

    /// Infer the document kind from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Canonical extension for this kind.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::LegacyBinary => "doc",
            Self::XmlPackage => "docx",
        }
    }
}

/// Lifecycle states of a conversion job.
///
/// States only move forward; [`ConversionJob::retry`] is the single way back
/// to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Validating,
    Converting,
    Compressing,
    Succeeded,
    Failed,
    Skipped,
}

impl JobStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Validating => 1,
            Self::Converting => 2,
            Self::Compressing => 3,
            Self::Succeeded | Self::Failed | Self::Skipped => 4,
        }
    }

    /// Whether the job has finished (successfully or not).
    pub fn is_terminal(self) -> bool {
        self.rank() == 4
    }

    /// Whether `next` is a legal forward transition from `self`.
    pub fn can_advance_to(self, next: JobStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

/// A single file moving through the batch pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionJob {
    pub id: JobId,
    /// Position of this job within its batch.
    pub index: usize,
    pub input: PathBuf,
    /// Resolved destination; `None` until the collision policy has run.
    pub output: Option<PathBuf>,
    pub status: JobStatus,
    /// Last human-readable message attached to the job.
    pub message: Option<String>,
}

impl ConversionJob {
    pub fn new(index: usize, input: impl Into<PathBuf>) -> Self {
        Self {
            id: JobId::new(),
            index,
            input: input.into(),
            output: None,
            status: JobStatus::Pending,
            message: None,
        }
    }

    /// Move the job forward. Backward or out-of-terminal moves are rejected.
    pub fn advance(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_advance_to(next) {
            return Err(DocwerkError::InvalidSetting(format!(
                "illegal job transition {:?} -> {:?}",
                self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    /// Finish the job with a terminal status and message.
    pub fn finish(&mut self, status: JobStatus, message: impl Into<String>) -> Result<()> {
        debug_assert!(status.is_terminal());
        self.advance(status)?;
        self.message = Some(message.into());
        Ok(())
    }

    /// Explicit external retry: restart from `Pending`, forgetting the
    /// previous output and message.
    pub fn retry(&mut self) {
        self.status = JobStatus::Pending;
        self.output = None;
        self.message = None;
    }

    /// File name for display.
    pub fn file_name(&self) -> String {
        self.input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.input.display().to_string())
    }
}

/// PDF recompression level, always within `1..=9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 9;

    /// Build a level, rejecting values outside `1..=9`.
    pub fn new(level: u8) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&level) {
            Ok(Self(level))
        } else {
            Err(DocwerkError::InvalidSetting(format!(
                "compression level {level} is outside {}..={}",
                Self::MIN,
                Self::MAX
            )))
        }
    }

    /// Build a level from an arbitrary (configuration) integer, clamping it
    /// into range.
    pub fn clamped(level: i64) -> Self {
        Self(level.clamp(Self::MIN as i64, Self::MAX as i64) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Every level from lowest to highest.
    pub fn all() -> impl Iterator<Item = CompressionLevel> {
        (Self::MIN..=Self::MAX).map(CompressionLevel)
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self(6)
    }
}

impl TryFrom<u8> for CompressionLevel {
    type Error = DocwerkError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<CompressionLevel> for u8 {
    fn from(level: CompressionLevel) -> u8 {
        level.0
    }
}

impl std::fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether and how hard to recompress produced PDFs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompressionSettings {
    pub enabled: bool,
    pub level: CompressionLevel,
}

impl CompressionSettings {
    pub fn new(enabled: bool, level: u8) -> Result<Self> {
        Ok(Self {
            enabled,
            level: CompressionLevel::new(level)?,
        })
    }

    pub fn disabled() -> Self {
        Self::default()
    }
}

/// Outcome of validating one input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub reason: String,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            reason: "OK".into(),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: reason.into(),
        }
    }
}

impl From<Result<()>> for ValidationResult {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::ok(),
            Err(err) => Self::invalid(err.to_string()),
        }
    }
}

/// How to resolve an output path that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollisionPolicy {
    /// Replace the existing file.
    Overwrite,
    /// Leave the existing file and mark the job skipped.
    SkipIfExists,
    /// Append ` (1)`, ` (2)`, ... until the name is free.
    AutoNumber,
    /// Ask an overwrite decider; a refusal skips the job.
    Confirm,
}

impl CollisionPolicy {
    /// Derive the policy from the two configuration flags.
    ///
    /// Auto-numbering wins over the overwrite question; without either flag
    /// existing files are overwritten.
    pub fn from_flags(ask_overwrite: bool, auto_number: bool) -> Self {
        match (auto_number, ask_overwrite) {
            (true, _) => Self::AutoNumber,
            (false, true) => Self::Confirm,
            (false, false) => Self::Overwrite,
        }
    }
}

/// Per-job record in a [`BatchResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub file_name: String,
    pub success: bool,
    pub status: JobStatus,
    pub message: String,
    pub output: Option<PathBuf>,
}

/// Aggregate result of one batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResult {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Set when the run stopped early on the cancellation flag.
    pub cancelled: bool,
    pub elapsed: Duration,
    pub outcomes: Vec<JobOutcome>,
}

impl BatchResult {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Record a finished job and update the counters.
    pub fn record(&mut self, job: &ConversionJob) {
        match job.status {
            JobStatus::Succeeded => self.success += 1,
            JobStatus::Skipped => self.skipped += 1,
            _ => self.failed += 1,
        }
        self.outcomes.push(JobOutcome {
            file_name: job.file_name(),
            success: job.status == JobStatus::Succeeded,
            status: job.status,
            message: job.message.clone().unwrap_or_default(),
            output: if job.status == JobStatus::Succeeded {
                job.output.clone()
            } else {
                None
            },
        });
    }

    /// Number of jobs that actually ran to a terminal state.
    pub fn completed(&self) -> usize {
        self.success + self.failed + self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_moves_forward_only() {
        let mut job = ConversionJob::new(0, "a.docx");
        job.advance(JobStatus::Validating).unwrap();
        job.advance(JobStatus::Converting).unwrap();
        assert!(job.advance(JobStatus::Validating).is_err());
        job.finish(JobStatus::Succeeded, "done").unwrap();
        assert!(job.advance(JobStatus::Failed).is_err());
        assert_eq!(job.status, JobStatus::Succeeded);
    }

    #[test]
    fn pending_can_jump_to_terminal() {
        let mut job = ConversionJob::new(3, "b.doc");
        job.finish(JobStatus::Skipped, "exists").unwrap();
        assert_eq!(job.status, JobStatus::Skipped);
    }

    #[test]
    fn retry_restarts_from_pending() {
        let mut job = ConversionJob::new(0, "c.docx");
        job.output = Some("c.pdf".into());
        job.finish(JobStatus::Failed, "boom").unwrap();
        job.retry();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.output.is_none());
        assert!(job.message.is_none());
    }

    #[test]
    fn compression_level_rejects_out_of_range() {
        assert!(CompressionLevel::new(0).is_err());
        assert!(CompressionLevel::new(10).is_err());
        assert_eq!(CompressionLevel::new(9).unwrap().get(), 9);
    }

    #[test]
    fn compression_level_clamps_config_values() {
        assert_eq!(CompressionLevel::clamped(-4).get(), 1);
        assert_eq!(CompressionLevel::clamped(42).get(), 9);
        assert_eq!(CompressionLevel::clamped(5).get(), 5);
    }

    #[test]
    fn compression_level_deserialization_rejects_invalid() {
        let bad: std::result::Result<CompressionSettings, _> =
            serde_json::from_str(r#"{"enabled":true,"level":12}"#);
        assert!(bad.is_err());
        let good: CompressionSettings =
            serde_json::from_str(r#"{"enabled":true,"level":3}"#).unwrap();
        assert_eq!(good.level.get(), 3);
    }

    #[test]
    fn document_kind_is_case_insensitive() {
        assert_eq!(
            DocumentKind::from_path(Path::new("Report.DOCX")),
            Some(DocumentKind::XmlPackage)
        );
        assert_eq!(
            DocumentKind::from_path(Path::new("old.Doc")),
            Some(DocumentKind::LegacyBinary)
        );
        assert_eq!(DocumentKind::from_path(Path::new("notes.pdf")), None);
        assert_eq!(DocumentKind::from_path(Path::new("README")), None);
    }

    #[test]
    fn collision_policy_from_flags() {
        assert_eq!(CollisionPolicy::from_flags(true, true), CollisionPolicy::AutoNumber);
        assert_eq!(CollisionPolicy::from_flags(true, false), CollisionPolicy::Confirm);
        assert_eq!(CollisionPolicy::from_flags(false, false), CollisionPolicy::Overwrite);
    }

    #[test]
    fn batch_result_counts_by_status() {
        let mut result = BatchResult::new(3);
        let mut ok = ConversionJob::new(0, "a.docx");
        ok.output = Some("a.pdf".into());
        ok.finish(JobStatus::Succeeded, "converted").unwrap();
        let mut bad = ConversionJob::new(1, "b.docx");
        bad.finish(JobStatus::Failed, "corrupt").unwrap();
        let mut skip = ConversionJob::new(2, "c.docx");
        skip.finish(JobStatus::Skipped, "exists").unwrap();

        result.record(&ok);
        result.record(&bad);
        result.record(&skip);

        assert_eq!((result.success, result.failed, result.skipped), (1, 1, 1));
        assert_eq!(result.completed(), 3);
        assert_eq!(result.outcomes[0].output.as_deref(), Some(Path::new("a.pdf")));
        assert!(result.outcomes[1].output.is_none());
    }
}
