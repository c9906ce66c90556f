// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for conversion results.
//
// Every technical error is mapped to a plain sentence plus a suggestion. The
// batch report shows the message per file; the CLI prints the suggestion when
// a run fails outright.

use crate::error::DocwerkError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Engine hiccup or busy resource. Retrying may help.
    Transient,
    /// The user must do something (free disk space, fix permissions).
    ActionRequired,
    /// Retrying will not help: the file itself is the problem.
    Permanent,
}

/// A human-readable error with a plain message and an actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    pub message: String,
    pub suggestion: String,
    /// Whether re-running the same job could succeed.
    pub retriable: bool,
    pub severity: Severity,
}

impl HumanError {
    fn new(message: impl Into<String>, suggestion: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            suggestion: suggestion.into(),
            retriable: severity == Severity::Transient,
            severity,
        }
    }
}

impl std::fmt::Display for HumanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.message, self.suggestion)
    }
}

/// Convert a `DocwerkError` into a `HumanError`.
pub fn humanize_error(err: &DocwerkError) -> HumanError {
    use Severity::*;

    match err {
        // -- Validation --
        DocwerkError::NotFound(path) => HumanError::new(
            format!("File not found: {}", path.display()),
            "It may have been moved or deleted. Check the path and try again.",
            ActionRequired,
        ),

        DocwerkError::NotAFile(path) => HumanError::new(
            format!("Not a file: {}", path.display()),
            "Pass a .doc or .docx file, or a folder together with --recursive.",
            ActionRequired,
        ),

        DocwerkError::UnsupportedExtension(ext) => HumanError::new(
            format!("Unsupported file type: {ext}"),
            "Only Word documents (.doc and .docx) can be converted.",
            Permanent,
        ),

        DocwerkError::TooLarge { size_mb, max_mb } => HumanError::new(
            format!("File too large ({size_mb:.1} MB, limit {max_mb} MB)"),
            "Raise max_file_size_mb in the settings (up to 500 MB) or split the document.",
            ActionRequired,
        ),

        DocwerkError::Unreadable(path) => HumanError::new(
            format!("Cannot read {}", path.display()),
            "Check the file permissions or copy the file somewhere readable.",
            ActionRequired,
        ),

        DocwerkError::CorruptContainer(detail) => HumanError::new(
            format!("The document is damaged ({detail})"),
            "Open it in a word processor to repair it, then save a fresh copy.",
            Permanent,
        ),

        // -- Engine --
        DocwerkError::UnsupportedFormat(detail) => HumanError::new(
            format!("This document format is not supported ({detail})"),
            "Save the document as .docx and try again.",
            Permanent,
        ),

        DocwerkError::EngineUnavailable(detail) => HumanError::new(
            format!("The document engine is not available ({detail})"),
            "Install LibreOffice or set engine.soffice_path in the settings.",
            ActionRequired,
        ),

        DocwerkError::EngineUnresponsive => HumanError::new(
            "The document engine stopped responding",
            "The engine session was restarted. Run the batch again to retry this file.",
            Transient,
        ),

        DocwerkError::PoolClosed => HumanError::new(
            "The conversion service is shutting down",
            "Start a new run to convert the remaining files.",
            Transient,
        ),

        DocwerkError::DocumentOpenFailed(detail) => HumanError::new(
            format!("The document could not be opened ({detail})"),
            "It may be password-protected or damaged. Open it once in a word processor to check.",
            Permanent,
        ),

        DocwerkError::SaveFailed(detail) => HumanError::new(
            format!("The PDF could not be written ({detail})"),
            "Check that the output folder is writable and has free space.",
            ActionRequired,
        ),

        DocwerkError::OutOfMemory(file) => HumanError::new(
            format!("Ran out of memory while converting {file}"),
            "Close other programs or convert this document on its own.",
            Transient,
        ),

        // -- Compression --
        DocwerkError::PdfError(detail) => HumanError::new(
            format!("The produced PDF has a problem ({detail})"),
            "Open the PDF to check it. Converting again without compression may help.",
            Permanent,
        ),

        DocwerkError::ImageError(detail) => HumanError::new(
            format!("An embedded image could not be processed ({detail})"),
            "The image was left as it was.",
            Permanent,
        ),

        // -- Storage / environment --
        DocwerkError::InsufficientDiskSpace {
            free_mb,
            required_mb,
        } => HumanError::new(
            format!("Not enough disk space ({free_mb:.1} MB free, about {required_mb:.1} MB needed)"),
            "Free some space on the output drive or choose another output folder.",
            ActionRequired,
        ),

        DocwerkError::PermissionDenied(detail) => HumanError::new(
            format!("Permission denied ({detail})"),
            "Choose an output folder you can write to.",
            ActionRequired,
        ),

        DocwerkError::Checkpoint(detail) => HumanError::new(
            format!("The saved progress could not be used ({detail})"),
            "Discard it with `docwerk recovery --discard` and start the batch again.",
            Permanent,
        ),

        DocwerkError::InvalidSetting(detail) => HumanError::new(
            format!("Invalid setting: {detail}"),
            "Check the value and try again.",
            ActionRequired,
        ),

        DocwerkError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound => HumanError::new(
                "A file or folder could not be found",
                "It may have been moved or deleted while the batch was running.",
                ActionRequired,
            ),
            std::io::ErrorKind::PermissionDenied => HumanError::new(
                "Access to a file was denied",
                "Check the permissions of the input and output folders.",
                ActionRequired,
            ),
            _ => HumanError::new(
                format!("A file operation failed ({io_err})"),
                "Try again. If this keeps happening, the disk may be full or failing.",
                Transient,
            ),
        },

        DocwerkError::Serialization(_) => HumanError::new(
            "Saved data could not be read",
            "The settings or progress file may be damaged. Delete it to start fresh.",
            Permanent,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn engine_unresponsive_is_transient() {
        let human = humanize_error(&DocwerkError::EngineUnresponsive);
        assert_eq!(human.severity, Severity::Transient);
        assert!(human.retriable);
    }

    #[test]
    fn corrupt_file_is_permanent() {
        let human = humanize_error(&DocwerkError::CorruptContainer("bad signature".into()));
        assert_eq!(human.severity, Severity::Permanent);
        assert!(!human.retriable);
        assert!(human.message.contains("bad signature"));
    }

    #[test]
    fn disk_space_is_action_required() {
        let human = humanize_error(&DocwerkError::InsufficientDiskSpace {
            free_mb: 1.0,
            required_mb: 13.0,
        });
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(human.message.contains("13.0"));
    }

    #[test]
    fn engine_errors_have_distinct_messages() {
        let errors = [
            DocwerkError::NotFound(PathBuf::from("x.doc")),
            DocwerkError::UnsupportedFormat("rtf".into()),
            DocwerkError::EngineUnavailable("no soffice".into()),
            DocwerkError::DocumentOpenFailed("locked".into()),
            DocwerkError::SaveFailed("read-only".into()),
            DocwerkError::OutOfMemory("big.doc".into()),
            DocwerkError::Io(std::io::Error::other("disk")),
        ];
        let messages: std::collections::HashSet<String> =
            errors.iter().map(|e| humanize_error(e).message).collect();
        assert_eq!(messages.len(), errors.len());
    }

    #[test]
    fn io_not_found_is_action_required() {
        let err = DocwerkError::Io(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(humanize_error(&err).severity, Severity::ActionRequired);
    }
}
