// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Output path resolution and collision handling.

use std::path::{Path, PathBuf};

use docwerk_core::CollisionPolicy;
use tracing::debug;

use crate::confirm::OverwriteDecider;

/// What to do with a job's output path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputDecision {
    /// Write (or overwrite) this path.
    Write(PathBuf),
    /// Leave the existing file alone and skip the job.
    Skip(PathBuf),
}

/// `<stem>.pdf` inside `output_dir`, or next to the input when no directory
/// is given.
pub fn default_output_path(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    let pdf = input.with_extension("pdf");
    match (output_dir, pdf.file_name()) {
        (Some(dir), Some(name)) => dir.join(name),
        _ => pdf,
    }
}

/// First free path among `name.pdf`, `name (1).pdf`, `name (2).pdf`, ...
pub fn auto_numbered(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let parent = path.parent().unwrap_or_else(|| Path::new(""));

    let mut counter = 1u32;
    loop {
        let candidate = parent.join(format!("{stem} ({counter}){ext}"));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// Apply the collision policy to the default output path of `input`.
///
/// `Confirm` without a decider skips, so nothing is replaced silently.
pub fn resolve_output(
    input: &Path,
    output_dir: Option<&Path>,
    policy: CollisionPolicy,
    decider: Option<&dyn OverwriteDecider>,
) -> OutputDecision {
    let path = default_output_path(input, output_dir);
    if !path.exists() {
        return OutputDecision::Write(path);
    }

    let decision = match policy {
        CollisionPolicy::Overwrite => OutputDecision::Write(path),
        CollisionPolicy::SkipIfExists => OutputDecision::Skip(path),
        CollisionPolicy::AutoNumber => OutputDecision::Write(auto_numbered(&path)),
        CollisionPolicy::Confirm => match decider {
            Some(decider) if decider.confirm_overwrite(&path) => OutputDecision::Write(path),
            _ => OutputDecision::Skip(path),
        },
    };
    debug!(?policy, ?decision, "Resolved output collision");
    decision
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_path_uses_output_dir() {
        assert_eq!(
            default_output_path(Path::new("/in/Report.DOCX"), Some(Path::new("/out"))),
            PathBuf::from("/out/Report.pdf")
        );
        assert_eq!(
            default_output_path(Path::new("/in/memo.doc"), None),
            PathBuf::from("/in/memo.pdf")
        );
    }

    #[test]
    fn auto_number_finds_first_free_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = dir.path().join("a.pdf");
        assert_eq!(auto_numbered(&base), base);

        std::fs::write(&base, b"x").expect("write");
        std::fs::write(dir.path().join("a (1).pdf"), b"x").expect("write");
        assert_eq!(auto_numbered(&base), dir.path().join("a (2).pdf"));
    }

    #[test]
    fn policies_resolve_existing_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("a.docx");
        let existing = dir.path().join("a.pdf");
        std::fs::write(&existing, b"x").expect("write");

        assert_eq!(
            resolve_output(&input, None, CollisionPolicy::Overwrite, None),
            OutputDecision::Write(existing.clone())
        );
        assert_eq!(
            resolve_output(&input, None, CollisionPolicy::SkipIfExists, None),
            OutputDecision::Skip(existing.clone())
        );
        assert_eq!(
            resolve_output(&input, None, CollisionPolicy::AutoNumber, None),
            OutputDecision::Write(dir.path().join("a (1).pdf"))
        );
        assert_eq!(
            resolve_output(&input, None, CollisionPolicy::Confirm, None),
            OutputDecision::Skip(existing.clone())
        );

        let yes = |_: &Path| true;
        assert_eq!(
            resolve_output(&input, None, CollisionPolicy::Confirm, Some(&yes)),
            OutputDecision::Write(existing)
        );
    }

    #[test]
    fn free_path_is_written_under_any_policy() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("b.doc");
        assert_eq!(
            resolve_output(&input, None, CollisionPolicy::SkipIfExists, None),
            OutputDecision::Write(dir.path().join("b.pdf"))
        );
    }
}
