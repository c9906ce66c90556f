// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Whole-batch runs with a fake `.docx` converter.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use docwerk_batch::{
    BatchObserver, BatchOrchestrator, CancellationFlag, ChannelDecider, RecoveryCheckpoint,
    RecoveryStore, SilentObserver, SpaceProbe,
};
use docwerk_core::error::Result;
use docwerk_core::{CollisionPolicy, CompressionSettings, ConversionJob, JobStatus};
use docwerk_document::FileValidator;
use docwerk_engine::{ConversionDispatcher, PackageConverter};

const FAKE_PDF: &[u8] = b"%PDF-1.4\n% fake\n%%EOF\n";

// -- Fixtures -----------------------------------------------------------------

struct FakeConverter {
    calls: AtomicUsize,
}

impl PackageConverter for FakeConverter {
    fn convert(&self, _input: &Path, output: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::fs::write(output, FAKE_PDF)?;
        Ok(())
    }
}

struct NoSpace;

impl SpaceProbe for NoSpace {
    fn available_bytes(&self, _path: &Path) -> Result<u64> {
        Ok(0)
    }
}

fn write_docx(path: &Path) {
    let file = std::fs::File::create(path).expect("create");
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    zip.start_file("[Content_Types].xml", options).expect("entry");
    zip.write_all(b"<Types/>").expect("write");
    zip.start_file("word/document.xml", options).expect("entry");
    zip.write_all(b"<w:document/>").expect("write");
    zip.finish().expect("finish");
}

fn inputs(dir: &Path, count: usize, broken: &[usize]) -> Vec<PathBuf> {
    (0..count)
        .map(|i| {
            let path = dir.join(format!("doc{i:02}.docx"));
            if broken.contains(&i) {
                std::fs::write(&path, b"not a zip").expect("write");
            } else {
                write_docx(&path);
            }
            path
        })
        .collect()
}

fn orchestrator(converter: Arc<FakeConverter>) -> BatchOrchestrator {
    let dispatcher = ConversionDispatcher::new(None, converter);
    BatchOrchestrator::new(FileValidator::new(100), dispatcher)
}

fn converter() -> Arc<FakeConverter> {
    Arc::new(FakeConverter {
        calls: AtomicUsize::new(0),
    })
}

// -- Tests --------------------------------------------------------------------

/// Captures the on-disk checkpoint when job 7 finishes, then stops the batch.
struct CrashAfterSeventh {
    store: RecoveryStore,
    cancel: CancellationFlag,
    seen: Mutex<Option<RecoveryCheckpoint>>,
}

impl BatchObserver for CrashAfterSeventh {
    fn job_updated(&self, job: &ConversionJob) {
        if job.index == 6 && job.status.is_terminal() {
            let checkpoint = self.store.load().expect("load checkpoint");
            *self.seen.lock().expect("lock") = checkpoint;
            self.cancel.cancel();
        }
    }
}

#[test]
fn checkpoint_after_seven_jobs_reflects_first_five() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input_dir = dir.path().join("in");
    let output_dir = dir.path().join("out");
    std::fs::create_dir(&input_dir).expect("mkdir");
    let files = inputs(&input_dir, 10, &[5, 6]);

    let store = RecoveryStore::new(dir.path().join("recovery"));
    let cancel = CancellationFlag::new();
    let observer = CrashAfterSeventh {
        store: store.clone(),
        cancel: cancel.clone(),
        seen: Mutex::new(None),
    };

    let result = orchestrator(converter())
        .with_recovery(store.clone())
        .run(&files, Some(&output_dir), &cancel, &observer);

    assert!(result.cancelled);
    assert_eq!(result.success, 5);
    assert_eq!(result.failed, 2);
    assert_eq!(result.completed(), 7);

    let checkpoint = observer
        .seen
        .lock()
        .expect("lock")
        .clone()
        .expect("checkpoint written after job 5");
    assert_eq!(checkpoint.processed, (0..5).collect::<BTreeSet<usize>>());
    assert!(checkpoint.failed.is_empty());
    assert_eq!(checkpoint.remaining, 5);
    assert_eq!(checkpoint.remaining_files(), files[5..].to_vec());
    assert_eq!(checkpoint.output_folder.as_deref(), Some(output_dir.as_path()));

    // Finishing, even by cancellation, clears the checkpoint.
    assert!(!store.exists());
}

#[test]
fn successful_batch_writes_every_pdf() {
    let dir = tempfile::tempdir().expect("tempdir");
    let files = inputs(dir.path(), 3, &[]);
    let out = dir.path().join("pdf");
    let fake = converter();

    let result = orchestrator(Arc::clone(&fake)).run(
        &files,
        Some(&out),
        &CancellationFlag::new(),
        &SilentObserver,
    );

    assert_eq!(result.success, 3);
    assert_eq!(fake.calls.load(Ordering::SeqCst), 3);
    for outcome in &result.outcomes {
        let path = outcome.output.as_ref().expect("output path");
        assert_eq!(std::fs::read(path).expect("read"), FAKE_PDF);
    }
}

#[test]
fn existing_output_is_skipped_or_numbered() {
    let dir = tempfile::tempdir().expect("tempdir");
    let files = inputs(dir.path(), 1, &[]);
    std::fs::write(dir.path().join("doc00.pdf"), b"old").expect("write");

    let skipped = orchestrator(converter())
        .with_collision_policy(CollisionPolicy::SkipIfExists)
        .run(&files, None, &CancellationFlag::new(), &SilentObserver);
    assert_eq!(skipped.skipped, 1);
    assert_eq!(skipped.outcomes[0].status, JobStatus::Skipped);
    assert_eq!(std::fs::read(dir.path().join("doc00.pdf")).expect("read"), b"old");

    let numbered = orchestrator(converter())
        .with_collision_policy(CollisionPolicy::AutoNumber)
        .run(&files, None, &CancellationFlag::new(), &SilentObserver);
    assert_eq!(numbered.success, 1);
    assert_eq!(
        numbered.outcomes[0].output.as_deref(),
        Some(dir.path().join("doc00 (1).pdf").as_path())
    );
}

#[test]
fn confirmation_goes_through_the_channel() {
    let dir = tempfile::tempdir().expect("tempdir");
    let files = inputs(dir.path(), 2, &[]);
    std::fs::write(dir.path().join("doc00.pdf"), b"old").expect("write");
    std::fs::write(dir.path().join("doc01.pdf"), b"old").expect("write");

    let (decider, requests) = ChannelDecider::new();
    let responder = std::thread::spawn(move || {
        let mut asked = Vec::new();
        for request in requests {
            let yes = request.path.ends_with("doc00.pdf");
            asked.push(request.path.clone());
            request.respond(yes);
        }
        asked
    });

    let result = orchestrator(converter())
        .with_collision_policy(CollisionPolicy::Confirm)
        .with_decider(Arc::new(decider))
        .run(&files, None, &CancellationFlag::new(), &SilentObserver);

    assert_eq!(result.success, 1);
    assert_eq!(result.skipped, 1);
    assert_eq!(std::fs::read(dir.path().join("doc00.pdf")).expect("read"), FAKE_PDF);
    assert_eq!(std::fs::read(dir.path().join("doc01.pdf")).expect("read"), b"old");

    // The orchestrator and its decider are gone, so the responder finishes.
    let asked = responder.join().expect("responder");
    assert_eq!(asked.len(), 2);
}

#[test]
fn low_disk_space_fails_the_job() {
    let dir = tempfile::tempdir().expect("tempdir");
    let files = inputs(dir.path(), 1, &[]);
    let fake = converter();

    let result = orchestrator(Arc::clone(&fake))
        .with_space_probe(Box::new(NoSpace))
        .run(&files, None, &CancellationFlag::new(), &SilentObserver);

    assert_eq!(result.failed, 1);
    assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
    assert!(!result.outcomes[0].message.is_empty());
}

#[test]
fn failed_compression_keeps_success() {
    let dir = tempfile::tempdir().expect("tempdir");
    let files = inputs(dir.path(), 1, &[]);
    let settings = CompressionSettings::new(true, 9).expect("settings");

    let result = orchestrator(converter())
        .with_compression(settings)
        .run(&files, None, &CancellationFlag::new(), &SilentObserver);

    assert_eq!(result.success, 1);
    assert_eq!(std::fs::read(dir.path().join("doc00.pdf")).expect("read"), FAKE_PDF);
}

#[test]
fn cancelled_before_start_does_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let files = inputs(dir.path(), 3, &[]);
    let cancel = CancellationFlag::new();
    cancel.cancel();

    let result = orchestrator(converter()).run(&files, None, &cancel, &SilentObserver);
    assert!(result.cancelled);
    assert_eq!(result.completed(), 0);
    assert_eq!(result.total, 3);
}
