// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Headless LibreOffice engine.
//
// Each session owns a private `-env:UserInstallation` profile directory that
// lives as long as the session, so repeated conversions through one pooled
// session skip profile initialization. Profiles are never shared: two
// concurrent `soffice` processes on one profile block each other.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use docwerk_core::config::ConfigReader;
use docwerk_core::error::{DocwerkError, Result};
use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};

use crate::engine::{DocumentEngine, DocumentToken, EngineFactory, PackageConverter};

/// Upper bound for a single `soffice` run before the session is declared
/// unresponsive.
pub const CONVERSION_TIMEOUT: Duration = Duration::from_secs(600);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

const BINARY_NAMES: [&str; 2] = ["soffice", "libreoffice"];

#[cfg(target_os = "macos")]
const WELL_KNOWN: &[&str] = &["/Applications/LibreOffice.app/Contents/MacOS/soffice"];
#[cfg(target_os = "windows")]
const WELL_KNOWN: &[&str] = &[
    r"C:\Program Files\LibreOffice\program\soffice.exe",
    r"C:\Program Files (x86)\LibreOffice\program\soffice.exe",
];
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const WELL_KNOWN: &[&str] = &["/usr/lib/libreoffice/program/soffice", "/opt/libreoffice/program/soffice"];

// -- Discovery ----------------------------------------------------------------

/// Locate the `soffice` binary: the explicit path if it exists, otherwise the
/// first match on `PATH`, otherwise a well-known install location.
pub fn resolve_soffice(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.is_file().then(|| path.to_path_buf());
    }

    if let Some(paths) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&paths) {
            for name in BINARY_NAMES {
                let candidate = dir.join(format!("{name}{}", std::env::consts::EXE_SUFFIX));
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
    }

    WELL_KNOWN
        .iter()
        .map(PathBuf::from)
        .find(|p| p.is_file())
}

fn configured_binary(config: &dyn ConfigReader) -> Option<PathBuf> {
    resolve_soffice(config.get_string("engine.soffice_path").map(PathBuf::from).as_deref())
}

/// `file://` URL for a local directory, as `-env:UserInstallation` expects.
pub fn file_url(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/");
    if text.starts_with('/') {
        format!("file://{text}")
    } else {
        format!("file:///{text}")
    }
}

fn export_filter(embed_fonts: bool) -> String {
    format!(
        r#"pdf:writer_pdf_Export:{{"EmbedStandardFonts":{{"type":"boolean","value":"{embed_fonts}"}}}}"#
    )
}

// -- Process control ----------------------------------------------------------

struct RunOutput {
    status: ExitStatus,
    stderr: String,
}

/// Run one headless conversion of `input` into `out_dir`.
fn run_conversion(
    binary: &Path,
    profile: &Path,
    input: &Path,
    out_dir: &Path,
    embed_fonts: bool,
    timeout: Duration,
) -> Result<RunOutput> {
    let mut cmd = Command::new(binary);
    cmd.arg(format!("-env:UserInstallation={}", file_url(profile)))
        .args(["--headless", "--norestore", "--nologo", "--nodefault", "--nolockcheck"])
        .arg("--convert-to")
        .arg(export_filter(embed_fonts))
        .arg("--outdir")
        .arg(out_dir)
        .arg(input)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(binary = %binary.display(), input = %input.display(), "Spawning soffice");
    let mut child = cmd.spawn().map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => {
            DocwerkError::EngineUnavailable(format!("{} not found", binary.display()))
        }
        _ => DocwerkError::Io(err),
    })?;

    wait_with_timeout(&mut child, timeout)
}

/// Wait for `child`, draining its pipes so a chatty engine cannot stall on a
/// full buffer. Kills the process on timeout.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<RunOutput> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let drain = |pipe: Option<Box<dyn Read + Send>>| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(mut pipe) = pipe {
                let _ = pipe.read_to_end(&mut buf);
            }
            buf
        })
    };
    let stdout_thread = drain(stdout.map(|p| Box::new(p) as Box<dyn Read + Send>));
    let stderr_thread = drain(stderr.map(|p| Box::new(p) as Box<dyn Read + Send>));

    let start = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if start.elapsed() > timeout {
            warn!(?timeout, "soffice timed out, killing it");
            let _ = child.kill();
            let _ = child.wait();
            let _ = stdout_thread.join();
            let _ = stderr_thread.join();
            return Err(DocwerkError::EngineUnresponsive);
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    let _ = stdout_thread.join();
    let stderr = stderr_thread.join().unwrap_or_default();
    Ok(RunOutput {
        status,
        stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
    })
}

/// Map a failed run to the error family the user sees.
fn classify_failure(input: &Path, output: &RunOutput) -> DocwerkError {
    let lower = output.stderr.to_ascii_lowercase();
    let file = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if lower.contains("bad_alloc") || lower.contains("out of memory") {
        DocwerkError::OutOfMemory(file)
    } else if lower.contains("could not be loaded") || lower.contains("general input/output error") {
        DocwerkError::DocumentOpenFailed(file)
    } else if output.stderr.is_empty() {
        DocwerkError::SaveFailed(format!("soffice exited with {}", output.status))
    } else {
        DocwerkError::SaveFailed(output.stderr.clone())
    }
}

/// Convert `input` and move the produced PDF to `output`.
fn convert_into(
    binary: &Path,
    profile: &Path,
    input: &Path,
    output: &Path,
    embed_fonts: bool,
    timeout: Duration,
) -> Result<()> {
    let target_dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(target_dir).map_err(|err| DocwerkError::on_write(err, target_dir))?;
    let staging = tempfile::Builder::new()
        .prefix(".docwerk-out-")
        .tempdir_in(target_dir)
        .map_err(|err| DocwerkError::on_write(err, target_dir))?;

    let run = run_conversion(binary, profile, input, staging.path(), embed_fonts, timeout)?;

    let stem = input
        .file_stem()
        .ok_or_else(|| DocwerkError::UnsupportedFormat(input.display().to_string()))?;
    let produced = staging.path().join(pdf_name(stem));
    if !produced.is_file() {
        return Err(classify_failure(input, &run));
    }

    if output.exists() {
        std::fs::remove_file(output).map_err(|err| {
            DocwerkError::SaveFailed(format!("cannot replace {}: {err}", output.display()))
        })?;
    }
    std::fs::rename(&produced, output)
        .map_err(|err| DocwerkError::SaveFailed(format!("{}: {err}", output.display())))?;
    Ok(())
}

/// Name soffice gives its output: the input stem plus `.pdf`. Inner dots in
/// the stem are kept.
fn pdf_name(stem: &std::ffi::OsStr) -> std::ffi::OsString {
    let mut name = stem.to_os_string();
    name.push(".pdf");
    name
}

// -- Pooled session -----------------------------------------------------------

/// One `soffice` session with its own profile directory.
pub struct SofficeSession {
    binary: PathBuf,
    profile: Option<TempDir>,
    open: HashMap<DocumentToken, PathBuf>,
    next_token: u64,
    healthy: bool,
    timeout: Duration,
}

impl SofficeSession {
    fn new(binary: PathBuf, timeout: Duration) -> Result<Self> {
        let profile = tempfile::Builder::new()
            .prefix("docwerk-profile-")
            .tempdir()?;
        debug!(profile = %profile.path().display(), "soffice session created");
        Ok(Self {
            binary,
            profile: Some(profile),
            open: HashMap::new(),
            next_token: 0,
            healthy: true,
            timeout,
        })
    }
}

impl DocumentEngine for SofficeSession {
    fn is_responsive(&mut self) -> bool {
        self.healthy
            && self.binary.is_file()
            && self.profile.as_ref().is_some_and(|p| p.path().is_dir())
    }

    fn open_read_only(&mut self, path: &Path) -> Result<DocumentToken> {
        std::fs::File::open(path).map_err(|err| {
            DocwerkError::DocumentOpenFailed(format!("{}: {err}", path.display()))
        })?;
        self.next_token += 1;
        let token = DocumentToken(self.next_token);
        self.open.insert(token, path.to_path_buf());
        Ok(token)
    }

    fn export_pdf(&mut self, doc: DocumentToken, output: &Path, embed_fonts: bool) -> Result<()> {
        let input = self
            .open
            .get(&doc)
            .cloned()
            .ok_or_else(|| DocwerkError::DocumentOpenFailed("document is not open".into()))?;
        let profile = self
            .profile
            .as_ref()
            .map(|p| p.path().to_path_buf())
            .ok_or(DocwerkError::EngineUnresponsive)?;

        let result = convert_into(&self.binary, &profile, &input, output, embed_fonts, self.timeout);
        if matches!(result, Err(DocwerkError::EngineUnresponsive)) {
            self.healthy = false;
        }
        result
    }

    fn open_document_count(&self) -> usize {
        self.open.len()
    }

    fn close_all_documents(&mut self) {
        self.open.clear();
    }

    fn shutdown(&mut self) {
        self.open.clear();
        self.healthy = false;
        if let Some(profile) = self.profile.take()
            && let Err(err) = profile.close()
        {
            warn!(error = %err, "Could not remove soffice profile");
        }
    }
}

impl Drop for SofficeSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Starts [`SofficeSession`]s.
pub struct SofficeFactory {
    binary: Option<PathBuf>,
    timeout: Duration,
}

impl SofficeFactory {
    pub fn new(binary: Option<PathBuf>) -> Self {
        Self {
            binary,
            timeout: CONVERSION_TIMEOUT,
        }
    }

    pub fn from_config(config: &dyn ConfigReader) -> Self {
        let factory = Self::new(configured_binary(config));
        match &factory.binary {
            Some(path) => info!(binary = %path.display(), "LibreOffice found"),
            None => warn!("LibreOffice not found, .doc conversion unavailable"),
        }
        factory
    }

    pub fn binary(&self) -> Option<&Path> {
        self.binary.as_deref()
    }
}

impl EngineFactory for SofficeFactory {
    fn name(&self) -> &str {
        "LibreOffice"
    }

    #[instrument(skip(self))]
    fn create(&self) -> Result<Box<dyn DocumentEngine>> {
        let binary = self.binary.clone().ok_or_else(|| {
            DocwerkError::EngineUnavailable("LibreOffice (soffice) is not installed".into())
        })?;
        Ok(Box::new(SofficeSession::new(binary, self.timeout)?))
    }
}

// -- One-shot package conversion ----------------------------------------------

/// `.docx` conversion through a throwaway `soffice` run with a fresh profile.
pub struct SofficePackageConverter {
    binary: Option<PathBuf>,
    timeout: Duration,
}

impl SofficePackageConverter {
    pub fn new(binary: Option<PathBuf>) -> Self {
        Self {
            binary,
            timeout: CONVERSION_TIMEOUT,
        }
    }

    pub fn from_config(config: &dyn ConfigReader) -> Self {
        Self::new(configured_binary(config))
    }
}

impl PackageConverter for SofficePackageConverter {
    #[instrument(skip(self), fields(input = %input.display()))]
    fn convert(&self, input: &Path, output: &Path) -> Result<()> {
        let binary = self.binary.as_deref().ok_or_else(|| {
            DocwerkError::EngineUnavailable("LibreOffice (soffice) is not installed".into())
        })?;
        let profile = tempfile::Builder::new()
            .prefix("docwerk-oneshot-")
            .tempdir()?;
        convert_into(binary, profile.path(), input, output, true, self.timeout)
    }
}
