// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Input validation — extension, size, readability, and container integrity
// checks for `.doc` / `.docx` files, memoized per (path, mtime).

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime};

use docwerk_core::config::{self, ConfigReader};
use docwerk_core::error::{DocwerkError, Result};
use docwerk_core::{DocumentKind, ValidationResult};
use tracing::{debug, instrument};

/// Compound-file (OLE2) signature every legacy `.doc` starts with.
pub const OLE2_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Entries an XML-package document must contain.
pub const REQUIRED_PACKAGE_ENTRIES: [&str; 2] = ["[Content_Types].xml", "word/document.xml"];

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_CACHE_ENTRIES: usize = 1000;

const BYTES_PER_MB: u64 = 1024 * 1024;

struct CacheEntry {
    result: ValidationResult,
    inserted: Instant,
}

/// Validates conversion inputs. Shared across threads; the cache is behind a
/// mutex.
pub struct FileValidator {
    max_size_mb: u64,
    ttl: Duration,
    max_entries: usize,
    cache: Mutex<HashMap<(PathBuf, SystemTime), CacheEntry>>,
}

impl FileValidator {
    /// Validator with a size limit in MB (clamped to 1..=500) and the default
    /// cache limits.
    pub fn new(max_size_mb: u64) -> Self {
        let (lo, hi) = config::MAX_FILE_SIZE_RANGE_MB;
        Self {
            max_size_mb: max_size_mb.clamp(lo, hi),
            ttl: DEFAULT_CACHE_TTL,
            max_entries: DEFAULT_CACHE_ENTRIES,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(reader: &dyn ConfigReader) -> Self {
        Self::new(config::max_file_size_mb(reader))
    }

    /// Override cache TTL and capacity.
    pub fn with_cache_limits(mut self, ttl: Duration, max_entries: usize) -> Self {
        self.ttl = ttl;
        self.max_entries = max_entries.max(1);
        self
    }

    pub fn max_size_mb(&self) -> u64 {
        self.max_size_mb
    }

    /// Validate `path`, consulting the cache when `use_cache` is set.
    ///
    /// Never fails: every problem becomes `valid == false` with a reason.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn validate(&self, path: &Path, use_cache: bool) -> ValidationResult {
        let mtime = match std::fs::metadata(path).and_then(|m| m.modified()) {
            Ok(mtime) => mtime,
            Err(_) => return ValidationResult::from(self.check(path)),
        };
        let key = (path.to_path_buf(), mtime);

        if use_cache && let Some(hit) = self.cached(&key) {
            debug!("Validation cache hit");
            return hit;
        }

        let result = ValidationResult::from(self.check(path));
        if use_cache {
            self.store(key, result.clone());
        }
        debug!(valid = result.valid, reason = %result.reason, "Validated");
        result
    }

    /// Run every check, returning the first failure as a typed error.
    pub fn check(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(DocwerkError::NotFound(path.to_path_buf()));
        }
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(DocwerkError::NotAFile(path.to_path_buf()));
        }

        let kind = DocumentKind::from_path(path).ok_or_else(|| {
            DocwerkError::UnsupportedExtension(
                path.extension()
                    .map(|e| format!(".{}", e.to_string_lossy()))
                    .unwrap_or_else(|| "(none)".into()),
            )
        })?;

        let size = metadata.len();
        if size > self.max_size_mb * BYTES_PER_MB {
            return Err(DocwerkError::TooLarge {
                size_mb: size as f64 / BYTES_PER_MB as f64,
                max_mb: self.max_size_mb,
            });
        }

        let file = File::open(path).map_err(|err| match err.kind() {
            io::ErrorKind::PermissionDenied => DocwerkError::Unreadable(path.to_path_buf()),
            _ => DocwerkError::Io(err),
        })?;

        match kind {
            DocumentKind::XmlPackage => check_package(file),
            DocumentKind::LegacyBinary => check_compound_file(file),
        }
    }

    // -- Cache ----------------------------------------------------------------

    pub fn cache_len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    fn cached(&self, key: &(PathBuf, SystemTime)) -> Option<ValidationResult> {
        let cache = self.cache.lock().ok()?;
        let entry = cache.get(key)?;
        (entry.inserted.elapsed() < self.ttl).then(|| entry.result.clone())
    }

    fn store(&self, key: (PathBuf, SystemTime), result: ValidationResult) {
        let Ok(mut cache) = self.cache.lock() else {
            return;
        };
        cache.remove(&key);

        if cache.len() >= self.max_entries {
            let ttl = self.ttl;
            cache.retain(|_, entry| entry.inserted.elapsed() < ttl);
        }
        while cache.len() >= self.max_entries {
            let oldest = cache
                .iter()
                .min_by_key(|(_, entry)| entry.inserted)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(oldest) => {
                    cache.remove(&oldest);
                }
                None => break,
            }
        }

        cache.insert(
            key,
            CacheEntry {
                result,
                inserted: Instant::now(),
            },
        );
    }
}

impl Default for FileValidator {
    fn default() -> Self {
        Self::new(100)
    }
}

// -- Integrity ----------------------------------------------------------------

fn check_package(file: File) -> Result<()> {
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|err| DocwerkError::CorruptContainer(format!("not a valid zip archive: {err}")))?;

    for name in REQUIRED_PACKAGE_ENTRIES {
        if archive.by_name(name).is_err() {
            return Err(DocwerkError::CorruptContainer(format!(
                "missing {name}, not a Word document"
            )));
        }
    }

    let mut body = archive
        .by_name("word/document.xml")
        .map_err(|err| DocwerkError::CorruptContainer(format!("document body unreadable: {err}")))?;
    io::copy(&mut body, &mut io::sink())
        .map_err(|err| DocwerkError::CorruptContainer(format!("document body damaged: {err}")))?;
    Ok(())
}

fn check_compound_file(mut file: File) -> Result<()> {
    let mut header = [0u8; 8];
    match file.read_exact(&mut header) {
        Ok(()) if header == OLE2_SIGNATURE => Ok(()),
        Ok(()) => Err(DocwerkError::CorruptContainer(
            "invalid .doc signature".into(),
        )),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Err(
            DocwerkError::CorruptContainer("file too short for a .doc header".into()),
        ),
        Err(err) => Err(DocwerkError::Io(err)),
    }
}
