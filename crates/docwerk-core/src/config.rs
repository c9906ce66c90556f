// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration and the key-value reader used by components.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::types::{CollisionPolicy, CompressionLevel, CompressionSettings};

/// Smallest and largest accepted input size limit, in megabytes.
pub const MAX_FILE_SIZE_RANGE_MB: (u64, u64) = (1, 500);

/// Persistent application settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub conversion: ConversionConfig,
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
    /// Output folder chosen in the previous session, if any.
    pub last_output_folder: Option<PathBuf>,
}

/// Per-file conversion behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Ask before replacing an existing PDF.
    pub ask_overwrite: bool,
    /// Pick a free `name (n).pdf` instead of replacing.
    pub auto_number_files: bool,
    /// Input size limit in MB; clamped to 1..=500 when read.
    pub max_file_size_mb: i64,
    pub enable_compression: bool,
    /// Raw level as stored; clamped to 1..=9 when read.
    pub compression_level: i64,
}

/// External document-engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Pooled engine sessions (hard cap 4).
    pub pool_size: usize,
    /// Seconds to wait for a pooled session before starting a temporary one.
    pub acquire_timeout_secs: u64,
    /// Explicit `soffice` binary; searched on `PATH` when unset.
    pub soffice_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Fallback filter when `RUST_LOG` is not set.
    pub level: String,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            ask_overwrite: true,
            auto_number_files: false,
            max_file_size_mb: 100,
            enable_compression: false,
            compression_level: 6,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool_size: 2,
            acquire_timeout_secs: 30,
            soffice_path: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// -- Key-value access ----------------------------------------------------------

/// Read-only, dotted-key view over configuration.
///
/// Components receive a `&dyn ConfigReader` instead of a concrete config
/// struct, so tests can hand them a bare JSON value.
pub trait ConfigReader: Send + Sync {
    /// Look up a value by dotted key, e.g. `"conversion.compression_level"`.
    fn get_value(&self, key: &str) -> Option<Value>;

    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get_value(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }

    fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.get_value(key)
            .and_then(|v| v.as_i64())
            .unwrap_or(default)
    }

    fn get_string(&self, key: &str) -> Option<String> {
        self.get_value(key)
            .and_then(|v| v.as_str().map(str::to_owned))
    }
}

impl ConfigReader for Value {
    fn get_value(&self, key: &str) -> Option<Value> {
        let pointer = format!("/{}", key.replace('.', "/"));
        self.pointer(&pointer).filter(|v| !v.is_null()).cloned()
    }
}

impl ConfigReader for AppConfig {
    fn get_value(&self, key: &str) -> Option<Value> {
        serde_json::to_value(self).ok()?.get_value(key)
    }
}

// -- Derived settings ----------------------------------------------------------

/// Compression settings from a reader, clamping an out-of-range level.
pub fn compression_settings(reader: &dyn ConfigReader) -> CompressionSettings {
    let defaults = ConversionConfig::default();
    let raw = reader.get_i64("conversion.compression_level", defaults.compression_level);
    let level = CompressionLevel::clamped(raw);
    if i64::from(level.get()) != raw {
        warn!(raw, clamped = level.get(), "compression level out of range, clamped");
    }
    CompressionSettings {
        enabled: reader.get_bool("conversion.enable_compression", defaults.enable_compression),
        level,
    }
}

/// Input size limit from a reader, clamped to 1..=500 MB.
pub fn max_file_size_mb(reader: &dyn ConfigReader) -> u64 {
    let (lo, hi) = MAX_FILE_SIZE_RANGE_MB;
    let raw = reader.get_i64(
        "conversion.max_file_size_mb",
        ConversionConfig::default().max_file_size_mb,
    );
    let clamped = raw.clamp(lo as i64, hi as i64) as u64;
    if clamped as i64 != raw {
        warn!(raw, clamped, "max file size out of range, clamped");
    }
    clamped
}

/// Collision policy from the two overwrite flags.
pub fn collision_policy(reader: &dyn ConfigReader) -> CollisionPolicy {
    let defaults = ConversionConfig::default();
    CollisionPolicy::from_flags(
        reader.get_bool("conversion.ask_overwrite", defaults.ask_overwrite),
        reader.get_bool("conversion.auto_number_files", defaults.auto_number_files),
    )
}
