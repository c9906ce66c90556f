// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer — built once at startup and passed by reference.
//
// Owns the loaded configuration, the engine pool for `.doc` conversion, the
// `.docx` converter, and the recovery store. Batch runs get a freshly built
// `BatchOrchestrator` that borrows these through `Arc`s.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use docwerk_batch::{BatchOrchestrator, OverwriteDecider, RecoveryStore};
use docwerk_core::config::{self, AppConfig};
use docwerk_core::error::Result;
use docwerk_core::{CollisionPolicy, CompressionSettings};
use docwerk_document::FileValidator;
use docwerk_engine::{
    ConversionDispatcher, EnginePool, PackageConverter, platform_engine_pool,
    platform_package_converter,
};
use tracing::{debug, info, warn};

use super::data_dir;

/// Per-run overrides from the command line. `None` keeps the configured value.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub compression: Option<CompressionSettings>,
    pub policy: Option<CollisionPolicy>,
    pub max_size_mb: Option<u64>,
}

#[derive(Clone)]
pub struct AppServices {
    data_dir: PathBuf,
    config: Arc<Mutex<AppConfig>>,
    /// `None` where `.doc` conversion is not supported.
    pool: Option<Arc<EnginePool>>,
    package: Arc<dyn PackageConverter>,
    recovery: RecoveryStore,
}

impl AppServices {
    /// Initialise all services from an already loaded config.
    pub fn init(data_dir: PathBuf, config: AppConfig) -> Self {
        info!(path = %data_dir.display(), "initialising app services");

        let pool = platform_engine_pool(&config);
        if pool.is_none() {
            warn!("No document engine on this platform, .doc files cannot be converted");
        }
        let package = platform_package_converter(&config);
        let recovery = RecoveryStore::new(data_dir::data_subdir(&data_dir, "recovery"));
        debug!(recovery = %recovery.path().display(), "recovery store ready");

        Self {
            data_dir,
            config: Arc::new(Mutex::new(config)),
            pool,
            package,
            recovery,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE)
    }

    pub fn recovery(&self) -> &RecoveryStore {
        &self.recovery
    }

    pub fn pool(&self) -> Option<&Arc<EnginePool>> {
        self.pool.as_ref()
    }

    // -- Config ----------------------------------------------------------------

    pub fn config(&self) -> AppConfig {
        self.config
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Update and persist the config.
    pub fn save_config(&self, config: &AppConfig) -> Result<()> {
        *self.config.lock().unwrap_or_else(PoisonError::into_inner) = config.clone();
        persist_config(&self.data_dir, config)
    }

    /// Remember the output folder for the next session.
    pub fn remember_output_folder(&self, folder: Option<&Path>) {
        let mut config = self.config();
        let folder = folder.map(Path::to_path_buf);
        if config.last_output_folder == folder {
            return;
        }
        config.last_output_folder = folder;
        if let Err(err) = self.save_config(&config) {
            warn!(error = %err, "Could not save last output folder");
        }
    }

    // -- Batches ---------------------------------------------------------------

    /// Build an orchestrator for one run from the config plus `overrides`.
    pub fn orchestrator(
        &self,
        overrides: &RunOverrides,
        decider: Option<Arc<dyn OverwriteDecider>>,
    ) -> BatchOrchestrator {
        let config = self.config();

        let validator = match overrides.max_size_mb {
            Some(mb) => FileValidator::new(mb),
            None => FileValidator::from_config(&config),
        };
        let dispatcher =
            ConversionDispatcher::from_config(self.pool.clone(), Arc::clone(&self.package), &config);
        let compression = overrides
            .compression
            .unwrap_or_else(|| config::compression_settings(&config));
        let policy = overrides
            .policy
            .unwrap_or_else(|| config::collision_policy(&config));

        info!(
            compression = compression.enabled,
            level = %compression.level,
            ?policy,
            max_size_mb = validator.max_size_mb(),
            "Batch settings"
        );

        let orchestrator = BatchOrchestrator::new(validator, dispatcher)
            .with_compression(compression)
            .with_collision_policy(policy)
            .with_recovery(self.recovery.clone());
        match decider {
            Some(decider) => orchestrator.with_decider(decider),
            None => orchestrator,
        }
    }

    /// Close every engine session.
    pub fn shutdown(&self) {
        if let Some(pool) = &self.pool {
            pool.close();
        }
    }
}

// -- Persistence ---------------------------------------------------------------

const CONFIG_FILE: &str = "config.json";

/// Load `config.json`, or `None` when it is missing or unreadable.
pub fn load_config(data_dir: &Path) -> Option<AppConfig> {
    let path = data_dir.join(CONFIG_FILE);
    let data = std::fs::read_to_string(&path).ok()?;
    serde_json::from_str(&data).ok()
}

pub fn persist_config(data_dir: &Path, config: &AppConfig) -> Result<()> {
    let path = data_dir.join(CONFIG_FILE);
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trips_through_data_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(load_config(dir.path()).is_none());

        let mut config = AppConfig::default();
        config.conversion.compression_level = 8;
        config.engine.pool_size = 3;
        persist_config(dir.path(), &config).expect("persist");

        assert_eq!(load_config(dir.path()), Some(config));
    }

    #[test]
    fn output_folder_is_remembered() {
        let dir = tempfile::tempdir().expect("tempdir");
        let services = AppServices::init(dir.path().to_path_buf(), AppConfig::default());

        assert_eq!(services.pool().is_some(), docwerk_engine::legacy_conversion_supported());
        let orchestrator = services.orchestrator(&RunOverrides::default(), None);
        assert_eq!(
            orchestrator.dispatcher().pool().is_some(),
            services.pool().is_some()
        );

        services.remember_output_folder(Some(Path::new("/out/pdf")));
        let saved = load_config(dir.path()).expect("saved config");
        assert_eq!(saved.last_output_folder, Some(PathBuf::from("/out/pdf")));
        services.shutdown();
    }
}
