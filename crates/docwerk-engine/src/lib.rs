// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docwerk-engine — External document-engine abstractions.
//
// Defines the engine traits, the bounded session pool used for legacy `.doc`
// conversion, and the dispatcher that routes each input to the right
// conversion path. The concrete engine is headless LibreOffice on desktop
// platforms; everywhere else a stub reports the engine as unavailable.

pub mod dispatch;
pub mod engine;
pub mod pool;

#[cfg(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "windows",
    target_os = "freebsd"
))]
pub mod soffice;

#[cfg(not(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "windows",
    target_os = "freebsd"
)))]
pub mod stub;

use std::sync::Arc;

use docwerk_core::config::ConfigReader;

pub use dispatch::{ConversionDispatcher, ConversionOutcome, ConversionRoute};
pub use engine::{DocumentEngine, DocumentToken, EngineFactory, PackageConverter};
pub use pool::{EngineHandle, EngineLease, EnginePool, HandleState, PoolStats};

/// Whether legacy `.doc` conversion through a pooled engine exists on the
/// target operating system.
pub const fn legacy_conversion_supported() -> bool {
    cfg!(any(
        target_os = "linux",
        target_os = "macos",
        target_os = "windows",
        target_os = "freebsd"
    ))
}

/// Engine pool for the target operating system, `None` where no engine is
/// supported so legacy jobs fail without trying to start one.
pub fn platform_engine_pool(config: &dyn ConfigReader) -> Option<Arc<EnginePool>> {
    #[cfg(any(
        target_os = "linux",
        target_os = "macos",
        target_os = "windows",
        target_os = "freebsd"
    ))]
    {
        let factory: Arc<dyn EngineFactory> = Arc::new(soffice::SofficeFactory::from_config(config));
        Some(Arc::new(EnginePool::from_config(factory, config)))
    }
    #[cfg(not(any(
        target_os = "linux",
        target_os = "macos",
        target_os = "windows",
        target_os = "freebsd"
    )))]
    {
        let _ = config;
        None
    }
}

/// Stateless `.docx` converter for the target operating system.
pub fn platform_package_converter(config: &dyn ConfigReader) -> Arc<dyn PackageConverter> {
    #[cfg(any(
        target_os = "linux",
        target_os = "macos",
        target_os = "windows",
        target_os = "freebsd"
    ))]
    {
        Arc::new(soffice::SofficePackageConverter::from_config(config))
    }
    #[cfg(not(any(
        target_os = "linux",
        target_os = "macos",
        target_os = "windows",
        target_os = "freebsd"
    )))]
    {
        let _ = config;
        Arc::new(stub::StubPackageConverter)
    }
}
