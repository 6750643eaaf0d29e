// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::RuntimeConfig;
use crate::errors::RuntimeResult;
use crate::loader::{ModuleBackend, NativeBackend, ScanReport};
use crate::runtime::Runtime;

/// Runtime builder - turns a [`RuntimeConfig`] into a ready [`Runtime`].
///
/// Registers the built-in capabilities and node types when
/// `register_builtins` is set, then autoloads modules when `autoload` is set.
/// Autoload failures do not fail the build; they are returned in the report.
///
/// # Examples
///
/// ```
/// use plugflow::config::{RuntimeBuilder, RuntimeConfig};
///
/// let config = RuntimeConfig {
///     autoload: false,
///     ..RuntimeConfig::default()
/// };
/// let (runtime, report) = RuntimeBuilder::from_config(&config).unwrap();
///
/// assert!(report.loaded.is_empty());
/// assert_eq!(runtime.node_factories().unwrap().len(), 4);
/// ```
pub struct RuntimeBuilder;

impl RuntimeBuilder {
    /// Build a runtime that loads modules as native shared libraries.
    pub fn from_config(cfg: &RuntimeConfig) -> RuntimeResult<(Runtime, ScanReport)> {
        Self::with_backend(cfg, NativeBackend::new())
    }

    pub fn with_backend<B: ModuleBackend>(
        cfg: &RuntimeConfig,
        backend: B,
    ) -> RuntimeResult<(Runtime<B>, ScanReport)> {
        let runtime = Runtime::with_backend(cfg.clone(), backend);
        if cfg.register_builtins {
            runtime.register_builtins()?;
        }
        let report = if cfg.autoload {
            runtime.autoload()?
        } else {
            ScanReport::default()
        };
        Ok((runtime, report))
    }
}
