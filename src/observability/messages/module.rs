// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for dynamic module loading and discovery events.
//!
//! This module contains message types for logging events related to:
//! * Module probing, loading, unloading and reloading
//! * Directory scans and the startup autoloader

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Module loaded and its registrations committed.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use plugflow::observability::messages::module::ModuleLoaded;
///
/// let msg = ModuleLoaded {
///     name: "cuda_device",
///     version: "0.3.1",
///     path: "plugins/libcuda_device.so",
///     capability_count: 2,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct ModuleLoaded<'a> {
    pub name: &'a str,
    pub version: &'a str,
    pub path: &'a str,
    pub capability_count: usize,
}

impl Display for ModuleLoaded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Loaded module '{}' v{} from {} ({} registrations)",
            self.name, self.version, self.path, self.capability_count
        )
    }
}

impl StructuredLog for ModuleLoaded<'_> {
    fn log(&self) {
        tracing::info!(
            module = self.name,
            version = self.version,
            path = self.path,
            capability_count = self.capability_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "module_loaded",
            span_name = name,
            module = self.name,
            path = self.path,
        )
    }
}

/// Module loading failed.
///
/// # Log Level
/// `warn!` - Scans continue past individual failures
pub struct ModuleLoadFailed<'a> {
    pub path: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for ModuleLoadFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Failed to load module '{}': {}", self.path, self.error)
    }
}

impl StructuredLog for ModuleLoadFailed<'_> {
    fn log(&self) {
        tracing::warn!(path = self.path, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("module_load_failed", span_name = name, path = self.path)
    }
}

/// Module handle released.
pub struct ModuleUnloaded<'a> {
    pub name: &'a str,
    pub path: &'a str,
}

impl Display for ModuleUnloaded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Unloaded module '{}' ({})", self.name, self.path)
    }
}

impl StructuredLog for ModuleUnloaded<'_> {
    fn log(&self) {
        tracing::info!(module = self.name, path = self.path, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("module_unloaded", span_name = name, module = self.name)
    }
}

/// Reload failed after the old instance was already unloaded.
///
/// # Log Level
/// `error!` - The module is gone until loaded again
pub struct ModuleReloadLost<'a> {
    pub name: &'a str,
    pub path: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for ModuleReloadLost<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Reload of module '{}' from {} failed, module remains unloaded: {}",
            self.name, self.path, self.error
        )
    }
}

impl StructuredLog for ModuleReloadLost<'_> {
    fn log(&self) {
        tracing::error!(module = self.name, path = self.path, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("module_reload_lost", span_name = name, module = self.name)
    }
}

/// Directory scan finished.
pub struct ScanCompleted<'a> {
    pub directory: &'a str,
    pub loaded: usize,
    pub failed: usize,
}

impl Display for ScanCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Scanned {}: {} modules loaded, {} failed",
            self.directory, self.loaded, self.failed
        )
    }
}

impl StructuredLog for ScanCompleted<'_> {
    fn log(&self) {
        tracing::info!(
            directory = self.directory,
            loaded = self.loaded,
            failed = self.failed,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("scan", span_name = name, directory = self.directory)
    }
}

/// Search directory missing or unreadable; skipped.
///
/// # Log Level
/// `debug!` - Expected for default search paths
pub struct SearchPathSkipped<'a> {
    pub directory: &'a str,
    pub reason: &'a str,
}

impl Display for SearchPathSkipped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Skipping module search path {}: {}",
            self.directory, self.reason
        )
    }
}
