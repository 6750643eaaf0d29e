// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Startup discovery of capability modules.
//!
//! The search path comes from `PLUGFLOW_PLUGIN_PATH` (colon separated) or,
//! when that is unset, from `./plugins`, the executable's directory and its
//! `plugins` subdirectory. Each search directory is scanned along with its
//! per-kind subdirectories. Directories that do not exist are skipped.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::loader::backend::ModuleBackend;
use crate::loader::module_loader::{ModuleLoader, Registrar, ScanReport};
use crate::observability::messages::module::SearchPathSkipped;

pub const PLUGIN_PATH_ENV: &str = "PLUGFLOW_PLUGIN_PATH";

pub const KIND_SUBDIRECTORIES: [&str; 3] = ["devices", "model_loaders", "memory_pools"];

/// Split a colon-separated path list, dropping empty segments.
pub fn parse_search_path(value: &str) -> Vec<PathBuf> {
    value
        .split(':')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(PathBuf::from)
        .collect()
}

pub fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("plugins")];
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        paths.push(exe_dir.clone());
        paths.push(exe_dir.join("plugins"));
    }
    paths
}

/// The effective search path: the environment override, else the defaults.
pub fn search_paths() -> Vec<PathBuf> {
    match std::env::var(PLUGIN_PATH_ENV) {
        Ok(value) if !value.trim().is_empty() => parse_search_path(&value),
        _ => default_search_paths(),
    }
}

/// Every directory actually scanned for `roots`, deduplicated, in visit order.
pub fn expand_directories(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut directories = Vec::new();

    for root in roots {
        let candidates = std::iter::once(root.clone())
            .chain(KIND_SUBDIRECTORIES.iter().map(|sub| root.join(sub)));
        for candidate in candidates {
            if !candidate.is_dir() {
                tracing::debug!(
                    "{}",
                    SearchPathSkipped {
                        directory: &candidate.display().to_string(),
                        reason: "not a directory",
                    }
                );
                continue;
            }
            let key = candidate.canonicalize().unwrap_or_else(|_| candidate.clone());
            if seen.insert(key) {
                directories.push(candidate);
            }
        }
    }
    directories
}

/// Scan every directory derived from `roots`, accumulating one report.
///
/// Returns the merged report and the directories that were scanned.
pub fn autoload<B: ModuleBackend>(
    loader: &mut ModuleLoader<B>,
    registrar: &mut Registrar<'_>,
    roots: &[PathBuf],
) -> (ScanReport, Vec<PathBuf>) {
    let directories = expand_directories(roots);
    let mut report = ScanReport::default();

    for directory in &directories {
        match loader.scan_directory(directory, registrar) {
            Ok(scanned) => report.merge(scanned),
            Err(error) => {
                let reason = error.to_string();
                tracing::debug!(
                    "{}",
                    SearchPathSkipped {
                        directory: &directory.display().to_string(),
                        reason: &reason,
                    }
                );
            }
        }
    }

    tracing::info!(
        directories = directories.len(),
        loaded = report.loaded.len(),
        failed = report.failed.len(),
        "Autoload finished"
    );
    (report, directories)
}
