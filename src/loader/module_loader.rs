// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Loads, tracks, unloads and reloads capability modules.
//!
//! Loading a module is a short pipeline of checks, each of which can reject
//! the file without side effects:
//!
//! 1. the path names a readable regular file with the platform's library
//!    extension
//! 2. the loader is below its `max_modules` ceiling
//! 3. the backend probe finds the required entry points
//! 4. the module reports the host's ABI version
//! 5. its initializer (and optional registration hook) return success
//! 6. nothing it wants to register collides with an existing entry
//!
//! Only then are its capabilities and node factories committed to the
//! registries, each one carrying a keep-alive token for the module.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::{RuntimeError, RuntimeResult};
use crate::loader::abi::{ModuleInitContext, ModuleMetadata, ABI_VERSION, MODULE_OK};
use crate::loader::backend::{LoadedModule, ModuleBackend};
use crate::observability::messages::module::{
    ModuleLoadFailed, ModuleLoaded, ModuleReloadLost, ModuleUnloaded, ScanCompleted,
};
use crate::observability::messages::StructuredLog;
use crate::registry::{
    CapabilityDescriptor, CapabilityKind, CapabilityRegistry, KeepAlive, NodeFactory,
    NodeFactoryRegistry, Provenance,
};
use crate::traits::NodeType;

/// The registries a module load writes into.
pub struct Registrar<'a> {
    pub capabilities: &'a mut CapabilityRegistry,
    pub factories: &'a mut NodeFactoryRegistry,
}

/// Bookkeeping for one loaded module.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleRecord {
    #[serde(flatten)]
    pub metadata: ModuleMetadata,
    pub path: PathBuf,
    pub loaded_at: DateTime<Utc>,
    pub capabilities: Vec<(CapabilityKind, String)>,
    pub node_types: Vec<NodeType>,
}

impl ModuleRecord {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

#[derive(Debug)]
pub struct ScanFailure {
    pub path: PathBuf,
    pub error: RuntimeError,
}

/// Outcome of [`ModuleLoader::scan_directory`]. Failures never abort a scan.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub loaded: Vec<ModuleRecord>,
    pub failed: Vec<ScanFailure>,
}

impl ScanReport {
    pub fn merge(&mut self, other: ScanReport) {
        self.loaded.extend(other.loaded);
        self.failed.extend(other.failed);
    }
}

struct LoadedEntry<M> {
    record: ModuleRecord,
    // Registry entries hold clones of this handle; the library stays mapped
    // until the last one is gone.
    handle: Arc<M>,
}

pub struct ModuleLoader<B: ModuleBackend> {
    backend: B,
    max_modules: usize,
    modules: Vec<LoadedEntry<B::Module>>,
}

/// Whether `path` carries the platform's shared-library extension.
pub fn has_library_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == std::env::consts::DLL_EXTENSION)
}

/// `path` with symlinks and `.`/`..` resolved, or as given if it no longer resolves.
fn canonical_or_raw(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn validate_module_path(path: &Path) -> RuntimeResult<()> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        RuntimeError::invalid(format!("cannot access module '{}': {}", path.display(), e))
    })?;
    if !metadata.is_file() {
        return Err(RuntimeError::invalid(format!(
            "module path '{}' is not a regular file",
            path.display()
        )));
    }
    if !has_library_extension(path) {
        return Err(RuntimeError::invalid(format!(
            "module '{}' does not have the .{} extension",
            path.display(),
            std::env::consts::DLL_EXTENSION
        )));
    }
    File::open(path).map_err(|e| {
        RuntimeError::invalid(format!("module '{}' is not readable: {}", path.display(), e))
    })?;
    Ok(())
}

impl<B: ModuleBackend> ModuleLoader<B> {
    pub fn new(backend: B, max_modules: usize) -> Self {
        Self {
            backend,
            max_modules,
            modules: Vec::new(),
        }
    }

    pub fn max_modules(&self) -> usize {
        self.max_modules
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn modules(&self) -> Vec<ModuleRecord> {
        self.modules.iter().map(|entry| entry.record.clone()).collect()
    }

    pub fn find(&self, name: &str) -> Option<&ModuleRecord> {
        self.modules
            .iter()
            .map(|entry| &entry.record)
            .find(|record| record.name() == name)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Load the module at `path` and commit its registrations.
    pub fn load(&mut self, path: &Path, registrar: &mut Registrar<'_>) -> RuntimeResult<ModuleRecord> {
        validate_module_path(path)?;

        if self.modules.len() >= self.max_modules {
            return Err(RuntimeError::CapacityExceeded {
                what: "loaded modules",
                limit: self.max_modules,
            });
        }
        let canonical = canonical_or_raw(path);
        if self
            .modules
            .iter()
            .any(|entry| canonical_or_raw(&entry.record.path) == canonical)
        {
            return Err(RuntimeError::duplicate("Module path", path.display().to_string()));
        }

        self.backend.probe(path)?;
        let handle = Arc::new(self.backend.open(path)?);

        let reported = handle.abi_version();
        if reported != ABI_VERSION {
            return Err(RuntimeError::Incompatible {
                path: path.display().to_string(),
                reason: format!(
                    "module ABI version {} does not match runtime ABI version {}",
                    reported, ABI_VERSION
                ),
            });
        }

        let mut ctx = ModuleInitContext::new();
        let status = handle.init(&mut ctx);
        if status != MODULE_OK {
            return Err(RuntimeError::Incompatible {
                path: path.display().to_string(),
                reason: format!("module initializer returned status {}", status),
            });
        }
        if let Some(status) = handle.register(&mut ctx) {
            if status != MODULE_OK {
                return Err(RuntimeError::Incompatible {
                    path: path.display().to_string(),
                    reason: format!("module registration hook returned status {}", status),
                });
            }
        }

        let (mut metadata, capabilities, factories) = ctx.into_parts();
        if metadata.name.trim().is_empty() {
            metadata.name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        if self.find(&metadata.name).is_some() {
            return Err(RuntimeError::duplicate("Module", metadata.name));
        }

        let token: KeepAlive = handle.clone();
        let (capability_names, node_types) =
            commit_registrations(registrar, capabilities, factories, &token)?;

        let record = ModuleRecord {
            metadata,
            path: path.to_path_buf(),
            loaded_at: Utc::now(),
            capabilities: capability_names,
            node_types,
        };

        ModuleLoaded {
            name: record.name(),
            version: &record.metadata.version,
            path: &record.path.display().to_string(),
            capability_count: record.capabilities.len() + record.node_types.len(),
        }
        .log();

        self.modules.push(LoadedEntry {
            record: record.clone(),
            handle,
        });
        Ok(record)
    }

    /// Withdraw the module's registrations and release the loader's handle.
    ///
    /// Registry entries or nodes obtained before the unload keep the module
    /// mapped until they are dropped.
    pub fn unload(&mut self, name: &str, registrar: &mut Registrar<'_>) -> RuntimeResult<ModuleRecord> {
        let position = self
            .modules
            .iter()
            .position(|entry| entry.record.name() == name)
            .ok_or_else(|| RuntimeError::not_found("Module", name))?;
        let entry = self.modules.remove(position);

        withdraw_registrations(registrar, &entry.record);
        let LoadedEntry { record, handle } = entry;
        drop(handle);

        ModuleUnloaded {
            name: record.name(),
            path: &record.path.display().to_string(),
        }
        .log();
        Ok(record)
    }

    /// Unload and load again from the same path.
    ///
    /// If the fresh load fails the module stays unloaded.
    pub fn reload(&mut self, name: &str, registrar: &mut Registrar<'_>) -> RuntimeResult<ModuleRecord> {
        let previous = self.unload(name, registrar)?;
        self.load(&previous.path, registrar).inspect_err(|error| {
            ModuleReloadLost {
                name,
                path: &previous.path.display().to_string(),
                error,
            }
            .log();
        })
    }

    /// Try to load every library file directly inside `directory`.
    ///
    /// Files are visited in name order. A file that fails is recorded in the
    /// report and the scan moves on.
    pub fn scan_directory(
        &mut self,
        directory: &Path,
        registrar: &mut Registrar<'_>,
    ) -> RuntimeResult<ScanReport> {
        let mut candidates: Vec<PathBuf> = std::fs::read_dir(directory)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && has_library_extension(path))
            .collect();
        candidates.sort();

        let mut report = ScanReport::default();
        for path in candidates {
            match self.load(&path, registrar) {
                Ok(record) => report.loaded.push(record),
                Err(error) => {
                    ModuleLoadFailed {
                        path: &path.display().to_string(),
                        error: &error,
                    }
                    .log();
                    report.failed.push(ScanFailure { path, error });
                }
            }
        }

        ScanCompleted {
            directory: &directory.display().to_string(),
            loaded: report.loaded.len(),
            failed: report.failed.len(),
        }
        .log();
        Ok(report)
    }

    /// Unload every module, most recently loaded first. Returns how many went.
    pub fn unload_all(&mut self, registrar: &mut Registrar<'_>) -> usize {
        let names: Vec<String> = self
            .modules
            .iter()
            .rev()
            .map(|entry| entry.record.name().to_string())
            .collect();
        names
            .iter()
            .filter(|name| self.unload(name, registrar).is_ok())
            .count()
    }
}

type Committed = (Vec<(CapabilityKind, String)>, Vec<NodeType>);

/// Check every pending registration, then commit them all.
fn commit_registrations(
    registrar: &mut Registrar<'_>,
    capabilities: Vec<(CapabilityKind, CapabilityDescriptor)>,
    factories: Vec<NodeFactory>,
    token: &KeepAlive,
) -> RuntimeResult<Committed> {
    let mut seen = HashSet::new();
    for (kind, descriptor) in &capabilities {
        if descriptor.name.trim().is_empty() {
            return Err(RuntimeError::invalid("module registered a capability with an empty name"));
        }
        if descriptor.kind() != *kind {
            return Err(RuntimeError::invalid(format!(
                "module registered {} '{}' as a {}",
                descriptor.kind(),
                descriptor.name,
                kind
            )));
        }
        if !seen.insert((*kind, descriptor.name.as_str()))
            || registrar.capabilities.contains(*kind, &descriptor.name)
        {
            return Err(RuntimeError::duplicate(kind.as_str(), descriptor.name.clone()));
        }
    }
    let mut seen_types = HashSet::new();
    for factory in &factories {
        if !seen_types.insert(&factory.node_type) || registrar.factories.contains(&factory.node_type) {
            return Err(RuntimeError::duplicate(
                "Node factory",
                factory.node_type.as_str(),
            ));
        }
    }

    let mut committed: Committed = (Vec::new(), Vec::new());
    for (kind, descriptor) in capabilities {
        let name = descriptor.name.clone();
        let bound = descriptor.with_keep_alive(token.clone());
        if let Err(error) = registrar.capabilities.register(kind, bound, Provenance::Plugin) {
            rollback(registrar, &committed);
            return Err(error);
        }
        committed.0.push((kind, name));
    }
    for factory in factories {
        let node_type = factory.node_type.clone();
        if let Err(error) = registrar
            .factories
            .register_factory(factory.with_keep_alive(token.clone()))
        {
            rollback(registrar, &committed);
            return Err(error);
        }
        committed.1.push(node_type);
    }
    Ok(committed)
}

fn rollback(registrar: &mut Registrar<'_>, committed: &Committed) {
    for (kind, name) in &committed.0 {
        let _ = registrar.capabilities.unregister(*kind, name);
    }
    for node_type in &committed.1 {
        let _ = registrar.factories.unregister_factory(node_type);
    }
}

// Entries someone already unregistered by hand are skipped.
fn withdraw_registrations(registrar: &mut Registrar<'_>, record: &ModuleRecord) {
    rollback(registrar, &(record.capabilities.clone(), record.node_types.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::builtin::CpuDevice;
    use crate::backends::stub::{FakeBackend, FakeModuleSpec};
    use crate::errors::ErrorKind;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        capabilities: CapabilityRegistry,
        factories: NodeFactoryRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: TempDir::new().unwrap(),
                capabilities: CapabilityRegistry::initialized(),
                factories: NodeFactoryRegistry::new(),
            }
        }

        fn file(&self, stem: &str) -> PathBuf {
            let path = self
                .dir
                .path()
                .join(format!("{}.{}", stem, std::env::consts::DLL_EXTENSION));
            std::fs::write(&path, b"module").unwrap();
            path
        }

        fn registrar(&mut self) -> Registrar<'_> {
            Registrar {
                capabilities: &mut self.capabilities,
                factories: &mut self.factories,
            }
        }
    }

    fn device_module(module: &str, device: &str) -> FakeModuleSpec {
        let device = device.to_string();
        FakeModuleSpec::named(module).with_init(move |ctx| {
            ctx.register_capability(
                CapabilityKind::Device,
                CapabilityDescriptor::device(device.clone(), "1.0.0", Arc::new(CpuDevice::new())),
            );
            0
        })
    }

    #[test]
    fn test_load_commits_registrations_with_plugin_provenance() {
        let mut fixture = Fixture::new();
        let path = fixture.file("accel");
        let backend = FakeBackend::new().with_module("accel", device_module("accel", "npu"));
        let mut loader = ModuleLoader::new(backend, 4);

        let record = loader.load(&path, &mut fixture.registrar()).unwrap();
        assert_eq!(record.name(), "accel");
        assert_eq!(record.capabilities, vec![(CapabilityKind::Device, "npu".to_string())]);

        let found = fixture.capabilities.find(CapabilityKind::Device, "npu").unwrap();
        assert_eq!(found.provenance, Provenance::Plugin);
        assert_eq!(loader.len(), 1);
    }

    #[test]
    fn test_path_validation_table_driven() {
        struct TestCase {
            name: &'static str,
            path: PathBuf,
        }

        let mut fixture = Fixture::new();
        let wrong_ext = fixture.dir.path().join("module.txt");
        std::fs::write(&wrong_ext, b"x").unwrap();
        let subdir = fixture
            .dir
            .path()
            .join(format!("dir.{}", std::env::consts::DLL_EXTENSION));
        std::fs::create_dir(&subdir).unwrap();

        let test_cases = vec![
            TestCase {
                name: "missing file",
                path: fixture.dir.path().join("absent.so"),
            },
            TestCase {
                name: "wrong extension",
                path: wrong_ext,
            },
            TestCase {
                name: "directory",
                path: subdir,
            },
        ];

        let mut loader = ModuleLoader::new(FakeBackend::new(), 4);
        for test_case in test_cases {
            let err = loader
                .load(&test_case.path, &mut fixture.registrar())
                .unwrap_err();
            assert_eq!(
                err.kind(),
                ErrorKind::InvalidArgument,
                "Test case '{}'",
                test_case.name
            );
        }
        assert!(loader.is_empty());
    }

    #[test]
    fn test_rejections_release_the_handle() {
        struct TestCase {
            name: &'static str,
            spec: FakeModuleSpec,
            expected: ErrorKind,
        }

        let test_cases = vec![
            TestCase {
                name: "missing symbols",
                spec: FakeModuleSpec::named("m").without_symbols(),
                expected: ErrorKind::Incompatible,
            },
            TestCase {
                name: "abi mismatch",
                spec: FakeModuleSpec::named("m").with_abi_version(ABI_VERSION + 1),
                expected: ErrorKind::Incompatible,
            },
            TestCase {
                name: "init failure",
                spec: FakeModuleSpec::named("m").with_init(|_| -1),
                expected: ErrorKind::Incompatible,
            },
            TestCase {
                name: "register hook failure",
                spec: FakeModuleSpec::named("m").with_register(|_| 3),
                expected: ErrorKind::Incompatible,
            },
        ];

        for test_case in test_cases {
            let mut fixture = Fixture::new();
            let path = fixture.file("m");
            let backend = FakeBackend::new().with_module("m", test_case.spec);
            let mut loader = ModuleLoader::new(backend, 4);

            let err = loader.load(&path, &mut fixture.registrar()).unwrap_err();
            assert_eq!(err.kind(), test_case.expected, "Test case '{}'", test_case.name);
            assert!(loader.is_empty(), "Test case '{}'", test_case.name);
            assert_eq!(
                loader.backend().live_modules(),
                0,
                "Test case '{}'",
                test_case.name
            );
        }
    }

    #[test]
    fn test_capacity_ceiling() {
        let mut fixture = Fixture::new();
        let mut backend = FakeBackend::new();
        let mut paths = Vec::new();
        for i in 0..3 {
            let stem = format!("m{}", i);
            backend = backend.with_module(&stem, FakeModuleSpec::named(&stem));
            paths.push(fixture.file(&stem));
        }
        let mut loader = ModuleLoader::new(backend, 2);

        loader.load(&paths[0], &mut fixture.registrar()).unwrap();
        loader.load(&paths[1], &mut fixture.registrar()).unwrap();
        let err = loader.load(&paths[2], &mut fixture.registrar()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CapacityExceeded);
        assert_eq!(loader.len(), 2);
    }

    #[test]
    fn test_same_file_under_another_spelling_is_rejected_before_init() {
        let mut fixture = Fixture::new();
        let path = fixture.file("accel");
        std::fs::create_dir(fixture.dir.path().join("sub")).unwrap();
        let detour = fixture
            .dir
            .path()
            .join("sub")
            .join("..")
            .join(path.file_name().unwrap());
        assert_ne!(detour, path);
        let backend = FakeBackend::new().with_module("accel", device_module("accel", "npu"));
        let observer = backend.clone();
        let mut loader = ModuleLoader::new(backend, 4);

        loader.load(&path, &mut fixture.registrar()).unwrap();
        let err = loader.load(&detour, &mut fixture.registrar()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateName);
        assert!(err.to_string().contains("Module path"));
        assert_eq!(observer.opened(), 1);
        assert_eq!(loader.len(), 1);
    }

    #[test]
    fn test_collision_commits_nothing() {
        let mut fixture = Fixture::new();
        fixture
            .capabilities
            .register(
                CapabilityKind::Device,
                CapabilityDescriptor::device("cpu", "1.0.0", Arc::new(CpuDevice::new())),
                Provenance::BuiltIn,
            )
            .unwrap();

        let spec = FakeModuleSpec::named("clash").with_init(|ctx| {
            ctx.register_capability(
                CapabilityKind::Device,
                CapabilityDescriptor::device("fresh", "1.0.0", Arc::new(CpuDevice::new())),
            );
            ctx.register_capability(
                CapabilityKind::Device,
                CapabilityDescriptor::device("cpu", "2.0.0", Arc::new(CpuDevice::new())),
            );
            0
        });
        let path = fixture.file("clash");
        let mut loader = ModuleLoader::new(FakeBackend::new().with_module("clash", spec), 4);

        let err = loader.load(&path, &mut fixture.registrar()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateName);
        assert!(fixture.capabilities.find(CapabilityKind::Device, "fresh").is_none());
        assert_eq!(fixture.capabilities.len(), 1);
        assert_eq!(loader.backend().live_modules(), 0);
    }

    #[test]
    fn test_unload_withdraws_and_keep_alive_outlives_it() {
        let mut fixture = Fixture::new();
        let path = fixture.file("accel");
        let backend = FakeBackend::new().with_module("accel", device_module("accel", "npu"));
        let mut loader = ModuleLoader::new(backend, 4);
        loader.load(&path, &mut fixture.registrar()).unwrap();

        let held = fixture.capabilities.find(CapabilityKind::Device, "npu").unwrap();
        loader.unload("accel", &mut fixture.registrar()).unwrap();

        assert!(fixture.capabilities.find(CapabilityKind::Device, "npu").is_none());
        assert!(loader.is_empty());
        // The descriptor we still hold keeps the module mapped.
        assert_eq!(loader.backend().live_modules(), 1);
        drop(held);
        assert_eq!(loader.backend().live_modules(), 0);

        let err = loader.unload("accel", &mut fixture.registrar()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_reload_loads_a_fresh_instance() {
        let mut fixture = Fixture::new();
        let path = fixture.file("accel");
        let backend = FakeBackend::new().with_module("accel", device_module("accel", "npu"));
        let mut loader = ModuleLoader::new(backend, 4);
        loader.load(&path, &mut fixture.registrar()).unwrap();

        let record = loader.reload("accel", &mut fixture.registrar()).unwrap();
        assert_eq!(record.name(), "accel");
        assert_eq!(loader.backend().opened(), 2);
        assert_eq!(loader.backend().live_modules(), 1);
        assert!(fixture.capabilities.contains(CapabilityKind::Device, "npu"));
    }

    #[test]
    fn test_failed_reload_leaves_module_unloaded() {
        let mut fixture = Fixture::new();
        let path = fixture.file("accel");
        let backend = FakeBackend::new().with_module("accel", device_module("accel", "npu"));
        let mut loader = ModuleLoader::new(backend, 4);
        loader.load(&path, &mut fixture.registrar()).unwrap();

        std::fs::remove_file(&path).unwrap();
        let err = loader.reload("accel", &mut fixture.registrar()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(loader.find("accel").is_none());
        assert!(!fixture.capabilities.contains(CapabilityKind::Device, "npu"));
    }

    #[test]
    fn test_scan_directory_skips_failures() {
        let mut fixture = Fixture::new();
        let good = fixture.file("a_good");
        fixture.file("b_broken");
        std::fs::write(fixture.dir.path().join("notes.txt"), b"ignored").unwrap();

        let backend = FakeBackend::new()
            .with_module("a_good", device_module("a_good", "npu"))
            .with_module("b_broken", FakeModuleSpec::named("b_broken").without_symbols());
        let mut loader = ModuleLoader::new(backend, 4);

        let dir = fixture.dir.path().to_path_buf();
        let report = loader.scan_directory(&dir, &mut fixture.registrar()).unwrap();

        assert_eq!(report.loaded.len(), 1);
        assert_eq!(report.loaded[0].path, good);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].error.kind(), ErrorKind::Incompatible);
    }

    #[test]
    fn test_scan_missing_directory_is_io_error() {
        let mut fixture = Fixture::new();
        let missing = fixture.dir.path().join("nope");
        let mut loader = ModuleLoader::new(FakeBackend::new(), 4);
        let err = loader
            .scan_directory(&missing, &mut fixture.registrar())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_module_name_defaults_to_file_stem() {
        let mut fixture = Fixture::new();
        let path = fixture.file("anonymous");
        let backend = FakeBackend::new().with_module("anonymous", FakeModuleSpec::named(""));
        let mut loader = ModuleLoader::new(backend, 4);

        let record = loader.load(&path, &mut fixture.registrar()).unwrap();
        assert_eq!(record.name(), "anonymous");
    }
}
