// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The runtime object: one capability registry, one node factory registry,
//! one global node index and one module loader, each behind its own lock.
//!
//! When more than one lock is needed they are taken in the order
//! loader → capabilities → factories → node index.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::backends::builtin::{BuiltinNodeCapability, CpuDevice, RawModelLoader, SystemMemoryPool};
use crate::backends::local::LocalNodeFactory;
use crate::config::consts::{BUILTIN_VERSION, SYSTEM_POOL_CAPACITY};
use crate::config::{PipelineConfig, RuntimeConfig};
use crate::engine::{Pipeline, PipelineOptions};
use crate::errors::{RuntimeError, RuntimeResult};
use crate::loader::autoload::{self, search_paths};
use crate::loader::{ModuleBackend, ModuleLoader, ModuleRecord, NativeBackend, Registrar, ScanReport};
use crate::registry::{
    CapabilityDescriptor, CapabilityKind, CapabilityRegistry, NodeCriteria, NodeFactory,
    NodeFactoryRegistry, NodeIndex, NodeRecord, Provenance, RegistryStats,
};
use crate::traits::NodeType;

pub(crate) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    what: &'static str,
) -> RuntimeResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| RuntimeError::LockPoisoned(what))
}

pub(crate) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    what: &'static str,
) -> RuntimeResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| RuntimeError::LockPoisoned(what))
}

/// Handles to the registries a pipeline needs after it has been created.
#[derive(Clone)]
pub(crate) struct SharedRegistries {
    pub capabilities: Arc<RwLock<CapabilityRegistry>>,
    pub factories: Arc<RwLock<NodeFactoryRegistry>>,
    pub node_index: Arc<RwLock<NodeIndex>>,
}

/// Process-wide runtime state.
///
/// Construct one with [`Runtime::new`] (or
/// [`RuntimeBuilder`](crate::config::RuntimeBuilder) to also register the
/// built-ins and autoload modules), then create pipelines from it. Pipelines
/// keep the registries alive on their own, so they may outlive the runtime.
pub struct Runtime<B: ModuleBackend = NativeBackend> {
    config: RuntimeConfig,
    shared: SharedRegistries,
    loader: Mutex<ModuleLoader<B>>,
}

impl Runtime<NativeBackend> {
    /// An initialized runtime with empty registries and no modules.
    pub fn new(config: RuntimeConfig) -> Self {
        Self::with_backend(config, NativeBackend::new())
    }
}

impl<B: ModuleBackend> Runtime<B> {
    pub fn with_backend(config: RuntimeConfig, backend: B) -> Self {
        let shared = SharedRegistries {
            capabilities: Arc::new(RwLock::new(CapabilityRegistry::initialized())),
            factories: Arc::new(RwLock::new(NodeFactoryRegistry::new())),
            node_index: Arc::new(RwLock::new(NodeIndex::new(config.max_nodes))),
        };
        let loader = Mutex::new(ModuleLoader::new(backend, config.max_modules));
        Self {
            config,
            shared,
            loader,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub(crate) fn shared(&self) -> SharedRegistries {
        self.shared.clone()
    }

    fn lock_loader(&self) -> RuntimeResult<MutexGuard<'_, ModuleLoader<B>>> {
        self.loader
            .lock()
            .map_err(|_| RuntimeError::LockPoisoned("module loader"))
    }

    /// Run `operation` with the loader and both registries locked for writing.
    fn with_loader<T>(
        &self,
        operation: impl FnOnce(&mut ModuleLoader<B>, &mut Registrar<'_>) -> RuntimeResult<T>,
    ) -> RuntimeResult<T> {
        let mut loader = self.lock_loader()?;
        let mut capabilities = write_lock(&self.shared.capabilities, "capability registry")?;
        let mut factories = write_lock(&self.shared.factories, "node factory registry")?;
        let mut registrar = Registrar {
            capabilities: &mut *capabilities,
            factories: &mut *factories,
        };
        operation(&mut loader, &mut registrar)
    }

    /// Register the `cpu` device, `system` pool, `raw` loader and the local node types.
    pub fn register_builtins(&self) -> RuntimeResult<()> {
        let mut capabilities = write_lock(&self.shared.capabilities, "capability registry")?;
        let mut factories = write_lock(&self.shared.factories, "node factory registry")?;

        capabilities.register(
            CapabilityKind::Device,
            CapabilityDescriptor::device("cpu", BUILTIN_VERSION, Arc::new(CpuDevice::new())),
            Provenance::BuiltIn,
        )?;
        capabilities.register(
            CapabilityKind::MemoryPool,
            CapabilityDescriptor::memory_pool(
                "system",
                BUILTIN_VERSION,
                Arc::new(SystemMemoryPool::new(SYSTEM_POOL_CAPACITY)),
            ),
            Provenance::BuiltIn,
        )?;
        capabilities.register(
            CapabilityKind::ModelLoader,
            CapabilityDescriptor::model_loader("raw", BUILTIN_VERSION, Arc::new(RawModelLoader::new())),
            Provenance::BuiltIn,
        )?;

        for factory in LocalNodeFactory::node_factories(&self.shared.capabilities) {
            let node_type = factory.node_type.clone();
            let advert = BuiltinNodeCapability::new(
                node_type.clone(),
                LocalNodeFactory::describe(node_type.as_str()),
            );
            capabilities.register(
                CapabilityKind::PipelineNode,
                CapabilityDescriptor::pipeline_node(node_type.as_str(), BUILTIN_VERSION, Arc::new(advert)),
                Provenance::BuiltIn,
            )?;
            factories.register_factory(factory)?;
        }
        Ok(())
    }

    /// Register a capability at runtime (provenance `Dynamic`).
    pub fn register_capability(
        &self,
        kind: CapabilityKind,
        descriptor: CapabilityDescriptor,
    ) -> RuntimeResult<()> {
        write_lock(&self.shared.capabilities, "capability registry")?.register(
            kind,
            descriptor,
            Provenance::Dynamic,
        )
    }

    pub fn unregister_capability(&self, kind: CapabilityKind, name: &str) -> RuntimeResult<()> {
        write_lock(&self.shared.capabilities, "capability registry")?
            .unregister(kind, name)
            .map(|_| ())
    }

    pub fn find_capability(
        &self,
        kind: CapabilityKind,
        name: &str,
    ) -> RuntimeResult<Option<CapabilityDescriptor>> {
        Ok(read_lock(&self.shared.capabilities, "capability registry")?.find(kind, name))
    }

    pub fn list_capabilities(
        &self,
        kind: CapabilityKind,
        limit: usize,
    ) -> RuntimeResult<Vec<CapabilityDescriptor>> {
        Ok(read_lock(&self.shared.capabilities, "capability registry")?.list(kind, limit))
    }

    pub fn capability_snapshot(&self) -> RuntimeResult<Vec<CapabilityDescriptor>> {
        Ok(read_lock(&self.shared.capabilities, "capability registry")?.snapshot())
    }

    pub fn stats(&self) -> RuntimeResult<RegistryStats> {
        let loaded_modules = self.lock_loader()?.len();
        let mut stats = read_lock(&self.shared.capabilities, "capability registry")?.stats();
        stats.loaded_modules = loaded_modules;
        Ok(stats)
    }

    pub fn register_node_factory(&self, factory: NodeFactory) -> RuntimeResult<()> {
        write_lock(&self.shared.factories, "node factory registry")?.register_factory(factory)
    }

    pub fn unregister_node_factory(&self, node_type: &NodeType) -> RuntimeResult<()> {
        write_lock(&self.shared.factories, "node factory registry")?
            .unregister_factory(node_type)
            .map(|_| ())
    }

    pub fn node_factories(&self) -> RuntimeResult<Vec<(NodeType, String)>> {
        Ok(read_lock(&self.shared.factories, "node factory registry")?.list())
    }

    pub fn load_module(&self, path: &Path) -> RuntimeResult<ModuleRecord> {
        self.with_loader(|loader, registrar| loader.load(path, registrar))
    }

    pub fn unload_module(&self, name: &str) -> RuntimeResult<ModuleRecord> {
        self.with_loader(|loader, registrar| loader.unload(name, registrar))
    }

    /// Unload and load again. A failed reload leaves the module unloaded.
    pub fn reload_module(&self, name: &str) -> RuntimeResult<ModuleRecord> {
        self.with_loader(|loader, registrar| loader.reload(name, registrar))
    }

    pub fn scan_directory(&self, directory: &Path) -> RuntimeResult<ScanReport> {
        self.with_loader(|loader, registrar| loader.scan_directory(directory, registrar))
    }

    /// Scan the configured plugin paths (or the environment/default search path).
    ///
    /// Individual failures end up in the report; only a poisoned lock is an error.
    pub fn autoload(&self) -> RuntimeResult<ScanReport> {
        let roots = self
            .config
            .plugin_paths
            .clone()
            .unwrap_or_else(search_paths);
        self.with_loader(|loader, registrar| {
            let (report, _) = autoload::autoload(loader, registrar, &roots);
            Ok(report)
        })
    }

    pub fn modules(&self) -> RuntimeResult<Vec<ModuleRecord>> {
        Ok(self.lock_loader()?.modules())
    }

    /// Query the global node index across every pipeline.
    pub fn find_nodes(&self, criteria: &NodeCriteria) -> RuntimeResult<Vec<NodeRecord>> {
        Ok(read_lock(&self.shared.node_index, "node index")?.find_nodes(criteria))
    }

    pub fn tag_node(&self, name: &str, tag: &str) -> RuntimeResult<()> {
        write_lock(&self.shared.node_index, "node index")?.tag_node(name, tag)
    }

    pub fn create_pipeline(&self, name: impl Into<String>, options: PipelineOptions) -> Pipeline {
        Pipeline::new(name, options, self.shared())
    }

    pub fn build_pipeline(&self, config: &PipelineConfig) -> RuntimeResult<Pipeline> {
        Pipeline::from_config(self, config)
    }

    /// Unload every module, drop all factories and return the capability
    /// registry to its uninitialized state.
    pub fn shutdown(&self) -> RuntimeResult<()> {
        let unloaded = self.with_loader(|loader, registrar| Ok(loader.unload_all(registrar)))?;
        write_lock(&self.shared.factories, "node factory registry")?.clear();
        write_lock(&self.shared.capabilities, "capability registry")?.shutdown();
        tracing::info!(unloaded_modules = unloaded, "Runtime shut down");
        Ok(())
    }
}
