// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::errors::{RuntimeError, RuntimeResult};
use crate::traits::{CapabilityStatus, Device, MemoryPool, ModelLoader, NodeCapability};

/// Opaque token that keeps a loaded module's code mapped while held.
pub type KeepAlive = Arc<dyn Any + Send + Sync>;

/// Independent namespaces of the capability registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Device,
    MemoryPool,
    ModelLoader,
    PipelineNode,
}

impl CapabilityKind {
    pub const ALL: [CapabilityKind; 4] = [
        CapabilityKind::Device,
        CapabilityKind::MemoryPool,
        CapabilityKind::ModelLoader,
        CapabilityKind::PipelineNode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityKind::Device => "device",
            CapabilityKind::MemoryPool => "memory_pool",
            CapabilityKind::ModelLoader => "model_loader",
            CapabilityKind::PipelineNode => "pipeline_node",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CapabilityKind {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "device" => Ok(CapabilityKind::Device),
            "memory_pool" | "memory-pool" => Ok(CapabilityKind::MemoryPool),
            "model_loader" | "model-loader" => Ok(CapabilityKind::ModelLoader),
            "pipeline_node" | "pipeline-node" => Ok(CapabilityKind::PipelineNode),
            other => Err(RuntimeError::invalid(format!(
                "unknown capability kind '{}'",
                other
            ))),
        }
    }
}

/// Where a capability came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    BuiltIn,
    Plugin,
    #[default]
    Dynamic,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Provenance::BuiltIn => "built-in",
            Provenance::Plugin => "plugin",
            Provenance::Dynamic => "dynamic",
        };
        f.write_str(label)
    }
}

/// The capability object itself, one variant per kind.
#[derive(Clone)]
pub enum CapabilityHandle {
    Device(Arc<dyn Device>),
    MemoryPool(Arc<dyn MemoryPool>),
    ModelLoader(Arc<dyn ModelLoader>),
    PipelineNode(Arc<dyn NodeCapability>),
}

macro_rules! dispatch {
    ($handle:expr, $inner:ident => $call:expr) => {
        match $handle {
            CapabilityHandle::Device($inner) => $call,
            CapabilityHandle::MemoryPool($inner) => $call,
            CapabilityHandle::ModelLoader($inner) => $call,
            CapabilityHandle::PipelineNode($inner) => $call,
        }
    };
}

impl CapabilityHandle {
    pub fn kind(&self) -> CapabilityKind {
        match self {
            CapabilityHandle::Device(_) => CapabilityKind::Device,
            CapabilityHandle::MemoryPool(_) => CapabilityKind::MemoryPool,
            CapabilityHandle::ModelLoader(_) => CapabilityKind::ModelLoader,
            CapabilityHandle::PipelineNode(_) => CapabilityKind::PipelineNode,
        }
    }

    pub fn status(&self) -> CapabilityStatus {
        dispatch!(self, c => c.status())
    }

    pub fn query(&self, request: &Value) -> RuntimeResult<Value> {
        dispatch!(self, c => c.query(request))
    }

    pub fn supports(&self, feature: &str) -> bool {
        dispatch!(self, c => c.supports(feature))
    }

    pub fn capabilities(&self) -> String {
        dispatch!(self, c => c.capabilities())
    }
}

/// A named, versioned capability as stored in the registry.
///
/// Cloning is cheap: the handle is reference counted. A descriptor that came
/// from a loaded module carries a keep-alive token, so the module's code stays
/// mapped for as long as any clone is alive.
#[derive(Clone)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub version: String,
    pub provenance: Provenance,
    // Declared before `keep_alive` so the handle is dropped first.
    handle: CapabilityHandle,
    keep_alive: Option<KeepAlive>,
}

impl CapabilityDescriptor {
    pub fn new(name: impl Into<String>, version: impl Into<String>, handle: CapabilityHandle) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            provenance: Provenance::default(),
            handle,
            keep_alive: None,
        }
    }

    pub fn device(name: impl Into<String>, version: impl Into<String>, device: Arc<dyn Device>) -> Self {
        Self::new(name, version, CapabilityHandle::Device(device))
    }

    pub fn memory_pool(
        name: impl Into<String>,
        version: impl Into<String>,
        pool: Arc<dyn MemoryPool>,
    ) -> Self {
        Self::new(name, version, CapabilityHandle::MemoryPool(pool))
    }

    pub fn model_loader(
        name: impl Into<String>,
        version: impl Into<String>,
        loader: Arc<dyn ModelLoader>,
    ) -> Self {
        Self::new(name, version, CapabilityHandle::ModelLoader(loader))
    }

    pub fn pipeline_node(
        name: impl Into<String>,
        version: impl Into<String>,
        node: Arc<dyn NodeCapability>,
    ) -> Self {
        Self::new(name, version, CapabilityHandle::PipelineNode(node))
    }

    pub(crate) fn with_keep_alive(mut self, token: KeepAlive) -> Self {
        self.keep_alive = Some(token);
        self
    }

    pub fn kind(&self) -> CapabilityKind {
        self.handle.kind()
    }

    pub fn handle(&self) -> &CapabilityHandle {
        &self.handle
    }

    pub fn as_device(&self) -> Option<Arc<dyn Device>> {
        match &self.handle {
            CapabilityHandle::Device(device) => Some(device.clone()),
            _ => None,
        }
    }

    pub fn as_memory_pool(&self) -> Option<Arc<dyn MemoryPool>> {
        match &self.handle {
            CapabilityHandle::MemoryPool(pool) => Some(pool.clone()),
            _ => None,
        }
    }

    pub fn as_model_loader(&self) -> Option<Arc<dyn ModelLoader>> {
        match &self.handle {
            CapabilityHandle::ModelLoader(loader) => Some(loader.clone()),
            _ => None,
        }
    }

    /// Same underlying capability object, ignoring name and version.
    pub fn same_handle(&self, other: &CapabilityDescriptor) -> bool {
        match (&self.handle, &other.handle) {
            (CapabilityHandle::Device(a), CapabilityHandle::Device(b)) => Arc::ptr_eq(a, b),
            (CapabilityHandle::MemoryPool(a), CapabilityHandle::MemoryPool(b)) => Arc::ptr_eq(a, b),
            (CapabilityHandle::ModelLoader(a), CapabilityHandle::ModelLoader(b)) => Arc::ptr_eq(a, b),
            (CapabilityHandle::PipelineNode(a), CapabilityHandle::PipelineNode(b)) => {
                Arc::ptr_eq(a, b)
            }
            _ => false,
        }
    }
}

impl fmt::Debug for CapabilityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityDescriptor")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("kind", &self.kind())
            .field("provenance", &self.provenance)
            .field("module_bound", &self.keep_alive.is_some())
            .finish()
    }
}
