// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The query contract every registered capability answers, and the
//! kind-specific interfaces layered on top of it.

use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::path::Path;

use crate::errors::RuntimeResult;
use crate::tensor::{MemoryLocation, Tensor};
use crate::traits::node::NodeType;

/// Lifecycle state reported by a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityStatus {
    Loaded,
    Active,
    Inactive,
    Error,
    Unloaded,
}

impl fmt::Display for CapabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CapabilityStatus::Loaded => "loaded",
            CapabilityStatus::Active => "active",
            CapabilityStatus::Inactive => "inactive",
            CapabilityStatus::Error => "error",
            CapabilityStatus::Unloaded => "unloaded",
        };
        f.write_str(label)
    }
}

/// Anything registered with the runtime answers these questions.
pub trait Capability: Send + Sync {
    fn status(&self) -> CapabilityStatus {
        CapabilityStatus::Active
    }

    /// Free-form query; the request and response shapes are defined by the provider.
    fn query(&self, _request: &Value) -> RuntimeResult<Value> {
        Ok(json!({ "capabilities": self.capabilities() }))
    }

    fn supports(&self, feature: &str) -> bool;

    /// Human-readable summary of what this capability offers.
    fn capabilities(&self) -> String;
}

/// A compute device able to run inference on a tensor batch.
pub trait Device: Capability {
    fn device_type(&self) -> &str;

    fn infer(&self, inputs: &[Tensor]) -> RuntimeResult<Vec<Tensor>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryBlock {
    pub id: u64,
    pub size: usize,
    pub location: MemoryLocation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolUsage {
    pub capacity_bytes: usize,
    pub used_bytes: usize,
    pub live_blocks: usize,
}

/// A memory-pool provider. Allocation strategy is up to the implementation.
pub trait MemoryPool: Capability {
    fn allocate(&self, bytes: usize) -> RuntimeResult<MemoryBlock>;

    fn release(&self, block: MemoryBlock);

    fn usage(&self) -> PoolUsage;
}

/// A model loader that recognizes model files it is able to decode.
pub trait ModelLoader: Capability {
    fn formats(&self) -> Vec<String>;

    fn can_load(&self, path: &Path) -> bool;
}

/// Advertises a pipeline node type through the capability registry.
pub trait NodeCapability: Capability {
    fn node_type(&self) -> &NodeType;
}
