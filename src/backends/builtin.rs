// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Capabilities compiled into the runtime and registered with provenance
//! `BuiltIn`: the `cpu` device, the `system` memory pool and the `raw`
//! model loader. The built-in node types advertise themselves through
//! [`BuiltinNodeCapability`].

use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::errors::{RuntimeError, RuntimeResult};
use crate::tensor::{MemoryLocation, Tensor};
use crate::traits::{
    Capability, Device, MemoryBlock, MemoryPool, ModelLoader, NodeCapability, NodeType, PoolUsage,
};

/// Host device whose inference is the identity function.
#[derive(Debug, Default)]
pub struct CpuDevice;

impl CpuDevice {
    pub fn new() -> Self {
        Self
    }
}

impl Capability for CpuDevice {
    fn supports(&self, feature: &str) -> bool {
        matches!(feature, "passthrough" | "host_memory")
    }

    fn capabilities(&self) -> String {
        "cpu: passthrough inference on host memory".to_string()
    }

    fn query(&self, _request: &Value) -> RuntimeResult<Value> {
        Ok(json!({
            "device_type": self.device_type(),
            "threads": std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
        }))
    }
}

impl Device for CpuDevice {
    fn device_type(&self) -> &str {
        "cpu"
    }

    fn infer(&self, inputs: &[Tensor]) -> RuntimeResult<Vec<Tensor>> {
        Ok(inputs.to_vec())
    }
}

#[derive(Debug, Default)]
struct PoolState {
    used_bytes: usize,
    live: Vec<(u64, usize)>,
}

/// Heap pool that only does byte accounting against a fixed capacity.
#[derive(Debug)]
pub struct SystemMemoryPool {
    capacity: usize,
    next_id: AtomicU64,
    state: Mutex<PoolState>,
}

impl SystemMemoryPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_id: AtomicU64::new(1),
            state: Mutex::new(PoolState::default()),
        }
    }
}

impl Capability for SystemMemoryPool {
    fn supports(&self, feature: &str) -> bool {
        feature == "host_memory"
    }

    fn capabilities(&self) -> String {
        format!("system: host heap pool, {} bytes", self.capacity)
    }

    fn query(&self, _request: &Value) -> RuntimeResult<Value> {
        let usage = self.usage();
        serde_json::to_value(usage).map_err(|e| RuntimeError::invalid(e.to_string()))
    }
}

impl MemoryPool for SystemMemoryPool {
    fn allocate(&self, bytes: usize) -> RuntimeResult<MemoryBlock> {
        if bytes == 0 {
            return Err(RuntimeError::MemoryAllocation(
                "zero-byte allocation requested".to_string(),
            ));
        }
        let mut state = self
            .state
            .lock()
            .map_err(|_| RuntimeError::LockPoisoned("system memory pool"))?;
        let available = self.capacity - state.used_bytes;
        if bytes > available {
            return Err(RuntimeError::MemoryAllocation(format!(
                "requested {} bytes but only {} of {} are free",
                bytes, available, self.capacity
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        state.used_bytes += bytes;
        state.live.push((id, bytes));
        Ok(MemoryBlock {
            id,
            size: bytes,
            location: MemoryLocation::Host,
        })
    }

    fn release(&self, block: MemoryBlock) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if let Some(position) = state.live.iter().position(|(id, _)| *id == block.id) {
            let (_, size) = state.live.remove(position);
            state.used_bytes -= size;
        }
    }

    fn usage(&self) -> PoolUsage {
        match self.state.lock() {
            Ok(state) => PoolUsage {
                capacity_bytes: self.capacity,
                used_bytes: state.used_bytes,
                live_blocks: state.live.len(),
            },
            Err(_) => PoolUsage {
                capacity_bytes: self.capacity,
                ..PoolUsage::default()
            },
        }
    }
}

/// Recognizes raw weight dumps by extension.
#[derive(Debug, Default)]
pub struct RawModelLoader;

const RAW_FORMATS: [&str; 2] = ["bin", "raw"];

impl RawModelLoader {
    pub fn new() -> Self {
        Self
    }
}

impl Capability for RawModelLoader {
    fn supports(&self, feature: &str) -> bool {
        RAW_FORMATS.contains(&feature)
    }

    fn capabilities(&self) -> String {
        "raw: uninterpreted .bin/.raw weight files".to_string()
    }
}

impl ModelLoader for RawModelLoader {
    fn formats(&self) -> Vec<String> {
        RAW_FORMATS.iter().map(|f| f.to_string()).collect()
    }

    fn can_load(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| RAW_FORMATS.contains(&ext.to_ascii_lowercase().as_str()))
    }
}

/// Registry-side advertisement of a node type.
#[derive(Debug)]
pub struct BuiltinNodeCapability {
    node_type: NodeType,
    description: &'static str,
}

impl BuiltinNodeCapability {
    pub fn new(node_type: impl Into<NodeType>, description: &'static str) -> Self {
        Self {
            node_type: node_type.into(),
            description,
        }
    }
}

impl Capability for BuiltinNodeCapability {
    fn supports(&self, feature: &str) -> bool {
        feature == self.node_type.as_str()
    }

    fn capabilities(&self) -> String {
        format!("{}: {}", self.node_type, self.description)
    }
}

impl NodeCapability for BuiltinNodeCapability {
    fn node_type(&self) -> &NodeType {
        &self.node_type
    }
}
