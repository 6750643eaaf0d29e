// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod capability;
pub mod node;

pub use capability::{
    Capability, CapabilityStatus, Device, MemoryBlock, MemoryPool, ModelLoader, NodeCapability,
    PoolUsage,
};
pub use node::{ExecutionContext, NodeType, PipelineNode};
