// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Process-wide registries: capabilities by kind, node factories by type and
//! the global node index.

mod capability;
mod descriptor;
mod factory;
mod node_index;

pub use capability::{CapabilityRegistry, RegistryStats};
pub use descriptor::{
    CapabilityDescriptor, CapabilityHandle, CapabilityKind, KeepAlive, Provenance,
};
pub use factory::{NodeConstructor, NodeFactory, NodeFactoryRegistry};
pub use node_index::{NodeCriteria, NodeIndex, NodeRecord};
