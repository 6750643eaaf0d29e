// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The contract between the runtime and a dynamically loaded module.
//!
//! A module exports two required symbols and one optional one:
//!
//! | symbol                        | signature                               |
//! |-------------------------------|-----------------------------------------|
//! | `plugflow_module_abi_version` | `fn() -> u32`                           |
//! | `plugflow_module_init`        | `fn(&mut ModuleInitContext) -> i32`     |
//! | `plugflow_module_register`    | `fn(&mut ModuleInitContext) -> i32`     |
//!
//! The entry points use the Rust ABI, so a module must be built against the
//! same `plugflow` release (and compiler) as the host. [`ABI_VERSION`] is
//! bumped whenever the types crossing this boundary change.
//!
//! The [`declare_module!`](crate::declare_module) macro generates the exports.

use serde::Serialize;

use crate::errors::RuntimeResult;
use crate::registry::{CapabilityDescriptor, CapabilityKind, NodeFactory};

pub const ABI_VERSION: u32 = 1;

pub const INIT_SYMBOL: &[u8] = b"plugflow_module_init\0";
pub const VERSION_SYMBOL: &[u8] = b"plugflow_module_abi_version\0";
pub const REGISTER_SYMBOL: &[u8] = b"plugflow_module_register\0";

/// Status returned by a successful initializer.
pub const MODULE_OK: i32 = 0;
/// Status the generated initializer returns when the module's init fails.
pub const MODULE_INIT_FAILED: i32 = -1;

pub type ModuleInitFn = fn(&mut ModuleInitContext) -> i32;
pub type ModuleVersionFn = fn() -> u32;

/// What a module declares about itself during init.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModuleMetadata {
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    pub license: String,
}

/// Handed to a module's initializer.
///
/// The module fills in its metadata and queues the capabilities and node
/// factories it provides. Nothing reaches the runtime's registries until the
/// initializer has returned success and every queued name has been checked.
#[derive(Default)]
pub struct ModuleInitContext {
    pub metadata: ModuleMetadata,
    capabilities: Vec<(CapabilityKind, CapabilityDescriptor)>,
    node_factories: Vec<NodeFactory>,
}

impl ModuleInitContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_capability(&mut self, kind: CapabilityKind, descriptor: CapabilityDescriptor) {
        self.capabilities.push((kind, descriptor));
    }

    pub fn register_node_factory(&mut self, factory: NodeFactory) {
        self.node_factories.push(factory);
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        ModuleMetadata,
        Vec<(CapabilityKind, CapabilityDescriptor)>,
        Vec<NodeFactory>,
    ) {
        (self.metadata, self.capabilities, self.node_factories)
    }
}

/// Adapts a `fn(&mut ModuleInitContext) -> RuntimeResult<()>` to the exported status code.
pub fn init_status(result: RuntimeResult<()>) -> i32 {
    match result {
        Ok(()) => MODULE_OK,
        Err(error) => {
            tracing::error!("Module initializer failed: {}", error);
            MODULE_INIT_FAILED
        }
    }
}

/// Export the module entry points from a `cdylib` crate.
///
/// ```ignore
/// use plugflow::loader::ModuleInitContext;
/// use plugflow::errors::RuntimeResult;
///
/// fn init(ctx: &mut ModuleInitContext) -> RuntimeResult<()> {
///     ctx.metadata.name = "my_device".into();
///     ctx.metadata.version = "0.1.0".into();
///     // ctx.register_capability(...)
///     Ok(())
/// }
///
/// plugflow::declare_module!(init);
/// ```
#[macro_export]
macro_rules! declare_module {
    ($init:path) => {
        #[no_mangle]
        pub fn plugflow_module_abi_version() -> u32 {
            $crate::loader::ABI_VERSION
        }

        #[no_mangle]
        pub fn plugflow_module_init(ctx: &mut $crate::loader::ModuleInitContext) -> i32 {
            $crate::loader::init_status($init(ctx))
        }
    };
}
