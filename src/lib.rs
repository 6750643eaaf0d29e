// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod backends;   // built-in capabilities and node types
pub mod config;     // runtime + pipeline configuration
pub mod engine;     // pipeline DAG engine
pub mod errors;     // error handling
pub mod loader;     // dynamic modules and autoload
pub mod observability;
pub mod registry;   // capability, factory and node registries
pub mod runtime;
pub mod tensor;
pub mod traits;     // capability and node contracts

pub use runtime::Runtime;
