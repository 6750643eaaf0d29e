// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Every operational event in plugflow is described by a small message
//! struct with a `Display` implementation, so log text is defined in one
//! place instead of scattered through the registry, loader and engine.
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::registry` - capability and node-factory registration events
//! * `messages::module` - dynamic module loading, unloading and directory scans
//! * `messages::pipeline` - pipeline runs and node execution events
//!
//! # Usage
//!
//! ```rust
//! use plugflow::observability::messages::module::ModuleUnloaded;
//! use plugflow::observability::messages::StructuredLog;
//!
//! ModuleUnloaded { name: "cuda_device", path: "plugins/libcuda_device.so" }.log();
//! ```

pub mod messages;
