// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Implementations that ship inside the runtime.
//!
//! # Built-in capabilities
//! - **`cpu` device**: passthrough inference on host memory
//! - **`system` memory pool**: heap pool with byte accounting
//! - **`raw` model loader**: recognizes `.bin`/`.raw` weight files
//!
//! # Local node types
//! In-process pipeline nodes created through [`local::LocalNodeFactory`]:
//! - **copy**: forwards its inputs unchanged
//! - **merge**: fan-in, concatenates all inputs
//! - **select**: forwards one input by index
//! - **inference**: runs inputs through a registered device
//!
//! # Stub backend (test-only)
//! Scripted nodes (counting, failing, flaky, slow) and a fake module
//! backend, only compiled for tests.
//!
//! # Architecture
//!
//! ```text
//! Runtime::register_builtins → LocalNodeFactory → NodeFactoryRegistry → Pipeline::add_node
//! ```

pub mod builtin;
pub mod local;
#[cfg(test)]
pub mod stub;
