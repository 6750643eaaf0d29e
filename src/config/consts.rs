// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Default ceiling on simultaneously loaded modules
pub const DEFAULT_MAX_MODULES: usize = 64;
/// Default ceiling on nodes across all pipelines
pub const DEFAULT_MAX_NODES: usize = 1024;
/// Version reported for capabilities compiled into the runtime
pub const BUILTIN_VERSION: &str = env!("CARGO_PKG_VERSION");
/// Capacity of the built-in `system` memory pool (1 GiB)
pub const SYSTEM_POOL_CAPACITY: usize = 1 << 30;
