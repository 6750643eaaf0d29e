// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod loader;
mod runtime;
mod validation;

pub mod consts;

pub use loader::{
    load_and_validate_pipeline, load_file, load_pipeline_config, load_runtime_config, EdgeSpec,
    NodeSpec, PipelineConfig, RuntimeConfig,
};
pub use runtime::RuntimeBuilder;
pub use validation::validate_pipeline_config;
