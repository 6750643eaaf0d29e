// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod node;
pub mod pipeline;
pub mod topology;

pub use node::{NodeConfig, NodeStats};
pub use pipeline::{Pipeline, PipelineOptions, PipelineStats};
pub use topology::{EdgeInfo, NodeInfo, TopologySnapshot};
