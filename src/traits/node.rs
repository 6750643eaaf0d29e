// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::engine::NodeConfig;
use crate::errors::RuntimeResult;
use crate::tensor::Tensor;

/// Tag selecting which factory builds a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeType(String);

impl NodeType {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeType {
    fn from(tag: &str) -> Self {
        Self(tag.to_string())
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-invocation information handed to a node's `execute`.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionContext<'a> {
    pub pipeline: &'a str,
    pub node: &'a str,
    /// Position of the node in this run's topological order.
    pub position: usize,
    /// Pipeline invocation counter, starting at 1.
    pub iteration: u64,
    /// Attempt number within the node's retry budget, starting at 1.
    pub attempt: u32,
}

/// Execution contract implemented by every pipeline node.
///
/// Nodes are owned by exactly one pipeline and executed one at a time, so
/// `execute` takes `&mut self` and may keep state between runs.
#[async_trait]
pub trait PipelineNode: Send + Sync {
    async fn execute(
        &mut self,
        ctx: &ExecutionContext<'_>,
        inputs: &[Tensor],
    ) -> RuntimeResult<Vec<Tensor>>;

    /// Checks the configuration before the node joins a pipeline.
    fn validate(&self, _config: &NodeConfig) -> RuntimeResult<()> {
        Ok(())
    }

    /// Releases outputs once every consumer has read them.
    fn cleanup(&mut self, outputs: Vec<Tensor>) {
        drop(outputs);
    }

    /// Called once when the node is removed from its pipeline.
    fn destroy(&mut self) {}

    fn name(&self) -> &'static str;
}
