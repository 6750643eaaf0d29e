// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::engine::NodeConfig;
use crate::errors::{RuntimeError, RuntimeResult};
use crate::tensor::Tensor;
use crate::traits::{ExecutionContext, PipelineNode};

/// Select node - forwards the single input at `payload.index`.
#[derive(Debug, Default)]
pub struct SelectNode {
    index: usize,
}

impl SelectNode {
    pub fn new(index: usize) -> Self {
        Self { index }
    }

    /// Reads `payload.index`, defaulting to the first input.
    pub fn from_config(config: &NodeConfig) -> RuntimeResult<Self> {
        match config.payload.get("index") {
            None => Ok(Self::new(0)),
            Some(value) => value
                .as_u64()
                .map(|index| Self::new(index as usize))
                .ok_or_else(|| {
                    RuntimeError::invalid(format!(
                        "select: 'index' must be a non-negative integer, got {}",
                        value
                    ))
                }),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

#[async_trait]
impl PipelineNode for SelectNode {
    async fn execute(
        &mut self,
        ctx: &ExecutionContext<'_>,
        inputs: &[Tensor],
    ) -> RuntimeResult<Vec<Tensor>> {
        let selected = inputs.get(self.index).ok_or_else(|| {
            RuntimeError::execution(
                ctx.node,
                format!(
                    "select index {} is out of range for {} inputs",
                    self.index,
                    inputs.len()
                ),
            )
        })?;
        Ok(vec![selected.clone()])
    }

    fn validate(&self, config: &NodeConfig) -> RuntimeResult<()> {
        Self::from_config(config).map(|_| ())
    }

    fn name(&self) -> &'static str {
        "select"
    }
}
