// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::errors::RuntimeResult;
use crate::tensor::Tensor;
use crate::traits::{ExecutionContext, PipelineNode};

/// Merge node - fan-in point that emits every gathered input as one batch.
///
/// Inputs arrive already ordered by destination slot, so the output order
/// follows the slots the upstream edges were connected to.
#[derive(Debug, Default)]
pub struct MergeNode;

impl MergeNode {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PipelineNode for MergeNode {
    async fn execute(
        &mut self,
        _ctx: &ExecutionContext<'_>,
        inputs: &[Tensor],
    ) -> RuntimeResult<Vec<Tensor>> {
        let mut merged = Vec::with_capacity(inputs.len());
        merged.extend_from_slice(inputs);
        Ok(merged)
    }

    fn name(&self) -> &'static str {
        "merge"
    }
}
