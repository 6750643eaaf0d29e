// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::errors::RuntimeResult;
use crate::tensor::Tensor;
use crate::traits::{ExecutionContext, PipelineNode};

/// Copy node - outputs its inputs unchanged
#[derive(Debug, Default)]
pub struct CopyNode;

impl CopyNode {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PipelineNode for CopyNode {
    async fn execute(
        &mut self,
        _ctx: &ExecutionContext<'_>,
        inputs: &[Tensor],
    ) -> RuntimeResult<Vec<Tensor>> {
        Ok(inputs.to_vec())
    }

    fn name(&self) -> &'static str {
        "copy"
    }
}
