// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use crate::engine::NodeConfig;
use crate::errors::{RuntimeError, RuntimeResult};
use crate::registry::{CapabilityKind, CapabilityRegistry};
use crate::tensor::Tensor;
use crate::traits::{ExecutionContext, PipelineNode};

pub const DEFAULT_DEVICE: &str = "cpu";

/// Inference node - runs its inputs through a registered device.
///
/// The device is resolved on every execution, so a device registered (or
/// reloaded) after the node was created is picked up on the next run.
pub struct InferenceNode {
    device: String,
    capabilities: Arc<RwLock<CapabilityRegistry>>,
}

impl InferenceNode {
    pub fn new(device: impl Into<String>, capabilities: Arc<RwLock<CapabilityRegistry>>) -> Self {
        Self {
            device: device.into(),
            capabilities,
        }
    }

    pub fn from_config(
        config: &NodeConfig,
        capabilities: Arc<RwLock<CapabilityRegistry>>,
    ) -> RuntimeResult<Self> {
        let device = match config.payload.get("device") {
            None => DEFAULT_DEVICE.to_string(),
            Some(value) => value
                .as_str()
                .filter(|name| !name.is_empty())
                .ok_or_else(|| {
                    RuntimeError::invalid(format!(
                        "inference: 'device' must be a non-empty string, got {}",
                        value
                    ))
                })?
                .to_string(),
        };
        Ok(Self::new(device, capabilities))
    }

    pub fn device(&self) -> &str {
        &self.device
    }
}

#[async_trait]
impl PipelineNode for InferenceNode {
    async fn execute(
        &mut self,
        ctx: &ExecutionContext<'_>,
        inputs: &[Tensor],
    ) -> RuntimeResult<Vec<Tensor>> {
        let device = {
            let registry = self
                .capabilities
                .read()
                .map_err(|_| RuntimeError::LockPoisoned("capability registry"))?;
            registry
                .find(CapabilityKind::Device, &self.device)
                .and_then(|descriptor| descriptor.as_device())
        };
        let device = device.ok_or_else(|| {
            RuntimeError::execution(ctx.node, format!("device '{}' is not registered", self.device))
        })?;

        device
            .infer(inputs)
            .map_err(|e| RuntimeError::execution(ctx.node, e.to_string()))
    }

    fn name(&self) -> &'static str {
        "inference"
    }
}
