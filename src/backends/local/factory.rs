// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::{Arc, RwLock};

use super::nodes::*;
use crate::engine::NodeConfig;
use crate::errors::{RuntimeError, RuntimeResult};
use crate::registry::{CapabilityRegistry, NodeFactory};
use crate::traits::PipelineNode;

/// Factory for the node types compiled into the runtime
pub struct LocalNodeFactory;

impl LocalNodeFactory {
    /// Create a built-in node from its type tag
    ///
    /// - "copy" -> CopyNode
    /// - "merge" -> MergeNode
    /// - "select" -> SelectNode (`payload.index`, default 0)
    /// - "inference" -> InferenceNode (`payload.device`, default "cpu")
    pub fn create_node(
        node_type: &str,
        config: &NodeConfig,
        capabilities: &Arc<RwLock<CapabilityRegistry>>,
    ) -> RuntimeResult<Box<dyn PipelineNode>> {
        match node_type {
            "copy" => Ok(Box::new(CopyNode::new())),
            "merge" => Ok(Box::new(MergeNode::new())),
            "select" => Ok(Box::new(SelectNode::from_config(config)?)),
            "inference" => Ok(Box::new(InferenceNode::from_config(
                config,
                capabilities.clone(),
            )?)),
            _ => Err(RuntimeError::invalid(format!(
                "unknown built-in node type '{}'",
                node_type
            ))),
        }
    }

    /// List all built-in node types
    pub fn list_available_implementations() -> Vec<&'static str> {
        vec!["copy", "merge", "select", "inference"]
    }

    pub fn is_implementation_available(node_type: &str) -> bool {
        Self::list_available_implementations().contains(&node_type)
    }

    /// One-line description used for the registry and factory listings
    pub fn describe(node_type: &str) -> &'static str {
        match node_type {
            "copy" => "forwards its inputs unchanged",
            "merge" => "concatenates all inputs into one batch",
            "select" => "forwards the input at payload.index",
            "inference" => "runs inputs through the device named by payload.device",
            _ => "unknown",
        }
    }

    /// A registry factory for every built-in type, bound to `capabilities`.
    pub fn node_factories(capabilities: &Arc<RwLock<CapabilityRegistry>>) -> Vec<NodeFactory> {
        Self::list_available_implementations()
            .into_iter()
            .map(|node_type| {
                let capabilities = capabilities.clone();
                NodeFactory::new(node_type, Self::describe(node_type), move |_name, config| {
                    Self::create_node(node_type, config, &capabilities)
                })
            })
            .collect()
    }
}
