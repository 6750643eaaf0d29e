// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Node factory registry: maps a node type tag to the constructor that builds it.
//!
//! The pipeline consults this registry when a node is added, so a type that
//! nobody registered surfaces as an "unsupported node type" error at that
//! point rather than at startup.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::engine::NodeConfig;
use crate::errors::{RuntimeError, RuntimeResult};
use crate::observability::messages::registry::NodeFactoryRegistered;
use crate::observability::messages::StructuredLog;
use crate::registry::descriptor::KeepAlive;
use crate::tensor::Tensor;
use crate::traits::{ExecutionContext, NodeType, PipelineNode};

/// Builds a node from its pipeline-local name and configuration.
pub type NodeConstructor =
    Arc<dyn Fn(&str, &NodeConfig) -> RuntimeResult<Box<dyn PipelineNode>> + Send + Sync>;

#[derive(Clone)]
pub struct NodeFactory {
    pub node_type: NodeType,
    pub type_name: String,
    constructor: NodeConstructor,
    keep_alive: Option<KeepAlive>,
}

impl NodeFactory {
    pub fn new<F>(node_type: impl Into<NodeType>, type_name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&str, &NodeConfig) -> RuntimeResult<Box<dyn PipelineNode>> + Send + Sync + 'static,
    {
        Self {
            node_type: node_type.into(),
            type_name: type_name.into(),
            constructor: Arc::new(constructor),
            keep_alive: None,
        }
    }

    pub(crate) fn with_keep_alive(mut self, token: KeepAlive) -> Self {
        self.keep_alive = Some(token);
        self
    }

    /// Run the constructor. Nodes built by a module's factory hold the module alive.
    pub fn create(&self, name: &str, config: &NodeConfig) -> RuntimeResult<Box<dyn PipelineNode>> {
        let node = (self.constructor)(name, config)?;
        Ok(match &self.keep_alive {
            Some(token) => Box::new(ModuleBoundNode {
                inner: node,
                _module: token.clone(),
            }),
            None => node,
        })
    }
}

impl fmt::Debug for NodeFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeFactory")
            .field("node_type", &self.node_type)
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// A node whose code lives in a loaded module.
struct ModuleBoundNode {
    // Dropped before `_module`.
    inner: Box<dyn PipelineNode>,
    _module: KeepAlive,
}

#[async_trait]
impl PipelineNode for ModuleBoundNode {
    async fn execute(
        &mut self,
        ctx: &ExecutionContext<'_>,
        inputs: &[Tensor],
    ) -> RuntimeResult<Vec<Tensor>> {
        self.inner.execute(ctx, inputs).await
    }

    fn validate(&self, config: &NodeConfig) -> RuntimeResult<()> {
        self.inner.validate(config)
    }

    fn cleanup(&mut self, outputs: Vec<Tensor>) {
        self.inner.cleanup(outputs)
    }

    fn destroy(&mut self) {
        self.inner.destroy()
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

/// At most one factory per node type.
#[derive(Debug, Default)]
pub struct NodeFactoryRegistry {
    factories: Vec<NodeFactory>,
}

impl NodeFactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_factory(&mut self, factory: NodeFactory) -> RuntimeResult<()> {
        if factory.node_type.as_str().is_empty() {
            return Err(RuntimeError::invalid("node type must not be empty"));
        }
        if self.contains(&factory.node_type) {
            return Err(RuntimeError::duplicate(
                "Node factory",
                factory.node_type.as_str(),
            ));
        }

        NodeFactoryRegistered {
            node_type: factory.node_type.as_str(),
            type_name: &factory.type_name,
        }
        .log();
        self.factories.push(factory);
        Ok(())
    }

    pub fn unregister_factory(&mut self, node_type: &NodeType) -> RuntimeResult<NodeFactory> {
        let position = self
            .factories
            .iter()
            .position(|factory| &factory.node_type == node_type)
            .ok_or_else(|| RuntimeError::not_found("Node factory", node_type.as_str()))?;
        Ok(self.factories.remove(position))
    }

    pub fn get(&self, node_type: &NodeType) -> Option<NodeFactory> {
        self.factories
            .iter()
            .find(|factory| &factory.node_type == node_type)
            .cloned()
    }

    pub fn contains(&self, node_type: &NodeType) -> bool {
        self.factories
            .iter()
            .any(|factory| &factory.node_type == node_type)
    }

    /// Registered `(type, human-readable name)` pairs in registration order.
    pub fn list(&self) -> Vec<(NodeType, String)> {
        self.factories
            .iter()
            .map(|factory| (factory.node_type.clone(), factory.type_name.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    pub fn clear(&mut self) {
        self.factories.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::stub::CountingNode;
    use crate::errors::ErrorKind;

    fn counting_factory(tag: &str) -> NodeFactory {
        NodeFactory::new(tag, "Counting node", |_name, _config| {
            Ok(Box::new(CountingNode::default()) as Box<dyn PipelineNode>)
        })
    }

    #[test]
    fn test_register_and_create() {
        let mut registry = NodeFactoryRegistry::new();
        registry.register_factory(counting_factory("count")).unwrap();

        let factory = registry.get(&NodeType::from("count")).unwrap();
        let node = factory.create("n1", &NodeConfig::default()).unwrap();
        assert_eq!(node.name(), "counting");
        assert_eq!(
            registry.list(),
            vec![(NodeType::from("count"), "Counting node".to_string())]
        );
    }

    #[test]
    fn test_one_factory_per_type() {
        let mut registry = NodeFactoryRegistry::new();
        registry.register_factory(counting_factory("count")).unwrap();

        let err = registry
            .register_factory(counting_factory("count"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateName);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_factory() {
        let mut registry = NodeFactoryRegistry::new();
        registry.register_factory(counting_factory("count")).unwrap();

        registry.unregister_factory(&NodeType::from("count")).unwrap();
        assert!(registry.get(&NodeType::from("count")).is_none());

        let err = registry
            .unregister_factory(&NodeType::from("count"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_keep_alive_travels_with_created_nodes() {
        let token: KeepAlive = Arc::new("module");
        let factory = counting_factory("count").with_keep_alive(token.clone());

        let node = factory.create("n1", &NodeConfig::default()).unwrap();
        assert_eq!(Arc::strong_count(&token), 3);
        drop(node);
        drop(factory);
        assert_eq!(Arc::strong_count(&token), 1);
    }
}
