// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use super::*;
use crate::backends::builtin::CpuDevice;
use crate::backends::local::factory::LocalNodeFactory;
use crate::engine::NodeConfig;
use crate::errors::ErrorKind;
use crate::registry::{CapabilityDescriptor, CapabilityKind, CapabilityRegistry, Provenance};
use crate::tensor::Tensor;
use crate::traits::{ExecutionContext, PipelineNode};
use serde_json::json;
use std::sync::{Arc, RwLock};

fn ctx() -> ExecutionContext<'static> {
    ExecutionContext {
        pipeline: "test",
        node: "node",
        position: 0,
        iteration: 1,
        attempt: 1,
    }
}

fn batch(values: &[&[f32]]) -> Vec<Tensor> {
    values
        .iter()
        .map(|v| Tensor::from_f32(vec![v.len()], v))
        .collect()
}

fn registry_with_cpu() -> Arc<RwLock<CapabilityRegistry>> {
    let mut registry = CapabilityRegistry::initialized();
    registry
        .register(
            CapabilityKind::Device,
            CapabilityDescriptor::device("cpu", "1.0.0", Arc::new(CpuDevice::new())),
            Provenance::BuiltIn,
        )
        .unwrap();
    Arc::new(RwLock::new(registry))
}

fn config(payload: serde_json::Value) -> NodeConfig {
    NodeConfig {
        payload,
        ..NodeConfig::default()
    }
}

#[tokio::test]
async fn test_copy_node() {
    let mut node = CopyNode::new();
    let inputs = batch(&[&[1.0, 2.0, 3.0]]);
    assert_eq!(node.execute(&ctx(), &inputs).await.unwrap(), inputs);
}

#[tokio::test]
async fn test_merge_node_keeps_order() {
    let mut node = MergeNode::new();
    let inputs = batch(&[&[1.0], &[2.0, 3.0]]);
    let merged = node.execute(&ctx(), &inputs).await.unwrap();
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[1].to_f32().unwrap(), vec![2.0, 3.0]);
}

#[tokio::test]
async fn test_select_node() {
    let mut node = SelectNode::from_config(&config(json!({ "index": 1 }))).unwrap();
    let inputs = batch(&[&[1.0], &[2.0]]);
    let selected = node.execute(&ctx(), &inputs).await.unwrap();
    assert_eq!(selected, vec![inputs[1].clone()]);

    let err = node.execute(&ctx(), &inputs[..1]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExecutionFailed);
}

#[test]
fn test_select_node_rejects_bad_index() {
    let err = SelectNode::from_config(&config(json!({ "index": "first" }))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(SelectNode::from_config(&NodeConfig::default()).unwrap().index(), 0);
}

#[tokio::test]
async fn test_inference_node_uses_registered_device() {
    let capabilities = registry_with_cpu();
    let mut node = InferenceNode::from_config(&NodeConfig::default(), capabilities).unwrap();
    assert_eq!(node.device(), DEFAULT_DEVICE);

    let inputs = batch(&[&[4.0, 5.0]]);
    assert_eq!(node.execute(&ctx(), &inputs).await.unwrap(), inputs);
}

#[tokio::test]
async fn test_inference_node_missing_device() {
    let capabilities = registry_with_cpu();
    let mut node =
        InferenceNode::from_config(&config(json!({ "device": "npu" })), capabilities).unwrap();
    let err = node.execute(&ctx(), &batch(&[&[1.0]])).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExecutionFailed);
}

#[tokio::test]
async fn test_nodes_via_factory() {
    let capabilities = registry_with_cpu();
    let inputs = batch(&[&[7.0]]);

    for node_type in LocalNodeFactory::list_available_implementations() {
        let mut node =
            LocalNodeFactory::create_node(node_type, &NodeConfig::default(), &capabilities)
                .unwrap();
        assert_eq!(node.name(), node_type);
        assert_eq!(
            node.execute(&ctx(), &inputs).await.unwrap(),
            inputs,
            "node type '{}'",
            node_type
        );
    }

    assert!(!LocalNodeFactory::is_implementation_available("reverse"));
    let err = LocalNodeFactory::create_node("reverse", &NodeConfig::default(), &capabilities)
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}
