// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::tensor::Tensor;
use crate::traits::{NodeType, PipelineNode};

/// Per-node configuration block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// A disabled node forwards its inputs instead of executing.
    pub enabled: bool,
    pub timeout_ms: Option<u64>,
    /// Extra attempts after a failure. Zero defers to the pipeline's retry budget.
    pub retry_count: u32,
    pub priority: i32,
    pub tags: Vec<String>,
    /// Type-specific settings, interpreted by the node's factory.
    pub payload: Value,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: None,
            retry_count: 0,
            priority: 0,
            tags: Vec::new(),
            payload: Value::Null,
        }
    }
}

impl NodeConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_payload(payload: Value) -> Self {
        Self {
            payload,
            ..Self::default()
        }
    }
}

/// Cumulative counters for one node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NodeStats {
    pub executions: u64,
    pub successes: u64,
    pub errors: u64,
    pub total_time: Duration,
    pub last_time: Duration,
}

impl NodeStats {
    pub(crate) fn record(&mut self, elapsed: Duration, succeeded: bool) {
        self.executions += 1;
        if succeeded {
            self.successes += 1;
        } else {
            self.errors += 1;
        }
        self.total_time += elapsed;
        self.last_time = elapsed;
    }
}

/// A node as owned by its pipeline.
pub(crate) struct Node {
    pub name: String,
    pub node_type: NodeType,
    pub config: NodeConfig,
    pub implementation: Box<dyn PipelineNode>,
    /// Outputs held until the last consumer has read them.
    pub cache: Option<Vec<Tensor>>,
    pub stats: NodeStats,
}

impl Node {
    /// Hand cached outputs back to the node for release.
    pub fn release_cache(&mut self) {
        if let Some(outputs) = self.cache.take() {
            self.implementation.cleanup(outputs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_config_defaults_from_empty_yaml() {
        let config: NodeConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, NodeConfig::default());
        assert!(config.enabled);
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn test_node_config_payload_is_free_form() {
        let config: NodeConfig = serde_yaml::from_str(
            "timeout_ms: 250\nretry_count: 2\npayload:\n  index: 1\n  device: npu\n",
        )
        .unwrap();
        assert_eq!(config.timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.retry_count, 2);
        assert_eq!(config.payload["index"], 1);
        assert_eq!(config.payload["device"], "npu");
    }

    #[test]
    fn test_stats_record() {
        let mut stats = NodeStats::default();
        stats.record(Duration::from_millis(5), true);
        stats.record(Duration::from_millis(3), false);
        assert_eq!(stats.executions, 2);
        assert_eq!((stats.successes, stats.errors), (1, 1));
        assert_eq!(stats.total_time, Duration::from_millis(8));
        assert_eq!(stats.last_time, Duration::from_millis(3));
    }
}
