// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Graph structure of a pipeline: edges, Kahn's ordering and the
//! introspection snapshot.

use serde::Serialize;

use crate::engine::node::NodeStats;
use crate::traits::NodeType;

/// Directed connection between two nodes of the same pipeline, by index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Edge {
    pub source: usize,
    pub source_slot: usize,
    pub target: usize,
    pub target_slot: usize,
    pub enabled: bool,
}

/// Result of running Kahn's algorithm over the enabled edges.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct KahnOrder {
    /// Every reachable node, dependencies first.
    pub order: Vec<usize>,
    /// The same nodes grouped by depth: level N depends only on levels below N.
    pub levels: Vec<Vec<usize>>,
    /// Nodes that never reached zero in-degree, i.e. on or behind a cycle.
    pub unreached: Vec<usize>,
}

impl KahnOrder {
    pub fn is_complete(&self) -> bool {
        self.unreached.is_empty()
    }
}

/// Compute a topological order of `node_count` nodes over the enabled `edges`.
///
/// Ties are broken by insertion order, so the result is deterministic. Nodes
/// caught in a cycle are reported in `unreached` rather than failing here;
/// the caller decides what a cycle means.
pub(crate) fn kahn_order(node_count: usize, edges: &[Edge]) -> KahnOrder {
    let mut in_degree = vec![0usize; node_count];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); node_count];
    for edge in edges.iter().filter(|edge| edge.enabled) {
        in_degree[edge.target] += 1;
        dependents[edge.source].push(edge.target);
    }

    let mut result = KahnOrder::default();
    let mut current: Vec<usize> = (0..node_count).filter(|&i| in_degree[i] == 0).collect();

    while !current.is_empty() {
        let mut next = Vec::new();
        for &node in &current {
            for &dependent in &dependents[node] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    next.push(dependent);
                }
            }
        }
        result.order.extend_from_slice(&current);
        result.levels.push(std::mem::replace(&mut current, next));
    }

    result.unreached = (0..node_count).filter(|&i| in_degree[i] > 0).collect();
    result
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeInfo {
    pub name: String,
    pub node_type: NodeType,
    pub enabled: bool,
    pub is_source: bool,
    pub is_sink: bool,
    pub in_degree: usize,
    pub out_degree: usize,
    pub stats: NodeStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeInfo {
    pub source: String,
    pub source_slot: usize,
    pub target: String,
    pub target_slot: usize,
}

/// Owned copy of a pipeline's shape. Disabled edges are left out.
#[derive(Debug, Clone, Serialize)]
pub struct TopologySnapshot {
    pub pipeline: String,
    pub nodes: Vec<NodeInfo>,
    pub edges: Vec<EdgeInfo>,
    /// Node names grouped by topological depth.
    pub levels: Vec<Vec<String>>,
    /// Nodes no topological order can reach.
    pub cyclic: Vec<String>,
}

impl TopologySnapshot {
    pub fn sources(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|node| node.is_source)
            .map(|node| node.name.as_str())
            .collect()
    }

    pub fn sinks(&self) -> Vec<&str> {
        self.nodes
            .iter()
            .filter(|node| node.is_sink)
            .map(|node| node.name.as_str())
            .collect()
    }

    pub fn node(&self, name: &str) -> Option<&NodeInfo> {
        self.nodes.iter().find(|node| node.name == name)
    }
}
