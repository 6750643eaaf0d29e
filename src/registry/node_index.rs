// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Global index of pipeline nodes across all pipelines.
//!
//! Node instances stay owned by their pipeline; the index only records
//! enough about each node (owner, type, priority, tags) to answer discovery
//! queries. Node names are unique across the whole index.

use serde::Serialize;
use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use crate::errors::{RuntimeError, RuntimeResult};
use crate::traits::NodeType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeRecord {
    pub name: String,
    pub pipeline: String,
    pub node_type: NodeType,
    pub priority: i32,
    pub tags: BTreeSet<String>,
}

/// Conjunctive filter for [`NodeIndex::find_nodes`]. Unset criteria match everything.
#[derive(Debug, Clone, Default)]
pub struct NodeCriteria {
    pub node_type: Option<NodeType>,
    /// `*` matches all names, `prefix*` matches by prefix, anything else is exact.
    pub name_pattern: Option<String>,
    pub tag: Option<String>,
    pub priority: Option<RangeInclusive<i32>>,
}

impl NodeCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_type(mut self, node_type: impl Into<NodeType>) -> Self {
        self.node_type = Some(node_type.into());
        self
    }

    pub fn name_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.name_pattern = Some(pattern.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn priority(mut self, range: RangeInclusive<i32>) -> Self {
        self.priority = Some(range);
        self
    }

    pub fn matches(&self, record: &NodeRecord) -> bool {
        if let Some(node_type) = &self.node_type {
            if &record.node_type != node_type {
                return false;
            }
        }
        if let Some(pattern) = &self.name_pattern {
            if !pattern_matches(pattern, &record.name) {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !record.tags.contains(tag) {
                return false;
            }
        }
        if let Some(range) = &self.priority {
            if !range.contains(&record.priority) {
                return false;
            }
        }
        true
    }
}

fn pattern_matches(pattern: &str, name: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(prefix),
        None => pattern == name,
    }
}

#[derive(Debug)]
pub struct NodeIndex {
    max_nodes: usize,
    nodes: Vec<NodeRecord>,
}

impl NodeIndex {
    pub fn new(max_nodes: usize) -> Self {
        Self {
            max_nodes,
            nodes: Vec::new(),
        }
    }

    pub fn insert(&mut self, record: NodeRecord) -> RuntimeResult<()> {
        if self.get(&record.name).is_some() {
            return Err(RuntimeError::duplicate("Node", record.name));
        }
        if self.nodes.len() >= self.max_nodes {
            return Err(RuntimeError::CapacityExceeded {
                what: "global node index",
                limit: self.max_nodes,
            });
        }
        self.nodes.push(record);
        Ok(())
    }

    /// Remove `name` if it belongs to `pipeline`.
    pub fn remove(&mut self, pipeline: &str, name: &str) -> Option<NodeRecord> {
        let position = self
            .nodes
            .iter()
            .position(|record| record.name == name && record.pipeline == pipeline)?;
        Some(self.nodes.remove(position))
    }

    /// Drop every record owned by `pipeline`, returning how many went.
    pub fn remove_pipeline(&mut self, pipeline: &str) -> usize {
        let before = self.nodes.len();
        self.nodes.retain(|record| record.pipeline != pipeline);
        before - self.nodes.len()
    }

    pub fn get(&self, name: &str) -> Option<&NodeRecord> {
        self.nodes.iter().find(|record| record.name == name)
    }

    pub fn tag_node(&mut self, name: &str, tag: impl Into<String>) -> RuntimeResult<()> {
        let record = self
            .nodes
            .iter_mut()
            .find(|record| record.name == name)
            .ok_or_else(|| RuntimeError::not_found("Node", name))?;
        record.tags.insert(tag.into());
        Ok(())
    }

    pub fn find_nodes(&self, criteria: &NodeCriteria) -> Vec<NodeRecord> {
        self.nodes
            .iter()
            .filter(|record| criteria.matches(record))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}
