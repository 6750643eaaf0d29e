// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Structural validation of pipeline configurations.
//!
//! Checks run in three stages so that later stages can rely on earlier ones:
//!
//! 1. **Uniqueness**: the pipeline has a name and no two nodes share one
//! 2. **References**: every edge endpoint names a declared node
//! 3. **Cycles**: a depth-first search with a recursion stack over the
//!    enabled edges, reporting the first cycle path it finds
//!
//! Cycle detection only runs when the first two stages pass, and only for
//! pipelines with `strict_acyclic` set; a non-strict pipeline is allowed to
//! carry a cycle and skips it at run time.
//!
//! # Example
//! ```rust
//! use plugflow::config::{validate_pipeline_config, EdgeSpec, PipelineConfig};
//! use plugflow::errors::ValidationError;
//!
//! let config = PipelineConfig {
//!     name: "p".to_string(),
//!     options: Default::default(),
//!     nodes: vec![],
//!     edges: vec![EdgeSpec::new("a", "b")],
//! };
//!
//! let errors = validate_pipeline_config(&config).unwrap_err();
//! assert!(matches!(errors[0], ValidationError::UnresolvedNode { .. }));
//! ```

use std::collections::{HashMap, HashSet};

use crate::config::PipelineConfig;
use crate::errors::ValidationError;

/// Validate `config`, returning every problem found.
pub fn validate_pipeline_config(config: &PipelineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.name.trim().is_empty() {
        errors.push(ValidationError::MissingPipelineName);
    }
    errors.extend(duplicate_node_names(config));
    errors.extend(unresolved_edge_endpoints(config));

    if errors.is_empty() && config.options.strict_acyclic {
        if let Some(cycle) = find_cycle(config) {
            errors.push(ValidationError::CyclicDependency { cycle });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn duplicate_node_names(config: &PipelineConfig) -> Vec<ValidationError> {
    let mut seen = HashSet::new();
    config
        .nodes
        .iter()
        .filter(|node| !seen.insert(node.name.as_str()))
        .map(|node| ValidationError::DuplicateNodeName {
            node_name: node.name.clone(),
        })
        .collect()
}

fn unresolved_edge_endpoints(config: &PipelineConfig) -> Vec<ValidationError> {
    let names: HashSet<&str> = config.nodes.iter().map(|node| node.name.as_str()).collect();
    let mut errors = Vec::new();

    for edge in &config.edges {
        for endpoint in [&edge.from, &edge.to] {
            if !names.contains(endpoint.as_str()) {
                errors.push(ValidationError::UnresolvedNode {
                    edge: edge.label(),
                    missing_node: endpoint.clone(),
                });
            }
        }
    }
    errors
}

fn find_cycle(config: &PipelineConfig) -> Option<Vec<String>> {
    let mut graph: HashMap<&str, Vec<&str>> = config
        .nodes
        .iter()
        .map(|node| (node.name.as_str(), Vec::new()))
        .collect();
    for edge in config.edges.iter().filter(|edge| edge.enabled) {
        graph
            .entry(edge.from.as_str())
            .or_default()
            .push(edge.to.as_str());
    }

    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut path = Vec::new();

    // Declaration order keeps the reported cycle stable.
    for node in &config.nodes {
        let name = node.name.as_str();
        if !visited.contains(name) {
            if let Some(cycle) = dfs_cycle_detection(name, &graph, &mut visited, &mut rec_stack, &mut path) {
                return Some(cycle);
            }
        }
    }
    None
}

fn dfs_cycle_detection<'a>(
    node: &'a str,
    graph: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    rec_stack: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    visited.insert(node);
    rec_stack.insert(node);
    path.push(node);

    if let Some(neighbors) = graph.get(node) {
        for &neighbor in neighbors {
            if !visited.contains(neighbor) {
                if let Some(cycle) = dfs_cycle_detection(neighbor, graph, visited, rec_stack, path) {
                    return Some(cycle);
                }
            } else if rec_stack.contains(neighbor) {
                let start = path.iter().position(|&entry| entry == neighbor).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|s| s.to_string()).collect();
                cycle.push(neighbor.to_string());
                return Some(cycle);
            }
        }
    }

    rec_stack.remove(node);
    path.pop();
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EdgeSpec, NodeSpec};
    use crate::engine::{NodeConfig, PipelineOptions};
    use crate::traits::NodeType;

    fn node(name: &str) -> NodeSpec {
        NodeSpec {
            name: name.to_string(),
            node_type: NodeType::from("copy"),
            config: NodeConfig::default(),
        }
    }

    fn pipeline(nodes: &[&str], edges: Vec<EdgeSpec>) -> PipelineConfig {
        PipelineConfig {
            name: "test".to_string(),
            options: PipelineOptions::default(),
            nodes: nodes.iter().map(|n| node(n)).collect(),
            edges,
        }
    }

    #[test]
    fn test_valid_configs() {
        struct TestCase {
            name: &'static str,
            config: PipelineConfig,
        }

        let test_cases = vec![
            TestCase {
                name: "empty",
                config: pipeline(&[], vec![]),
            },
            TestCase {
                name: "single node",
                config: pipeline(&["a"], vec![]),
            },
            TestCase {
                name: "linear chain",
                config: pipeline(
                    &["a", "b", "c"],
                    vec![EdgeSpec::new("a", "b"), EdgeSpec::new("b", "c")],
                ),
            },
            TestCase {
                name: "diamond",
                config: pipeline(
                    &["a", "b", "c", "d"],
                    vec![
                        EdgeSpec::new("a", "b"),
                        EdgeSpec::new("a", "c"),
                        EdgeSpec::new("b", "d"),
                        EdgeSpec::new("c", "d"),
                    ],
                ),
            },
        ];

        for test_case in test_cases {
            assert!(
                validate_pipeline_config(&test_case.config).is_ok(),
                "Test case '{}'",
                test_case.name
            );
        }
    }

    #[test]
    fn test_duplicate_node_names() {
        let errors = validate_pipeline_config(&pipeline(&["a", "a"], vec![])).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::DuplicateNodeName {
                node_name: "a".to_string()
            }]
        );
    }

    #[test]
    fn test_missing_name_and_unresolved_reported_together() {
        let mut config = pipeline(&["a"], vec![EdgeSpec::new("a", "ghost")]);
        config.name = String::new();

        let errors = validate_pipeline_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0], ValidationError::MissingPipelineName);
        assert_eq!(
            errors[1],
            ValidationError::UnresolvedNode {
                edge: "a:0 -> ghost:0".to_string(),
                missing_node: "ghost".to_string()
            }
        );
    }

    #[test]
    fn test_simple_cycle() {
        let config = pipeline(
            &["a", "b"],
            vec![EdgeSpec::new("a", "b"), EdgeSpec::new("b", "a")],
        );
        let errors = validate_pipeline_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::CyclicDependency {
                cycle: vec!["a".to_string(), "b".to_string(), "a".to_string()]
            }]
        );
    }

    #[test]
    fn test_self_loop_cycle() {
        let config = pipeline(&["a"], vec![EdgeSpec::new("a", "a")]);
        let errors = validate_pipeline_config(&config).unwrap_err();
        assert!(matches!(&errors[0], ValidationError::CyclicDependency { cycle } if cycle.len() == 2));
    }

    #[test]
    fn test_cycle_through_disabled_edge_is_ignored() {
        let mut back = EdgeSpec::new("b", "a");
        back.enabled = false;
        let config = pipeline(&["a", "b"], vec![EdgeSpec::new("a", "b"), back]);
        assert!(validate_pipeline_config(&config).is_ok());
    }

    #[test]
    fn test_non_strict_pipeline_may_carry_a_cycle() {
        let mut config = pipeline(
            &["a", "b"],
            vec![EdgeSpec::new("a", "b"), EdgeSpec::new("b", "a")],
        );
        config.options.strict_acyclic = false;
        assert!(validate_pipeline_config(&config).is_ok());
    }
}
