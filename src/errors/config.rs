// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use thiserror::Error;

/// Errors that can occur during pipeline graph validation
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A circular dependency was detected among the enabled edges
    CyclicDependency {
        /// The cycle path showing the circular dependency
        cycle: Vec<String>,
    },
    /// An edge references a node that is not declared
    UnresolvedNode {
        /// The edge endpoint that references the missing node
        edge: String,
        /// The node name that couldn't be resolved
        missing_node: String,
    },
    /// Two nodes share a name
    DuplicateNodeName {
        /// The duplicate node name
        node_name: String,
    },
    /// The pipeline has no name
    MissingPipelineName,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::CyclicDependency { cycle } => {
                write!(f, "Cyclic dependency detected: {}", cycle.join(" -> "))
            }
            ValidationError::UnresolvedNode { edge, missing_node } => {
                write!(
                    f,
                    "Edge {} references node '{}' which does not exist",
                    edge, missing_node
                )
            }
            ValidationError::DuplicateNodeName { node_name } => {
                write!(f, "Duplicate node name: '{}'", node_name)
            }
            ValidationError::MissingPipelineName => write!(f, "Pipeline name must not be empty"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors raised while reading runtime and pipeline configuration files.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Unsupported config format '{0}' (expected .yaml, .yml or .toml)")]
    UnsupportedFormat(String),

    #[error("Pipeline validation failed: {}", render_validation(.0))]
    Validation(Vec<ValidationError>),
}

fn render_validation(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
