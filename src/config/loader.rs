// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::consts::{DEFAULT_MAX_MODULES, DEFAULT_MAX_NODES};
use crate::engine::{NodeConfig, PipelineOptions};
use crate::errors::ConfigError;
use crate::traits::NodeType;

/// Process-wide runtime settings.
///
/// # Example
/// ```yaml
/// max_modules: 16
/// max_nodes: 256
/// plugin_paths: ["/opt/plugflow/plugins"]
/// autoload: true
/// register_builtins: true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub max_modules: usize,
    pub max_nodes: usize,
    /// Replaces the environment/default search path when set.
    pub plugin_paths: Option<Vec<PathBuf>>,
    pub autoload: bool,
    pub register_builtins: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_modules: DEFAULT_MAX_MODULES,
            max_nodes: DEFAULT_MAX_NODES,
            plugin_paths: None,
            autoload: true,
            register_builtins: true,
        }
    }
}

/// Declarative description of a pipeline.
///
/// # Example
/// ```yaml
/// name: vision
/// options:
///   timeout_ms: 500
///   retry_budget: 1
/// nodes:
///   - name: pre
///     type: copy
///   - name: detect
///     type: inference
///     payload:
///       device: cpu
/// edges:
///   - from: pre
///     to: detect
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    #[serde(default)]
    pub options: PipelineOptions,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(flatten)]
    pub config: NodeConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub from: String,
    #[serde(default)]
    pub from_slot: usize,
    pub to: String,
    #[serde(default)]
    pub to_slot: usize,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl EdgeSpec {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            from_slot: 0,
            to: to.to_string(),
            to_slot: 0,
            enabled: true,
        }
    }

    /// `from:slot -> to:slot`, used in validation messages.
    pub fn label(&self) -> String {
        format!("{}:{} -> {}:{}", self.from, self.from_slot, self.to, self.to_slot)
    }
}

enum Format {
    Yaml,
    Toml,
}

fn format_of(path: &Path) -> Result<Format, ConfigError> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => Ok(Format::Yaml),
        Some("toml") => Ok(Format::Toml),
        other => Err(ConfigError::UnsupportedFormat(
            other.unwrap_or_default().to_string(),
        )),
    }
}

/// Read and deserialize a YAML or TOML file, chosen by extension.
pub fn load_file<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T, ConfigError> {
    let path = path.as_ref();
    let format = format_of(path)?;
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    match format {
        Format::Yaml => Ok(serde_yaml::from_str(&content)?),
        Format::Toml => Ok(toml::from_str(&content)?),
    }
}

pub fn load_runtime_config<P: AsRef<Path>>(path: P) -> Result<RuntimeConfig, ConfigError> {
    load_file(path)
}

pub fn load_pipeline_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig, ConfigError> {
    load_file(path)
}

pub fn load_and_validate_pipeline<P: AsRef<Path>>(path: P) -> Result<PipelineConfig, ConfigError> {
    let cfg = load_pipeline_config(path)?;
    crate::config::validate_pipeline_config(&cfg).map_err(ConfigError::Validation)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn parse_basic_pipeline() {
        let yaml = r#"
name: vision
options:
  timeout_ms: 500
nodes:
  - name: pre
    type: copy
  - name: pick
    type: select
    retry_count: 2
    tags: [hot]
    payload:
      index: 1
edges:
  - from: pre
    to: pick
    to_slot: 1
"#;

        let cfg: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.name, "vision");
        assert_eq!(cfg.options.timeout(), Some(Duration::from_millis(500)));
        assert!(cfg.options.strict_acyclic);
        assert_eq!(cfg.nodes.len(), 2);
        assert_eq!(cfg.nodes[1].node_type, NodeType::from("select"));
        assert_eq!(cfg.nodes[1].config.retry_count, 2);
        assert_eq!(cfg.nodes[1].config.payload["index"], 1);
        assert_eq!(cfg.nodes[1].config.tags, vec!["hot"]);
        assert!(cfg.nodes[0].config.enabled);
        assert_eq!(cfg.edges[0].to_slot, 1);
        assert!(cfg.edges[0].enabled);
    }

    #[test]
    fn parse_runtime_config_defaults() {
        let cfg: RuntimeConfig = serde_yaml::from_str("max_modules: 4").unwrap();
        assert_eq!(cfg.max_modules, 4);
        assert_eq!(cfg.max_nodes, DEFAULT_MAX_NODES);
        assert!(cfg.autoload);
        assert!(cfg.plugin_paths.is_none());
    }

    #[test]
    fn test_load_by_extension() {
        let dir = TempDir::new().unwrap();

        let yaml_path = dir.path().join("runtime.yml");
        fs::write(&yaml_path, "max_nodes: 8\nautoload: false\n").unwrap();
        let cfg = load_runtime_config(&yaml_path).unwrap();
        assert_eq!(cfg.max_nodes, 8);
        assert!(!cfg.autoload);

        let toml_path = dir.path().join("runtime.toml");
        fs::write(&toml_path, "max_modules = 2\nplugin_paths = [\"/opt/p\"]\n").unwrap();
        let cfg = load_runtime_config(&toml_path).unwrap();
        assert_eq!(cfg.max_modules, 2);
        assert_eq!(cfg.plugin_paths, Some(vec![PathBuf::from("/opt/p")]));

        let json_path = dir.path().join("runtime.json");
        fs::write(&json_path, "{}").unwrap();
        assert!(matches!(
            load_runtime_config(&json_path),
            Err(ConfigError::UnsupportedFormat(ext)) if ext == "json"
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = load_pipeline_config(dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_and_validate_rejects_unknown_edge_target() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pipeline.yaml");
        fs::write(
            &path,
            "name: p\nnodes:\n  - name: a\n    type: copy\nedges:\n  - from: a\n    to: ghost\n",
        )
        .unwrap();

        match load_and_validate_pipeline(&path) {
            Err(ConfigError::Validation(errors)) => assert_eq!(errors.len(), 1),
            other => panic!("expected validation failure, got {:?}", other),
        }
    }
}
