// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::Instrument;

use crate::config::{validate_pipeline_config, PipelineConfig};
use crate::engine::node::{Node, NodeConfig, NodeStats};
use crate::engine::topology::{kahn_order, Edge, EdgeInfo, KahnOrder, NodeInfo, TopologySnapshot};
use crate::errors::{ConfigError, RuntimeError, RuntimeResult};
use crate::loader::ModuleBackend;
use crate::observability::messages::pipeline::{
    CyclicNodesSkipped, NodeExecuted, NodeRetrying, PipelineRunCompleted, PipelineRunFailed,
    PipelineRunStarted,
};
use crate::observability::messages::StructuredLog;
use crate::registry::{CapabilityKind, NodeRecord};
use crate::runtime::{read_lock, write_lock, Runtime, SharedRegistries};
use crate::tensor::Tensor;
use crate::traits::{ExecutionContext, NodeType};

/// Pipeline-wide execution options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Applies to nodes without their own timeout.
    pub timeout_ms: Option<u64>,
    /// Retries for nodes whose `retry_count` is zero.
    pub retry_budget: u32,
    /// Recorded for callers; nodes still execute one at a time.
    pub parallel: bool,
    /// Refuse to run a graph with a cycle instead of skipping the cyclic part.
    pub strict_acyclic: bool,
    /// Device used by the empty-graph passthrough.
    pub device: Option<String>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            retry_budget: 0,
            parallel: false,
            strict_acyclic: true,
            device: None,
        }
    }
}

impl PipelineOptions {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub invocations: u64,
    pub successes: u64,
    pub failures: u64,
    pub total_time: Duration,
}

/// A named DAG of nodes executed in topological order.
///
/// Nodes are created through the runtime's node factories and are owned
/// exclusively by their pipeline. Each node is also listed in the runtime's
/// global node index for discovery; dropping the pipeline destroys its nodes
/// and removes them from the index.
///
/// A pipeline is not meant to be run concurrently with itself; `run` takes
/// `&mut self`, which the borrow checker enforces.
pub struct Pipeline {
    name: String,
    options: PipelineOptions,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    stats: PipelineStats,
    shared: SharedRegistries,
}

impl Pipeline {
    pub(crate) fn new(name: impl Into<String>, options: PipelineOptions, shared: SharedRegistries) -> Self {
        Self {
            name: name.into(),
            options,
            nodes: Vec::new(),
            edges: Vec::new(),
            stats: PipelineStats::default(),
            shared,
        }
    }

    /// Validate `config` and build it through `runtime`'s node factories.
    ///
    /// Validation problems are reported together as one `InvalidArgument`.
    /// On any later failure the partially built pipeline is dropped, which
    /// takes its nodes back out of the global index.
    pub fn from_config<B: ModuleBackend>(runtime: &Runtime<B>, config: &PipelineConfig) -> RuntimeResult<Self> {
        validate_pipeline_config(config)
            .map_err(|errors| RuntimeError::invalid(ConfigError::Validation(errors).to_string()))?;

        let mut pipeline = runtime.create_pipeline(config.name.clone(), config.options.clone());
        for node in &config.nodes {
            pipeline.add_node(node.node_type.clone(), &node.name, node.config.clone())?;
        }
        for edge in &config.edges {
            pipeline.push_edge(&edge.from, edge.from_slot, &edge.to, edge.to_slot, edge.enabled)?;
        }
        Ok(pipeline)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.iter().map(|node| node.name.as_str()).collect()
    }

    pub fn contains_node(&self, name: &str) -> bool {
        self.position_of(name).is_some()
    }

    fn position_of(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|node| node.name == name)
    }

    fn require_node(&self, name: &str) -> RuntimeResult<usize> {
        self.position_of(name)
            .ok_or_else(|| RuntimeError::not_found("Node", name))
    }

    /// Create a node of `node_type` through its registered factory and add it.
    ///
    /// The node is listed in the global index as part of the add; if that
    /// fails the freshly created node is destroyed and nothing is kept.
    pub fn add_node(
        &mut self,
        node_type: impl Into<NodeType>,
        name: &str,
        config: NodeConfig,
    ) -> RuntimeResult<()> {
        let node_type = node_type.into();
        if name.trim().is_empty() {
            return Err(RuntimeError::invalid("node name must not be empty"));
        }
        if self.contains_node(name) {
            return Err(RuntimeError::duplicate("Node", name));
        }

        let factory = read_lock(&self.shared.factories, "node factory registry")?
            .get(&node_type)
            .ok_or_else(|| {
                RuntimeError::invalid(format!("unsupported node type '{}'", node_type))
            })?;

        let mut implementation = factory.create(name, &config)?;
        if let Err(error) = implementation.validate(&config) {
            implementation.destroy();
            return Err(error);
        }

        let record = NodeRecord {
            name: name.to_string(),
            pipeline: self.name.clone(),
            node_type: node_type.clone(),
            priority: config.priority,
            tags: config.tags.iter().cloned().collect::<BTreeSet<_>>(),
        };
        let indexed = write_lock(&self.shared.node_index, "node index")
            .and_then(|mut index| index.insert(record));
        if let Err(error) = indexed {
            implementation.destroy();
            return Err(error);
        }

        tracing::debug!(
            pipeline = %self.name,
            node = name,
            node_type = %node_type,
            "Added node"
        );
        self.nodes.push(Node {
            name: name.to_string(),
            node_type,
            config,
            implementation,
            cache: None,
            stats: NodeStats::default(),
        });
        Ok(())
    }

    /// Connect output `source_slot` of `source` to input `target_slot` of `target`.
    ///
    /// Cycles are not checked here; they surface when the pipeline runs.
    pub fn connect(
        &mut self,
        source: &str,
        source_slot: usize,
        target: &str,
        target_slot: usize,
    ) -> RuntimeResult<()> {
        self.push_edge(source, source_slot, target, target_slot, true)
    }

    fn push_edge(
        &mut self,
        source: &str,
        source_slot: usize,
        target: &str,
        target_slot: usize,
        enabled: bool,
    ) -> RuntimeResult<()> {
        let edge = Edge {
            source: self.require_node(source)?,
            source_slot,
            target: self.require_node(target)?,
            target_slot,
            enabled,
        };
        if self.edges.iter().any(|existing| {
            existing.source == edge.source
                && existing.source_slot == edge.source_slot
                && existing.target == edge.target
                && existing.target_slot == edge.target_slot
        }) {
            return Err(RuntimeError::duplicate(
                "Edge",
                format!("{}:{} -> {}:{}", source, source_slot, target, target_slot),
            ));
        }
        self.edges.push(edge);
        Ok(())
    }

    /// Enable or disable every edge from `source` to `target`.
    pub fn set_edge_enabled(&mut self, source: &str, target: &str, enabled: bool) -> RuntimeResult<()> {
        let source_index = self.require_node(source)?;
        let target_index = self.require_node(target)?;

        let mut matched = false;
        for edge in self
            .edges
            .iter_mut()
            .filter(|edge| edge.source == source_index && edge.target == target_index)
        {
            edge.enabled = enabled;
            matched = true;
        }
        if matched {
            Ok(())
        } else {
            Err(RuntimeError::not_found(
                "Edge",
                format!("{} -> {}", source, target),
            ))
        }
    }

    /// Add `tag` to one of this pipeline's nodes in the global index.
    pub fn tag_node(&self, name: &str, tag: &str) -> RuntimeResult<()> {
        self.require_node(name)?;
        write_lock(&self.shared.node_index, "node index")?.tag_node(name, tag)
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn node_stats(&self, name: &str) -> Option<NodeStats> {
        self.nodes
            .iter()
            .find(|node| node.name == name)
            .map(|node| node.stats)
    }

    /// Execute the graph once on `inputs`.
    ///
    /// An empty pipeline passes its inputs straight through (optionally via
    /// `options.device`). Otherwise nodes run in topological order and the
    /// outputs of the last sink reached are returned. The first node failure
    /// aborts the run; cached intermediate outputs are released either way.
    pub async fn run(&mut self, inputs: &[Tensor]) -> RuntimeResult<Vec<Tensor>> {
        self.stats.invocations += 1;
        let iteration = self.stats.invocations;

        let started_msg = PipelineRunStarted {
            pipeline: &self.name,
            node_count: self.nodes.len(),
            iteration,
        };
        let span = started_msg.span("pipeline_run");
        started_msg.log();

        let started = Instant::now();
        let result = if self.nodes.is_empty() {
            self.passthrough(inputs).map(|outputs| (outputs, 0))
        } else {
            self.run_graph(inputs, iteration).instrument(span).await
        };
        let elapsed = started.elapsed();
        self.stats.total_time += elapsed;

        match result {
            Ok((outputs, executed_nodes)) => {
                self.stats.successes += 1;
                PipelineRunCompleted {
                    pipeline: &self.name,
                    executed_nodes,
                    duration: elapsed,
                }
                .log();
                Ok(outputs)
            }
            Err(error) => {
                self.stats.failures += 1;
                PipelineRunFailed {
                    pipeline: &self.name,
                    error: &error,
                }
                .log();
                Err(error)
            }
        }
    }

    fn passthrough(&self, inputs: &[Tensor]) -> RuntimeResult<Vec<Tensor>> {
        let Some(device_name) = &self.options.device else {
            return Ok(inputs.to_vec());
        };
        let device = read_lock(&self.shared.capabilities, "capability registry")?
            .find(CapabilityKind::Device, device_name)
            .and_then(|descriptor| descriptor.as_device())
            .ok_or_else(|| RuntimeError::not_found("device", device_name.clone()))?;
        device.infer(inputs)
    }

    fn names_of(&self, indices: &[usize]) -> Vec<String> {
        indices
            .iter()
            .map(|&index| self.nodes[index].name.clone())
            .collect()
    }

    fn execution_plan(&self) -> RuntimeResult<KahnOrder> {
        let plan = kahn_order(self.nodes.len(), &self.edges);
        if !plan.is_complete() {
            let cyclic = self.names_of(&plan.unreached);
            if self.options.strict_acyclic {
                return Err(RuntimeError::CycleDetected {
                    pipeline: self.name.clone(),
                    nodes: cyclic,
                });
            }
            CyclicNodesSkipped {
                pipeline: &self.name,
                nodes: &cyclic,
            }
            .log();
        }
        Ok(plan)
    }

    /// Returns the final outputs and how many nodes were visited.
    async fn run_graph(&mut self, inputs: &[Tensor], iteration: u64) -> RuntimeResult<(Vec<Tensor>, usize)> {
        let plan = self.execution_plan()?;

        let mut pending_consumers = vec![0usize; self.nodes.len()];
        for edge in self.edges.iter().filter(|edge| edge.enabled) {
            pending_consumers[edge.source] += 1;
        }
        let mut final_outputs: Option<(usize, Vec<Tensor>)> = None;

        for (position, &index) in plan.order.iter().enumerate() {
            let outcome = match self.gather_inputs(index, inputs) {
                Ok(node_inputs) => {
                    execute_node(
                        &self.name,
                        &self.options,
                        &mut self.nodes[index],
                        position,
                        iteration,
                        node_inputs,
                    )
                    .await
                }
                Err(error) => {
                    self.nodes[index].stats.record(Duration::ZERO, false);
                    Err(error)
                }
            };

            let outputs = match outcome {
                Ok(outputs) => outputs,
                Err(error) => {
                    self.release_final(final_outputs.take());
                    self.release_caches();
                    return Err(error);
                }
            };

            // Producers whose every consumer has now run can let go of their outputs.
            let mut drained = Vec::new();
            for edge in self.edges.iter().filter(|edge| edge.enabled && edge.target == index) {
                pending_consumers[edge.source] -= 1;
                if pending_consumers[edge.source] == 0 {
                    drained.push(edge.source);
                }
            }
            for source in drained {
                self.nodes[source].release_cache();
            }

            if pending_consumers[index] == 0 {
                let previous = final_outputs.replace((index, outputs));
                self.release_final(previous);
            } else {
                self.nodes[index].cache = Some(outputs);
            }
        }

        // Anything still cached fed only nodes that never ran.
        self.release_caches();
        let outputs = final_outputs.map(|(_, outputs)| outputs).unwrap_or_default();
        Ok((outputs, plan.order.len()))
    }

    /// Inputs for `index`: its predecessors' outputs ordered by destination
    /// slot, or the pipeline inputs when it has no enabled incoming edge.
    fn gather_inputs(&self, index: usize, pipeline_inputs: &[Tensor]) -> RuntimeResult<Vec<Tensor>> {
        let mut incoming: Vec<&Edge> = self
            .edges
            .iter()
            .filter(|edge| edge.enabled && edge.target == index)
            .collect();
        if incoming.is_empty() {
            return Ok(pipeline_inputs.to_vec());
        }
        incoming.sort_by_key(|edge| edge.target_slot);

        let target = &self.nodes[index].name;
        incoming
            .into_iter()
            .map(|edge| {
                let source = &self.nodes[edge.source];
                let cached = source.cache.as_ref().ok_or_else(|| {
                    RuntimeError::execution(
                        target.clone(),
                        format!("outputs of '{}' are not available", source.name),
                    )
                })?;
                cached.get(edge.source_slot).cloned().ok_or_else(|| {
                    RuntimeError::execution(
                        target.clone(),
                        format!(
                            "'{}' has no output slot {} (it produced {})",
                            source.name,
                            edge.source_slot,
                            cached.len()
                        ),
                    )
                })
            })
            .collect()
    }

    fn release_final(&mut self, outputs: Option<(usize, Vec<Tensor>)>) {
        if let Some((index, outputs)) = outputs {
            self.nodes[index].implementation.cleanup(outputs);
        }
    }

    fn release_caches(&mut self) {
        for node in &mut self.nodes {
            node.release_cache();
        }
    }

    /// Snapshot of nodes, enabled edges, depth levels and any cyclic nodes.
    pub fn query_topology(&self) -> TopologySnapshot {
        let mut in_degree = vec![0usize; self.nodes.len()];
        let mut out_degree = vec![0usize; self.nodes.len()];
        let mut edges = Vec::new();
        for edge in self.edges.iter().filter(|edge| edge.enabled) {
            in_degree[edge.target] += 1;
            out_degree[edge.source] += 1;
            edges.push(EdgeInfo {
                source: self.nodes[edge.source].name.clone(),
                source_slot: edge.source_slot,
                target: self.nodes[edge.target].name.clone(),
                target_slot: edge.target_slot,
            });
        }

        let nodes = self
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| NodeInfo {
                name: node.name.clone(),
                node_type: node.node_type.clone(),
                enabled: node.config.enabled,
                is_source: in_degree[index] == 0,
                is_sink: out_degree[index] == 0,
                in_degree: in_degree[index],
                out_degree: out_degree[index],
                stats: node.stats,
            })
            .collect();

        let plan = kahn_order(self.nodes.len(), &self.edges);
        TopologySnapshot {
            pipeline: self.name.clone(),
            nodes,
            edges,
            levels: plan
                .levels
                .iter()
                .map(|level| self.names_of(level))
                .collect(),
            cyclic: self.names_of(&plan.unreached),
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        for node in &mut self.nodes {
            node.release_cache();
            node.implementation.destroy();
        }
        // Names must be freed even if another holder panicked.
        let mut index = self.shared.node_index.write().unwrap_or_else(|poisoned| {
            tracing::warn!(pipeline = %self.name, "Node index lock poisoned, de-indexing anyway");
            poisoned.into_inner()
        });
        for node in &self.nodes {
            index.remove(&self.name, &node.name);
        }
    }
}

/// Node errors other than timeouts are reported as execution failures of that node.
fn as_execution_failure(node: &str, error: RuntimeError) -> RuntimeError {
    match error {
        RuntimeError::ExecutionFailed { .. } | RuntimeError::Timeout { .. } => error,
        other => RuntimeError::execution(node, other.to_string()),
    }
}

/// Visit one node: forward inputs if disabled, otherwise execute with the
/// effective timeout and retry budget and record the outcome.
async fn execute_node(
    pipeline: &str,
    options: &PipelineOptions,
    node: &mut Node,
    position: usize,
    iteration: u64,
    inputs: Vec<Tensor>,
) -> RuntimeResult<Vec<Tensor>> {
    if !node.config.enabled {
        tracing::debug!(pipeline, node = %node.name, "Node disabled, forwarding inputs");
        return Ok(inputs);
    }

    let retries = if node.config.retry_count > 0 {
        node.config.retry_count
    } else {
        options.retry_budget
    };
    let max_attempts = retries.saturating_add(1);
    let timeout = node.config.timeout().or_else(|| options.timeout());

    let started = Instant::now();
    let mut attempt = 1;
    let result = loop {
        let ctx = ExecutionContext {
            pipeline,
            node: &node.name,
            position,
            iteration,
            attempt,
        };
        let outcome = match timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, node.implementation.execute(&ctx, &inputs)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(RuntimeError::Timeout {
                        node: node.name.clone(),
                        timeout: limit,
                    }),
                }
            }
            None => node.implementation.execute(&ctx, &inputs).await,
        };

        match outcome.map_err(|error| as_execution_failure(&node.name, error)) {
            Ok(outputs) => break Ok(outputs),
            Err(error) if attempt < max_attempts => {
                NodeRetrying {
                    node: &node.name,
                    attempt,
                    max_attempts,
                    error: &error,
                }
                .log();
                attempt += 1;
            }
            Err(error) => break Err(error),
        }
    };

    let elapsed = started.elapsed();
    node.stats.record(elapsed, result.is_ok());
    if let Ok(outputs) = &result {
        NodeExecuted {
            node: &node.name,
            position,
            output_count: outputs.len(),
            duration: elapsed,
        }
        .log();
    }
    result
}
