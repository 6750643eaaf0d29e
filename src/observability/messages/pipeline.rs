// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for pipeline runs and node execution events.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// Pipeline run started.
///
/// # Log Level
/// `debug!` - Emitted once per run
///
/// # Example
/// ```
/// use plugflow::observability::messages::pipeline::PipelineRunStarted;
///
/// let msg = PipelineRunStarted {
///     pipeline: "detector",
///     node_count: 3,
///     iteration: 1,
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct PipelineRunStarted<'a> {
    pub pipeline: &'a str,
    pub node_count: usize,
    pub iteration: u64,
}

impl Display for PipelineRunStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Running pipeline '{}' (iteration {}, {} nodes)",
            self.pipeline, self.iteration, self.node_count
        )
    }
}

impl StructuredLog for PipelineRunStarted<'_> {
    fn log(&self) {
        tracing::debug!(
            pipeline = self.pipeline,
            node_count = self.node_count,
            iteration = self.iteration,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "pipeline_run",
            span_name = name,
            pipeline = self.pipeline,
            iteration = self.iteration,
        )
    }
}

/// Pipeline run finished successfully.
pub struct PipelineRunCompleted<'a> {
    pub pipeline: &'a str,
    pub executed_nodes: usize,
    pub duration: Duration,
}

impl Display for PipelineRunCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Pipeline '{}' completed: {} nodes in {:?}",
            self.pipeline, self.executed_nodes, self.duration
        )
    }
}

impl StructuredLog for PipelineRunCompleted<'_> {
    fn log(&self) {
        tracing::info!(
            pipeline = self.pipeline,
            executed_nodes = self.executed_nodes,
            duration_us = self.duration.as_micros() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "pipeline_completed",
            span_name = name,
            pipeline = self.pipeline,
            duration = ?self.duration,
        )
    }
}

/// Pipeline run aborted.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct PipelineRunFailed<'a> {
    pub pipeline: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for PipelineRunFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Pipeline '{}' failed: {}", self.pipeline, self.error)
    }
}

impl StructuredLog for PipelineRunFailed<'_> {
    fn log(&self) {
        tracing::error!(pipeline = self.pipeline, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("pipeline_failed", span_name = name, pipeline = self.pipeline)
    }
}

/// Node attempt failed and will be retried.
pub struct NodeRetrying<'a> {
    pub node: &'a str,
    pub attempt: u32,
    pub max_attempts: u32,
    pub error: &'a dyn std::error::Error,
}

impl Display for NodeRetrying<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' attempt {}/{} failed, retrying: {}",
            self.node, self.attempt, self.max_attempts, self.error
        )
    }
}

impl StructuredLog for NodeRetrying<'_> {
    fn log(&self) {
        tracing::warn!(
            node = self.node,
            attempt = self.attempt,
            max_attempts = self.max_attempts,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("node_retry", span_name = name, node = self.node)
    }
}

/// Node executed.
pub struct NodeExecuted<'a> {
    pub node: &'a str,
    pub position: usize,
    pub output_count: usize,
    pub duration: Duration,
}

impl Display for NodeExecuted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' (#{}) produced {} tensors in {:?}",
            self.node, self.position, self.output_count, self.duration
        )
    }
}

impl StructuredLog for NodeExecuted<'_> {
    fn log(&self) {
        tracing::trace!(
            node = self.node,
            position = self.position,
            output_count = self.output_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "node",
            span_name = name,
            node = self.node,
            position = self.position,
        )
    }
}

/// Cyclic nodes dropped from a non-strict run.
///
/// # Log Level
/// `warn!` - Part of the graph did not execute
pub struct CyclicNodesSkipped<'a> {
    pub pipeline: &'a str,
    pub nodes: &'a [String],
}

impl Display for CyclicNodesSkipped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Pipeline '{}' skipped {} nodes on a cycle: {}",
            self.pipeline,
            self.nodes.len(),
            self.nodes.join(", ")
        )
    }
}

impl StructuredLog for CyclicNodesSkipped<'_> {
    fn log(&self) {
        tracing::warn!(pipeline = self.pipeline, skipped = self.nodes.len(), "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("cycle_skipped", span_name = name, pipeline = self.pipeline)
    }
}
