// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Error type shared by the registry, the module loader and the pipeline engine.
//!
//! Every variant maps onto one [`ErrorKind`] so callers can branch on the
//! failure class without destructuring the payload.

use std::time::Duration;
use thiserror::Error;

/// Failure classes of the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    DuplicateName,
    NotFound,
    Incompatible,
    CapacityExceeded,
    MemoryAllocation,
    ExecutionFailed,
    CycleDetected,
    Timeout,
    Internal,
}

/// Errors returned by registry, loader and pipeline operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Malformed input, an uninitialized subsystem or an unknown kind/type.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A name is already taken within its namespace.
    #[error("{namespace} '{name}' is already registered")]
    DuplicateName { namespace: &'static str, name: String },

    /// A lookup missed.
    #[error("{namespace} '{name}' not found")]
    NotFound { namespace: &'static str, name: String },

    /// A module failed the compatibility probe.
    #[error("Incompatible module '{path}': {reason}")]
    Incompatible { path: String, reason: String },

    /// A bounded table is full.
    #[error("Capacity exceeded: {what} is limited to {limit} entries")]
    CapacityExceeded { what: &'static str, limit: usize },

    /// An allocation request could not be satisfied.
    #[error("Memory allocation failed: {0}")]
    MemoryAllocation(String),

    /// A node's `execute` reported failure.
    #[error("Node '{node}' failed: {reason}")]
    ExecutionFailed { node: String, reason: String },

    /// The enabled edges of a pipeline contain at least one cycle.
    #[error("Pipeline '{pipeline}' contains a cycle through: {}", .nodes.join(", "))]
    CycleDetected { pipeline: String, nodes: Vec<String> },

    /// A node did not finish within its configured timeout.
    #[error("Node '{node}' timed out after {timeout:?}")]
    Timeout { node: String, timeout: Duration },

    /// A shared lock was poisoned by a panicking holder.
    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    pub fn invalid(message: impl Into<String>) -> Self {
        RuntimeError::InvalidArgument(message.into())
    }

    pub fn duplicate(namespace: &'static str, name: impl Into<String>) -> Self {
        RuntimeError::DuplicateName {
            namespace,
            name: name.into(),
        }
    }

    pub fn not_found(namespace: &'static str, name: impl Into<String>) -> Self {
        RuntimeError::NotFound {
            namespace,
            name: name.into(),
        }
    }

    pub fn execution(node: impl Into<String>, reason: impl Into<String>) -> Self {
        RuntimeError::ExecutionFailed {
            node: node.into(),
            reason: reason.into(),
        }
    }

    /// The taxonomy class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            RuntimeError::DuplicateName { .. } => ErrorKind::DuplicateName,
            RuntimeError::NotFound { .. } => ErrorKind::NotFound,
            RuntimeError::Incompatible { .. } => ErrorKind::Incompatible,
            RuntimeError::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            RuntimeError::MemoryAllocation(_) => ErrorKind::MemoryAllocation,
            RuntimeError::ExecutionFailed { .. } => ErrorKind::ExecutionFailed,
            RuntimeError::CycleDetected { .. } => ErrorKind::CycleDetected,
            RuntimeError::Timeout { .. } => ErrorKind::Timeout,
            RuntimeError::LockPoisoned(_) | RuntimeError::Io(_) => ErrorKind::Internal,
        }
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let cases = vec![
            (RuntimeError::invalid("x"), ErrorKind::InvalidArgument),
            (RuntimeError::duplicate("Node", "n1"), ErrorKind::DuplicateName),
            (RuntimeError::not_found("Module", "m"), ErrorKind::NotFound),
            (RuntimeError::execution("n1", "boom"), ErrorKind::ExecutionFailed),
            (
                RuntimeError::CapacityExceeded {
                    what: "modules",
                    limit: 2,
                },
                ErrorKind::CapacityExceeded,
            ),
            (RuntimeError::LockPoisoned("capabilities"), ErrorKind::Internal),
        ];

        for (error, expected) in cases {
            assert_eq!(error.kind(), expected, "wrong kind for {}", error);
        }
    }

    #[test]
    fn test_display_messages() {
        let error = RuntimeError::duplicate("Node", "n1");
        assert_eq!(error.to_string(), "Node 'n1' is already registered");

        let error = RuntimeError::CycleDetected {
            pipeline: "p".into(),
            nodes: vec!["a".into(), "b".into()],
        };
        assert_eq!(error.to_string(), "Pipeline 'p' contains a cycle through: a, b");
    }
}
