// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for capability registry and node factory events.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Capability added to the registry.
///
/// # Log Level
/// `debug!` - Frequent during startup
///
/// # Example
/// ```
/// use plugflow::observability::messages::registry::CapabilityRegistered;
///
/// let msg = CapabilityRegistered {
///     kind: "device",
///     name: "cpu",
///     version: "1.0.0",
///     provenance: "built-in",
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct CapabilityRegistered<'a> {
    pub kind: &'a str,
    pub name: &'a str,
    pub version: &'a str,
    pub provenance: &'a str,
}

impl Display for CapabilityRegistered<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Registered {} capability '{}' v{} ({})",
            self.kind, self.name, self.version, self.provenance
        )
    }
}

impl StructuredLog for CapabilityRegistered<'_> {
    fn log(&self) {
        tracing::debug!(
            kind = self.kind,
            name = self.name,
            version = self.version,
            provenance = self.provenance,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "capability_registered",
            span_name = name,
            kind = self.kind,
            name = self.name,
        )
    }
}

/// Capability removed from the registry.
pub struct CapabilityUnregistered<'a> {
    pub kind: &'a str,
    pub name: &'a str,
}

impl Display for CapabilityUnregistered<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Unregistered {} capability '{}'", self.kind, self.name)
    }
}

impl StructuredLog for CapabilityUnregistered<'_> {
    fn log(&self) {
        tracing::debug!(kind = self.kind, name = self.name, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "capability_unregistered",
            span_name = name,
            kind = self.kind,
            name = self.name,
        )
    }
}

/// Registry torn down.
///
/// # Log Level
/// `info!` - Lifecycle event
pub struct RegistryShutdown {
    pub released_entries: usize,
}

impl Display for RegistryShutdown {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Capability registry shut down, released {} entries",
            self.released_entries
        )
    }
}

impl StructuredLog for RegistryShutdown {
    fn log(&self) {
        tracing::info!(released_entries = self.released_entries, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "registry_shutdown",
            span_name = name,
            released_entries = self.released_entries,
        )
    }
}

/// Node factory registered for a node type.
pub struct NodeFactoryRegistered<'a> {
    pub node_type: &'a str,
    pub type_name: &'a str,
}

impl Display for NodeFactoryRegistered<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Registered node factory '{}' ({})",
            self.node_type, self.type_name
        )
    }
}

impl StructuredLog for NodeFactoryRegistered<'_> {
    fn log(&self) {
        tracing::debug!(
            node_type = self.node_type,
            type_name = self.type_name,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "node_factory_registered",
            span_name = name,
            node_type = self.node_type,
        )
    }
}
