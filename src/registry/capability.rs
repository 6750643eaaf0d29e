// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Multi-kind capability registry.
//!
//! Each [`CapabilityKind`] is an independent namespace holding its entries in
//! insertion order. A name is unique within its kind only, so a device and a
//! memory pool may both be called `cpu`.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::errors::{RuntimeError, RuntimeResult};
use crate::observability::messages::registry::{
    CapabilityRegistered, CapabilityUnregistered, RegistryShutdown,
};
use crate::observability::messages::StructuredLog;
use crate::registry::descriptor::{CapabilityDescriptor, CapabilityKind, Provenance};

/// Counters over the registry's live entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub total: usize,
    pub built_in: usize,
    pub plugin: usize,
    pub dynamic: usize,
    pub by_kind: BTreeMap<CapabilityKind, usize>,
    pub loaded_modules: usize,
}

#[derive(Default)]
pub struct CapabilityRegistry {
    initialized: bool,
    entries: HashMap<CapabilityKind, Vec<CapabilityDescriptor>>,
}

impl CapabilityRegistry {
    /// Create an uninitialized registry; call [`init`](Self::init) before use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry that is already initialized.
    pub fn initialized() -> Self {
        let mut registry = Self::new();
        registry.init();
        registry
    }

    /// Initialize the registry. Calling it twice is harmless.
    pub fn init(&mut self) {
        if !self.initialized {
            for kind in CapabilityKind::ALL {
                self.entries.entry(kind).or_default();
            }
            self.initialized = true;
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn ensure_initialized(&self) -> RuntimeResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(RuntimeError::invalid("capability registry is not initialized"))
        }
    }

    /// Register a capability under `kind`, stamping it with `provenance`.
    ///
    /// Fails with `DuplicateName` when the name is taken within the kind; the
    /// existing entry must be unregistered first.
    pub fn register(
        &mut self,
        kind: CapabilityKind,
        mut descriptor: CapabilityDescriptor,
        provenance: Provenance,
    ) -> RuntimeResult<()> {
        self.ensure_initialized()?;

        if descriptor.name.trim().is_empty() {
            return Err(RuntimeError::invalid("capability name must not be empty"));
        }
        if descriptor.kind() != kind {
            return Err(RuntimeError::invalid(format!(
                "capability '{}' is a {} but was registered as a {}",
                descriptor.name,
                descriptor.kind(),
                kind
            )));
        }
        if self.contains(kind, &descriptor.name) {
            return Err(RuntimeError::duplicate(kind.as_str(), descriptor.name));
        }

        descriptor.provenance = provenance;
        CapabilityRegistered {
            kind: kind.as_str(),
            name: &descriptor.name,
            version: &descriptor.version,
            provenance: &provenance.to_string(),
        }
        .log();

        self.entries.entry(kind).or_default().push(descriptor);
        Ok(())
    }

    /// Remove and return the entry `(kind, name)`.
    pub fn unregister(&mut self, kind: CapabilityKind, name: &str) -> RuntimeResult<CapabilityDescriptor> {
        self.ensure_initialized()?;

        let entries = self.entries.entry(kind).or_default();
        let position = entries
            .iter()
            .position(|entry| entry.name == name)
            .ok_or_else(|| RuntimeError::not_found(kind.as_str(), name))?;

        let removed = entries.remove(position);
        CapabilityUnregistered {
            kind: kind.as_str(),
            name,
        }
        .log();
        Ok(removed)
    }

    pub fn find(&self, kind: CapabilityKind, name: &str) -> Option<CapabilityDescriptor> {
        self.entries
            .get(&kind)?
            .iter()
            .find(|entry| entry.name == name)
            .cloned()
    }

    pub fn contains(&self, kind: CapabilityKind, name: &str) -> bool {
        self.entries
            .get(&kind)
            .is_some_and(|entries| entries.iter().any(|entry| entry.name == name))
    }

    /// Up to `limit` entries of `kind`, in registration order.
    pub fn list(&self, kind: CapabilityKind, limit: usize) -> Vec<CapabilityDescriptor> {
        self.entries
            .get(&kind)
            .map(|entries| entries.iter().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    /// Every entry across all kinds, grouped by kind.
    pub fn snapshot(&self) -> Vec<CapabilityDescriptor> {
        CapabilityKind::ALL
            .iter()
            .flat_map(|kind| self.list(*kind, usize::MAX))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entry counts. `loaded_modules` is left at zero; the runtime fills it in.
    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats::default();
        for (kind, entries) in &self.entries {
            stats.by_kind.insert(*kind, entries.len());
            for entry in entries {
                stats.total += 1;
                match entry.provenance {
                    Provenance::BuiltIn => stats.built_in += 1,
                    Provenance::Plugin => stats.plugin += 1,
                    Provenance::Dynamic => stats.dynamic += 1,
                }
            }
        }
        stats
    }

    /// Release every entry and return to the uninitialized state.
    ///
    /// Only the registry's references are dropped; the capability objects live
    /// on in any descriptor clones still held elsewhere.
    pub fn shutdown(&mut self) -> usize {
        let released = self.len();
        self.entries.clear();
        self.initialized = false;
        RegistryShutdown {
            released_entries: released,
        }
        .log();
        released
    }
}
