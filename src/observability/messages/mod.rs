// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message implements `Display` for the human-readable line and
//! [`StructuredLog`] to emit the same event with its fields attached.

use tracing::Span;

pub mod module;
pub mod pipeline;
pub mod registry;

/// Emit a message as a structured tracing event or open a span for it.
pub trait StructuredLog {
    /// Log the message at its natural level with structured fields.
    fn log(&self);

    /// Open a span carrying the message's fields.
    fn span(&self, name: &str) -> Span;
}
