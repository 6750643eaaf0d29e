// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Opaque tensor batches passed between pipeline nodes.
//!
//! The runtime never interprets tensor contents; it only moves them from
//! producers to consumers. The f32 helpers exist for built-in nodes, the CLI
//! and tests.

use serde::{Deserialize, Serialize};

/// Element type tag carried alongside the raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    F32,
    F16,
    I32,
    I8,
    U8,
}

impl DataType {
    pub fn size_of(&self) -> usize {
        match self {
            DataType::F32 | DataType::I32 => 4,
            DataType::F16 => 2,
            DataType::I8 | DataType::U8 => 1,
        }
    }
}

/// Where the tensor bytes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryLocation {
    #[default]
    Host,
    Device,
    Shared,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub dtype: DataType,
    pub location: MemoryLocation,
    pub data: Vec<u8>,
}

impl Tensor {
    pub fn new(shape: Vec<usize>, dtype: DataType, data: Vec<u8>) -> Self {
        Self {
            shape,
            dtype,
            location: MemoryLocation::Host,
            data,
        }
    }

    /// Build a host f32 tensor from values in native byte order.
    pub fn from_f32(shape: Vec<usize>, values: &[f32]) -> Self {
        let data = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
        Self::new(shape, DataType::F32, data)
    }

    /// Decode the bytes as f32 values, `None` for any other element type.
    pub fn to_f32(&self) -> Option<Vec<f32>> {
        if self.dtype != DataType::F32 || self.data.len() % 4 != 0 {
            return None;
        }
        Some(
            self.data
                .chunks_exact(4)
                .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect(),
        )
    }

    pub fn byte_size(&self) -> usize {
        self.data.len()
    }

    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Total byte size of a batch.
pub fn batch_bytes(batch: &[Tensor]) -> usize {
    batch.iter().map(Tensor::byte_size).sum()
}
