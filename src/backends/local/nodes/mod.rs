// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod copy;
pub mod inference;
pub mod merge;
pub mod select;

pub use copy::*;
pub use inference::*;
pub use merge::*;
pub use select::*;

#[cfg(test)]
mod tests;
