// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod factory;
pub mod nodes;

pub use factory::LocalNodeFactory;
pub use nodes::*;
