// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::Path;

use crate::errors::RuntimeResult;
use crate::loader::abi::ModuleInitContext;

/// Opens module files and resolves their entry points.
///
/// The loader owns all bookkeeping (capacity, naming, registration); a
/// backend only answers "does this file look like a module" and "give me its
/// entry points".
pub trait ModuleBackend: Send {
    type Module: LoadedModule + 'static;

    /// Cheap check that `path` is a library exporting the required symbols.
    /// Nothing from the file is kept.
    fn probe(&self, path: &Path) -> RuntimeResult<()>;

    /// Open `path` for real and resolve its entry points.
    fn open(&self, path: &Path) -> RuntimeResult<Self::Module>;
}

/// An opened module. Dropping it releases the underlying library.
pub trait LoadedModule: Send + Sync {
    fn abi_version(&self) -> u32;

    fn init(&self, ctx: &mut ModuleInitContext) -> i32;

    /// Run the optional registration hook; `None` when the module has none.
    fn register(&self, ctx: &mut ModuleInitContext) -> Option<i32>;
}
