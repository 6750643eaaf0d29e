// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Dynamic capability modules: the module ABI, the shared-library backend,
//! the loader and the startup autoloader.

pub mod abi;
pub mod autoload;
pub mod backend;
pub mod module_loader;
pub mod native;

pub use abi::{
    init_status, ModuleInitContext, ModuleInitFn, ModuleMetadata, ModuleVersionFn, ABI_VERSION,
    MODULE_INIT_FAILED, MODULE_OK,
};
pub use autoload::{search_paths, PLUGIN_PATH_ENV};
pub use backend::{LoadedModule, ModuleBackend};
pub use module_loader::{ModuleLoader, ModuleRecord, Registrar, ScanFailure, ScanReport};
pub use native::{NativeBackend, NativeModule};
