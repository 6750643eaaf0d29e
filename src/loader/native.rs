// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Shared-library backend built on `libloading`.

use libloading::Library;
use std::path::Path;

use crate::errors::{RuntimeError, RuntimeResult};
use crate::loader::abi::{
    ModuleInitContext, ModuleInitFn, ModuleVersionFn, INIT_SYMBOL, REGISTER_SYMBOL,
    VERSION_SYMBOL,
};
use crate::loader::backend::{LoadedModule, ModuleBackend};

#[derive(Debug, Default, Clone, Copy)]
pub struct NativeBackend;

impl NativeBackend {
    pub fn new() -> Self {
        Self
    }
}

pub struct NativeModule {
    init: ModuleInitFn,
    abi_version: ModuleVersionFn,
    register: Option<ModuleInitFn>,
    // The function pointers above point into this library.
    _library: Library,
}

fn incompatible(path: &Path, reason: impl Into<String>) -> RuntimeError {
    RuntimeError::Incompatible {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}

/// Lazy, local binding: enough to look at the symbol table without running
/// relocations for the whole library.
#[cfg(unix)]
fn open_for_probe(path: &Path) -> Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_LAZY, RTLD_LOCAL};
    // SAFETY: loading a library runs its initializers; callers only point
    // this at files from configured plugin directories.
    unsafe { UnixLibrary::open(Some(path), RTLD_LAZY | RTLD_LOCAL) }.map(Library::from)
}

#[cfg(not(unix))]
fn open_for_probe(path: &Path) -> Result<Library, libloading::Error> {
    // SAFETY: see the unix variant.
    unsafe { Library::new(path) }
}

/// Immediate, global binding so the module's own dependencies resolve up front.
#[cfg(unix)]
fn open_for_load(path: &Path) -> Result<Library, libloading::Error> {
    use libloading::os::unix::{Library as UnixLibrary, RTLD_GLOBAL, RTLD_NOW};
    // SAFETY: see `open_for_probe`.
    unsafe { UnixLibrary::open(Some(path), RTLD_NOW | RTLD_GLOBAL) }.map(Library::from)
}

#[cfg(not(unix))]
fn open_for_load(path: &Path) -> Result<Library, libloading::Error> {
    // SAFETY: see `open_for_probe`.
    unsafe { Library::new(path) }
}

fn symbol_name(symbol: &[u8]) -> String {
    String::from_utf8_lossy(symbol.strip_suffix(b"\0").unwrap_or(symbol)).into_owned()
}

impl ModuleBackend for NativeBackend {
    type Module = NativeModule;

    fn probe(&self, path: &Path) -> RuntimeResult<()> {
        let library = open_for_probe(path)
            .map_err(|e| incompatible(path, format!("not a loadable library: {}", e)))?;

        for symbol in [INIT_SYMBOL, VERSION_SYMBOL] {
            // SAFETY: only presence is checked; the symbol is never called here.
            let found = unsafe { library.get::<*const ()>(symbol) }.is_ok();
            if !found {
                return Err(incompatible(
                    path,
                    format!("missing required symbol '{}'", symbol_name(symbol)),
                ));
            }
        }
        Ok(())
    }

    fn open(&self, path: &Path) -> RuntimeResult<NativeModule> {
        let library =
            open_for_load(path).map_err(|e| incompatible(path, format!("failed to load: {}", e)))?;

        // SAFETY: the signatures are fixed by the module ABI and checked
        // against ABI_VERSION before `init` is ever called.
        let (init, abi_version, register) = unsafe {
            let init: ModuleInitFn = *library.get::<ModuleInitFn>(INIT_SYMBOL).map_err(|e| {
                incompatible(path, format!("missing '{}': {}", symbol_name(INIT_SYMBOL), e))
            })?;
            let abi_version: ModuleVersionFn =
                *library.get::<ModuleVersionFn>(VERSION_SYMBOL).map_err(|e| {
                    incompatible(path, format!("missing '{}': {}", symbol_name(VERSION_SYMBOL), e))
                })?;
            let register = library
                .get::<ModuleInitFn>(REGISTER_SYMBOL)
                .ok()
                .map(|symbol| *symbol);
            (init, abi_version, register)
        };

        Ok(NativeModule {
            init,
            abi_version,
            register,
            _library: library,
        })
    }
}

impl LoadedModule for NativeModule {
    fn abi_version(&self) -> u32 {
        (self.abi_version)()
    }

    fn init(&self, ctx: &mut ModuleInitContext) -> i32 {
        (self.init)(ctx)
    }

    fn register(&self, ctx: &mut ModuleInitContext) -> Option<i32> {
        self.register.map(|register| register(ctx))
    }
}
