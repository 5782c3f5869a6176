//! WASM engine wrapper for loading and compiling guest modules

use anyhow::{Context, Result};
use wasmtime::{Engine, ExternType, Module};

/// WASM page size in bytes
pub const WASM_PAGE_SIZE: usize = 64 * 1024;

/// Shared WASM engine (one per process)
pub struct WasmEngine {
    engine: Engine,
}

impl WasmEngine {
    pub fn new() -> Result<Self> {
        let engine = Engine::default();
        Ok(Self { engine })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Compile a guest module from `.wasm` bytes (or WAT text)
    pub fn load_module(&self, bytes: &[u8]) -> Result<Module> {
        Module::new(&self.engine, bytes).context("Failed to compile guest module")
    }

    /// Check that the module's declared memory fits under `ram_limit`
    ///
    /// Catches oversized modules with a readable message before instantiation
    /// fails inside the resource limiter.
    pub fn validate_module_memory(module: &Module, ram_limit: usize) -> Result<()> {
        for export in module.exports() {
            if let ExternType::Memory(mem_type) = export.ty() {
                let min_pages = mem_type.minimum();
                let min_bytes = min_pages as usize * WASM_PAGE_SIZE;

                if min_bytes > ram_limit {
                    anyhow::bail!(
                        "Module memory '{}' needs {} bytes ({} pages) up front, \
                         but the host allows {} bytes",
                        export.name(),
                        min_bytes,
                        min_pages,
                        ram_limit
                    );
                }

                if mem_type.maximum().is_none() {
                    tracing::debug!(
                        "Module memory '{}' declares no maximum; host caps it at {} bytes",
                        export.name(),
                        ram_limit
                    );
                }
            }
        }
        Ok(())
    }
}
