//! Static WASM audit
//!
//! Checks a guest module against this host without instantiating it: which
//! `env` imports the bridge provides, which it does not, and which lifecycle
//! hooks and globals the module exports.
//!
//! # Example
//!
//! ```ignore
//! use glbridge_core::analysis::analyze_wasm;
//! use glbridge_core::wasm::ExportNames;
//!
//! let wasm_bytes = std::fs::read("scene.wasm")?;
//! let report = analyze_wasm(&wasm_bytes, &ExportNames::default())?;
//!
//! for name in &report.unsupported_imports {
//!     println!("missing host function: {name}");
//! }
//! ```

use hashbrown::HashMap;
use serde::Serialize;
use wasmparser::{ExternalKind, Operator, Parser, Payload, TypeRef};

use crate::ffi::{IMPORT_MODULE, is_supported_import};
use crate::wasm::ExportNames;

/// One lifecycle hook and whether the module exports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookStatus {
    /// Role of the hook (`init`, `tick`, ...)
    pub hook: &'static str,
    /// Export name looked up for it
    pub export: String,
    pub present: bool,
}

/// Result of auditing a guest module
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModuleReport {
    /// `env` function imports the bridge provides
    pub supported_imports: Vec<String>,
    /// `env` function imports the bridge does not provide; instantiation will fail
    pub unsupported_imports: Vec<String>,
    /// Imports from modules other than `env`, as `module::name`
    pub foreign_imports: Vec<String>,
    /// Every export name, in module order
    pub exports: Vec<String>,
    pub hooks: Vec<HookStatus>,
    pub exports_memory: bool,
    pub exports_scratch_buffer: bool,
    /// Static call sites per imported `env` function
    pub call_sites: HashMap<String, usize>,
}

impl ModuleReport {
    /// Whether the module can be instantiated by the bridge at all
    pub fn is_loadable(&self) -> bool {
        self.unsupported_imports.is_empty() && self.foreign_imports.is_empty()
    }

    /// Hooks the module does not export (they will run as no-ops)
    pub fn missing_hooks(&self) -> impl Iterator<Item = &HookStatus> {
        self.hooks.iter().filter(|status| !status.present)
    }

    /// Number of static call sites for an import
    pub fn call_count(&self, import: &str) -> usize {
        self.call_sites.get(import).copied().unwrap_or(0)
    }
}

/// Analysis error
#[derive(Debug, Clone, thiserror::Error)]
pub enum AnalysisError {
    /// WASM parsing error
    #[error("WASM parsing failed: {0}")]
    ParseError(String),
}

fn parse_error(error: impl std::fmt::Display) -> AnalysisError {
    AnalysisError::ParseError(error.to_string())
}

/// Audit a guest module's imports and exports
///
/// `exports` names the hooks and globals to look for.
pub fn analyze_wasm(
    wasm_bytes: &[u8],
    exports: &ExportNames,
) -> Result<ModuleReport, AnalysisError> {
    let mut report = ModuleReport::default();
    let mut env_funcs: HashMap<u32, String> = HashMap::new();
    let mut num_imported_funcs = 0u32;
    let mut export_kinds: HashMap<String, ExternalKind> = HashMap::new();

    // First pass: imports and exports
    let parser = Parser::new(0);
    for payload in parser.parse_all(wasm_bytes) {
        match payload.map_err(parse_error)? {
            Payload::ImportSection(reader) => {
                for import in reader {
                    let import = import.map_err(parse_error)?;
                    let is_func = matches!(import.ty, TypeRef::Func(_));

                    if import.module != IMPORT_MODULE {
                        report
                            .foreign_imports
                            .push(format!("{}::{}", import.module, import.name));
                    } else if is_func {
                        let name = import.name.to_string();
                        if is_supported_import(&name) {
                            report.supported_imports.push(name.clone());
                        } else {
                            report.unsupported_imports.push(name.clone());
                        }
                        env_funcs.insert(num_imported_funcs, name);
                    } else {
                        report.unsupported_imports.push(import.name.to_string());
                    }

                    if is_func {
                        num_imported_funcs += 1;
                    }
                }
            }
            Payload::ExportSection(reader) => {
                for export in reader {
                    let export = export.map_err(parse_error)?;
                    report.exports.push(export.name.to_string());
                    export_kinds.insert(export.name.to_string(), export.kind);
                }
            }
            _ => {}
        }
    }

    // Second pass: count call sites of imported functions
    let parser = Parser::new(0);
    for payload in parser.parse_all(wasm_bytes) {
        if let Payload::CodeSectionEntry(body) = payload.map_err(parse_error)? {
            let ops = body.get_operators_reader().map_err(parse_error)?;
            for op in ops {
                if let Operator::Call { function_index } = op.map_err(parse_error)?
                    && let Some(name) = env_funcs.get(&function_index)
                {
                    *report.call_sites.entry(name.clone()).or_insert(0) += 1;
                }
            }
        }
    }

    let has = |name: &str, kind: ExternalKind| export_kinds.get(name) == Some(&kind);
    report.exports_memory = has(&exports.memory, ExternalKind::Memory);
    report.exports_scratch_buffer = has(&exports.scratch_buffer, ExternalKind::Global);
    report.hooks = [
        ("init", &exports.init),
        ("destroy", &exports.destroy),
        ("apply_events", &exports.apply_events),
        ("tick", &exports.tick),
        ("draw", &exports.draw),
    ]
    .into_iter()
    .map(|(hook, export)| HookStatus {
        hook,
        export: export.clone(),
        present: has(export, ExternalKind::Func),
    })
    .collect();

    Ok(report)
}
