//! glbridge core - host a WASM guest written against a WebGL-style import surface
//!
//! The guest imports a flat, integer-only API (`glCreateBuffer`,
//! `glShaderSource`, `fetch_event`, ...) and exports lifecycle hooks. This
//! crate provides both sides of that boundary on wasmtime.
//!
//! # Architecture
//!
//! - [`handles`] - Integer handles standing in for host objects
//! - [`marshal`] - Reading strings and typed arrays out of guest memory
//! - [`input`] - Key map and the event queue the guest pulls from
//! - [`gl`] - [`GlBackend`] seam, [`GlBridge`] forwarding, [`RecordingGl`]
//! - [`wasm`] - [`WasmEngine`] and [`GuestInstance`]
//! - [`ffi`] - The `env` import functions
//! - [`runtime`] - [`FrameLoop`], scheduling strategies, [`HeadlessDriver`]
//! - [`config`] - [`BridgeConfig`] and its TOML file
//! - [`analysis`] - Static audit of a guest module

pub mod analysis;
pub mod config;
pub mod ffi;
pub mod gl;
pub mod handles;
pub mod input;
pub mod marshal;
pub mod runtime;
#[cfg(test)]
pub mod test_utils;
pub mod wasm;

pub use config::{BridgeConfig, ConfigError, InputConfig};
pub use gl::{ContextAttributes, GlBackend, GlBridge, GlCall, GlConfig, RecordingGl};
pub use handles::{Handle, HandleTable, NULL_HANDLE, ReusePolicy};
pub use input::{EventQueue, KeyEvent, KeyMap, KeyState};
pub use marshal::MarshalError;
pub use runtime::{
    FailurePolicy, FrameLoop, FrameStats, FrameStrategy, GuestHooks, HeadlessDriver, LoopState,
    RunSummary, RuntimeConfig, SchedulingMode,
};
pub use wasm::{BridgeContext, ExportNames, GuestInstance, WasmEngine};

// Re-export analysis types for pre-flight checks
pub use analysis::{AnalysisError, ModuleReport, analyze_wasm};
