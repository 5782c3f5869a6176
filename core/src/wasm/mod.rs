//! WASM runtime wrapper
//!
//! Provides abstractions over wasmtime for loading guest modules and calling
//! their lifecycle hooks.
//!
//! # Module Organization
//!
//! - [`state`] - Store data shared by all import functions
//!
//! # Key Types
//!
//! - [`WasmEngine`] - Shared WASM engine (one per process)
//! - [`GuestInstance`] - Loaded and instantiated guest
//! - [`BridgeContext`] - Memory, graphics and input state of one session

mod engine;
mod instance;
pub mod state;


pub use engine::{WASM_PAGE_SIZE, WasmEngine};
pub use instance::{ExportNames, GuestInstance};
pub use state::{BridgeContext, DEFAULT_RAM_LIMIT};
