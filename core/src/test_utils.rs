//! Shared test utilities for unit tests

use crate::config::BridgeConfig;
use crate::gl::{GlBridge, GlConfig, RecordingGl};
use crate::input::{EventQueue, KeyMap};
use crate::wasm::{BridgeContext, GuestInstance, WasmEngine};

// ============================================================================
// Contexts
// ============================================================================

/// Store data with a recording backend and default settings
pub fn recording_context() -> BridgeContext<RecordingGl> {
    BridgeContext::new(
        GlBridge::new(RecordingGl::default(), GlConfig::default()),
        EventQueue::default(),
        KeyMap::default(),
    )
}

// ============================================================================
// Guests
// ============================================================================

/// Instantiate a WAT guest against a recording backend with default config
pub fn load_guest(wat: &str) -> GuestInstance<RecordingGl> {
    load_guest_with(wat, &BridgeConfig::default())
}

/// Instantiate a WAT guest with an explicit config
pub fn load_guest_with(wat: &str, config: &BridgeConfig) -> GuestInstance<RecordingGl> {
    let engine = WasmEngine::new().expect("engine");
    let wasm = wat::parse_str(wat).expect("valid WAT");
    GuestInstance::load(&engine, &wasm, RecordingGl::new(config.context), config)
        .expect("guest instantiates")
}

/// Guest exporting memory, a scratch buffer and every hook, each returning
/// success without touching the host
pub const QUIET_GUEST: &str = r#"
    (module
        (memory (export "memory") 1)
        (global (export "retstr_buf") i32 (i32.const 1024))
        (global (export "retstr_buf_size") i32 (i32.const 256))
        (func (export "c_init") (result i32) (i32.const 1))
        (func (export "c_destroy"))
        (func (export "c_applyEvents") (result i32) (i32.const 0))
        (func (export "c_tickScene") (param f32) (result i32) (i32.const 1))
        (func (export "c_drawScene") (result i32) (i32.const 1))
    )
"#;
