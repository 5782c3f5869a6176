//! Tests for FFI functions

use super::*;
use crate::gl::consts::*;
use crate::gl::{GlCall, RecordingGl};
use crate::input::KeyState;
use crate::test_utils::{load_guest, recording_context};
use wasmtime::{Engine, Linker, Store};

// ============================================================================
// FFI Registration Tests
// ============================================================================

#[test]
fn test_register_bridge_ffi() {
    let engine = Engine::default();
    let mut linker: Linker<BridgeContext<RecordingGl>> = Linker::new(&engine);
    let result = register_bridge_ffi(&mut linker);
    assert!(result.is_ok());
}

#[test]
fn test_every_listed_import_is_registered() {
    let engine = Engine::default();
    let mut linker: Linker<BridgeContext<RecordingGl>> = Linker::new(&engine);
    register_bridge_ffi(&mut linker).unwrap();

    let mut store = Store::new(&engine, recording_context());
    for name in SYSTEM_IMPORTS.iter().chain(GL_IMPORTS) {
        assert!(
            linker.get(&mut store, IMPORT_MODULE, name).is_some(),
            "{name} not registered"
        );
    }
}

#[test]
fn test_is_supported_import() {
    assert!(is_supported_import("glDrawArrays"));
    assert!(is_supported_import("fetch_event"));
    assert!(!is_supported_import("glDrawBuffers"));
}

#[test]
fn test_ffi_with_wasm_module() {
    let engine = Engine::default();
    let mut linker: Linker<BridgeContext<RecordingGl>> = Linker::new(&engine);
    register_bridge_ffi(&mut linker).unwrap();

    let wat = r#"
        (module
            (import "env" "console_log" (func $log (param i32)))
            (import "env" "fetch_event" (func $fetch (param i32 i32) (result i32)))
            (import "env" "glCreateBuffer" (func $create_buffer (result i32)))
            (import "env" "glClearColor" (func $clear_color (param f32 f32 f32 f32)))
            (import "env" "glTexImage2D"
                (func $tex_image (param i32 i32 i32 i32 i32 i32 i32 i32 i32 i32)))
            (import "env" "glUniformMatrix4fv" (func $matrix (param i32 i32 i32 i32)))
            (memory (export "memory") 1)
        )
    "#;
    let wasm = wat::parse_str(wat).unwrap();
    let module = wasmtime::Module::new(&engine, wasm).unwrap();

    let mut store = Store::new(&engine, recording_context());
    let result = linker.instantiate(&mut store, &module);
    assert!(result.is_ok());
}

// ============================================================================
// Forwarding Through A Guest
// ============================================================================

#[test]
fn test_guest_buffer_upload() {
    let wat = r#"
        (module
            (import "env" "glCreateBuffer" (func $create (result i32)))
            (import "env" "glBindBuffer" (func $bind (param i32 i32)))
            (import "env" "glBufferData" (func $data (param i32 i32 i32 i32)))
            (memory (export "memory") 1)
            (data (i32.const 64) "\01\02\03\04\05\06")
            (func (export "c_init") (result i32)
                (local $buf i32)
                (local.set $buf (call $create))
                (call $bind (i32.const 0x8892) (local.get $buf))
                (call $data (i32.const 0x8892) (i32.const 4) (i32.const 66) (i32.const 0x88E4))
                (local.get $buf))
        )
    "#;
    let mut guest = load_guest(wat);
    assert!(guest.init().unwrap());

    let calls = guest.backend().calls();
    assert!(matches!(calls[0], GlCall::Viewport { width: 640, height: 480, .. }));
    assert_eq!(calls[1], GlCall::CreateBuffer { id: 1 });
    assert_eq!(
        calls[2],
        GlCall::BindBuffer {
            target: ARRAY_BUFFER,
            buffer: Some(1)
        }
    );
    assert_eq!(
        calls[3],
        GlCall::BufferData {
            target: ARRAY_BUFFER,
            data: vec![3, 4, 5, 6],
            usage: STATIC_DRAW
        }
    );
}

#[test]
fn test_guest_shader_pipeline() {
    let wat = r#"
        (module
            (import "env" "glCreateShader" (func $create_shader (param i32) (result i32)))
            (import "env" "glShaderSource" (func $source (param i32 i32)))
            (import "env" "glCompileShader" (func $compile (param i32)))
            (import "env" "glGetShaderInfoLog" (func $log (param i32) (result i32)))
            (import "env" "glCreateProgram" (func $create_program (result i32)))
            (import "env" "glAttachShader" (func $attach (param i32 i32)))
            (import "env" "glBindAttribLocation" (func $bind_attr (param i32 i32 i32)))
            (import "env" "glLinkProgram" (func $link (param i32)))
            (import "env" "glUseProgram" (func $use (param i32)))
            (memory (export "memory") 1)
            (global (export "retstr_buf") i32 (i32.const 2048))
            (data (i32.const 16) "void main() {}\00")
            (data (i32.const 64) "a_pos\00")
            (func (export "c_init") (result i32)
                (local $shader i32)
                (local $program i32)
                (local.set $shader (call $create_shader (i32.const 0x8B31)))
                (call $source (local.get $shader) (i32.const 16))
                (call $compile (local.get $shader))
                (i32.store (i32.const 0) (call $log (local.get $shader)))
                (local.set $program (call $create_program))
                (call $attach (local.get $program) (local.get $shader))
                (call $bind_attr (local.get $program) (i32.const 0) (i32.const 64))
                (call $link (local.get $program))
                (call $use (local.get $program))
                (i32.const 1))
        )
    "#;
    let mut guest = load_guest(wat);
    guest.backend_mut().set_shader_log(1, "ok");
    assert!(guest.init().unwrap());

    let calls = guest.backend().calls();
    assert!(calls.contains(&GlCall::ShaderSource {
        shader: Some(1),
        source: "void main() {}".into()
    }));
    assert!(calls.contains(&GlCall::BindAttribLocation {
        program: Some(2),
        index: 0,
        name: "a_pos".into()
    }));
    assert!(calls.contains(&GlCall::UseProgram { program: Some(2) }));

    let memory = guest.memory_snapshot().unwrap();
    assert_eq!(u32::from_le_bytes(memory[0..4].try_into().unwrap()), 2048);
    assert_eq!(&memory[2048..2051], b"ok\0");
}

#[test]
fn test_guest_uniforms() {
    let wat = r#"
        (module
            (import "env" "glCreateProgram" (func $create_program (result i32)))
            (import "env" "glGetUniformLocation" (func $loc (param i32 i32 i32) (result i32)))
            (import "env" "glUniform4fv" (func $u4 (param i32 i32 i32)))
            (import "env" "glUniformMatrix4fv" (func $m4 (param i32 i32 i32 i32)))
            (memory (export "memory") 1)
            (data (i32.const 8) "u_colorXXX")
            (func (export "c_init") (result i32)
                (local $program i32)
                (local $loc i32)
                (local.set $program (call $create_program))
                (local.set $loc (call $loc (local.get $program) (i32.const 8) (i32.const 7)))
                (f32.store (i32.const 256) (f32.const 0.5))
                (call $u4 (local.get $loc) (i32.const 1) (i32.const 256))
                (call $m4 (local.get $loc) (i32.const 1) (i32.const 1) (i32.const 512))
                (local.get $loc))
        )
    "#;
    let mut guest = load_guest(wat);
    assert!(guest.init().unwrap());

    let calls = guest.backend().calls();
    assert!(calls.iter().any(|call| matches!(
        call,
        GlCall::GetUniformLocation { name, location: Some(_), .. } if name == "u_color"
    )));
    assert!(calls.contains(&GlCall::Uniform4fv {
        location: Some(2),
        values: vec![0.5, 0.0, 0.0, 0.0]
    }));
    assert!(calls.contains(&GlCall::UniformMatrix4fv {
        location: Some(2),
        transpose: true,
        values: vec![0.0; 16]
    }));
}

#[test]
fn test_guest_is_enabled_returns_flag() {
    let wat = r#"
        (module
            (import "env" "glEnable" (func $enable (param i32)))
            (import "env" "glIsEnabled" (func $is_enabled (param i32) (result i32)))
            (memory (export "memory") 1)
            (func (export "c_init") (result i32)
                (call $enable (i32.const 0x0B71))
                (call $is_enabled (i32.const 0x0B71)))
        )
    "#;
    let mut guest = load_guest(wat);
    assert!(guest.init().unwrap());
    assert!(guest.backend().calls().contains(&GlCall::IsEnabled {
        cap: DEPTH_TEST,
        enabled: true
    }));
}

#[test]
fn test_guest_get_error_suppressed_while_drawing() {
    let wat = r#"
        (module
            (import "env" "glGetError" (func $get_error (result i32)))
            (memory (export "memory") 1)
            (func (export "c_drawScene") (result i32)
                (i32.store (i32.const 0) (call $get_error))
                (i32.const 1))
            (func (export "c_tickScene") (param f32) (result i32)
                (i32.store (i32.const 4) (call $get_error))
                (i32.const 1))
        )
    "#;
    let mut guest = load_guest(wat);
    guest.backend_mut().inject_error(INVALID_ENUM);

    assert!(guest.draw().unwrap());
    assert!(guest.tick(0.0).unwrap());

    let memory = guest.memory_snapshot().unwrap();
    assert_eq!(u32::from_le_bytes(memory[0..4].try_into().unwrap()), NO_ERROR);
    assert_eq!(u32::from_le_bytes(memory[4..8].try_into().unwrap()), INVALID_ENUM);
}

// ============================================================================
// System Functions
// ============================================================================

#[test]
fn test_fetch_event_delivers_one_event_per_tick() {
    let wat = r#"
        (module
            (import "env" "fetch_event" (func $fetch (param i32 i32) (result i32)))
            (memory (export "memory") 1)
            (func (export "c_applyEvents") (result i32)
                (i32.store (i32.const 0) (call $fetch (i32.const 64) (i32.const 32)))
                (i32.store (i32.const 4) (call $fetch (i32.const 96) (i32.const 32)))
                (i32.const 0))
        )
    "#;
    let mut guest = load_guest(wat);
    assert!(guest.push_key("Space", KeyState::Down));
    assert!(guest.push_key("KeyW", KeyState::Up));
    assert!(!guest.push_key("F13", KeyState::Down));

    assert!(guest.apply_events().unwrap());
    let memory = guest.memory_snapshot().unwrap();
    assert_eq!(u32::from_le_bytes(memory[0..4].try_into().unwrap()), 6);
    assert_eq!(&memory[64..70], b"KSPACE");
    // Budget of one event per tick
    assert_eq!(u32::from_le_bytes(memory[4..8].try_into().unwrap()), 0);

    assert!(guest.apply_events().unwrap());
    let memory = guest.memory_snapshot().unwrap();
    assert_eq!(u32::from_le_bytes(memory[0..4].try_into().unwrap()), 2);
    assert_eq!(&memory[64..66], b"kw");
}

#[test]
fn test_fetch_event_out_of_bounds_buffer_returns_zero() {
    let wat = r#"
        (module
            (import "env" "fetch_event" (func $fetch (param i32 i32) (result i32)))
            (memory (export "memory") 1)
            (func (export "c_applyEvents") (result i32)
                (i32.store (i32.const 0) (call $fetch (i32.const 65530) (i32.const 32)))
                (i32.const 0))
        )
    "#;
    let mut guest = load_guest(wat);
    guest.push_key("Space", KeyState::Down);
    assert!(guest.apply_events().unwrap());

    let memory = guest.memory_snapshot().unwrap();
    assert_eq!(u32::from_le_bytes(memory[0..4].try_into().unwrap()), 0);
    assert_eq!(guest.context().events.len(), 1);
}

#[test]
fn test_console_log_survives_unterminated_string() {
    let wat = r#"
        (module
            (import "env" "console_log" (func $log (param i32)))
            (memory (export "memory") 1)
            (data (i32.const 0) "hello\00")
            (func (export "c_init") (result i32)
                (call $log (i32.const 0))
                (call $log (i32.const 70000))
                (i32.const 1))
        )
    "#;
    let mut guest = load_guest(wat);
    assert!(guest.init().unwrap());
}
