//! Graphics FFI functions
//!
//! Handles and memory offsets arrive as `u32`, signed GL parameters as `i32`.
//! WASM has no boolean type, so flags are `u32` where non-zero means true.

use wasmtime::Caller;

use crate::gl::{GlBackend, TexImage2D};
use crate::handles::{Handle, NULL_HANDLE};
use crate::wasm::BridgeContext;
use crate::wasm::state::with_memory;

type Ctx<'a, G> = Caller<'a, BridgeContext<G>>;

// ============================================================================
// Context state
// ============================================================================

pub(super) fn viewport<G: GlBackend>(
    mut caller: Ctx<'_, G>,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
) {
    caller.data_mut().gl.viewport(x, y, width, height);
}

pub(super) fn active_texture<G: GlBackend>(mut caller: Ctx<'_, G>, texture: u32) {
    caller.data_mut().gl.active_texture(texture);
}

pub(super) fn clear<G: GlBackend>(mut caller: Ctx<'_, G>, mask: u32) {
    caller.data_mut().gl.clear(mask);
}

pub(super) fn clear_color<G: GlBackend>(
    mut caller: Ctx<'_, G>,
    red: f32,
    green: f32,
    blue: f32,
    alpha: f32,
) {
    caller.data_mut().gl.clear_color(red, green, blue, alpha);
}

pub(super) fn enable<G: GlBackend>(mut caller: Ctx<'_, G>, cap: u32) {
    caller.data_mut().gl.enable(cap);
}

pub(super) fn disable<G: GlBackend>(mut caller: Ctx<'_, G>, cap: u32) {
    caller.data_mut().gl.disable(cap);
}

pub(super) fn is_enabled<G: GlBackend>(mut caller: Ctx<'_, G>, cap: u32) -> u32 {
    caller.data_mut().gl.is_enabled(cap) as u32
}

pub(super) fn get_error<G: GlBackend>(mut caller: Ctx<'_, G>) -> u32 {
    caller.data_mut().gl.get_error()
}

// ============================================================================
// Buffers and vertex attributes
// ============================================================================

pub(super) fn create_buffer<G: GlBackend>(mut caller: Ctx<'_, G>) -> Handle {
    caller.data_mut().gl.create_buffer()
}

pub(super) fn delete_buffer<G: GlBackend>(mut caller: Ctx<'_, G>, buffer: Handle) {
    caller.data_mut().gl.delete_buffer(buffer);
}

pub(super) fn bind_buffer<G: GlBackend>(mut caller: Ctx<'_, G>, target: u32, buffer: Handle) {
    caller.data_mut().gl.bind_buffer(target, buffer);
}

pub(super) fn buffer_data<G: GlBackend>(
    mut caller: Ctx<'_, G>,
    target: u32,
    size: u32,
    data: u32,
    usage: u32,
) {
    with_memory(&mut caller, "glBufferData", |memory, ctx| {
        ctx.gl.buffer_data(memory, target, size, data, usage);
    });
}

pub(super) fn enable_vertex_attrib_array<G: GlBackend>(mut caller: Ctx<'_, G>, index: u32) {
    caller.data_mut().gl.enable_vertex_attrib_array(index);
}

pub(super) fn disable_vertex_attrib_array<G: GlBackend>(mut caller: Ctx<'_, G>, index: u32) {
    caller.data_mut().gl.disable_vertex_attrib_array(index);
}

pub(super) fn vertex_attrib_pointer<G: GlBackend>(
    mut caller: Ctx<'_, G>,
    index: u32,
    size: i32,
    attrib_type: u32,
    normalized: u32,
    stride: i32,
    offset: i32,
) {
    caller
        .data_mut()
        .gl
        .vertex_attrib_pointer(index, size, attrib_type, normalized != 0, stride, offset);
}

pub(super) fn draw_arrays<G: GlBackend>(mut caller: Ctx<'_, G>, mode: u32, first: i32, count: i32) {
    caller.data_mut().gl.draw_arrays(mode, first, count);
}

pub(super) fn draw_elements<G: GlBackend>(
    mut caller: Ctx<'_, G>,
    mode: u32,
    count: i32,
    element_type: u32,
    offset: i32,
) {
    caller.data_mut().gl.draw_elements(mode, count, element_type, offset);
}

// ============================================================================
// Shaders and programs
// ============================================================================

pub(super) fn create_shader<G: GlBackend>(mut caller: Ctx<'_, G>, shader_type: u32) -> Handle {
    caller.data_mut().gl.create_shader(shader_type)
}

pub(super) fn delete_shader<G: GlBackend>(mut caller: Ctx<'_, G>, shader: Handle) {
    caller.data_mut().gl.delete_shader(shader);
}

pub(super) fn shader_source<G: GlBackend>(mut caller: Ctx<'_, G>, shader: Handle, source: u32) {
    with_memory(&mut caller, "glShaderSource", |memory, ctx| {
        ctx.gl.shader_source(memory, shader, source);
    });
}

pub(super) fn compile_shader<G: GlBackend>(mut caller: Ctx<'_, G>, shader: Handle) {
    caller.data_mut().gl.compile_shader(shader);
}

/// Returns the scratch buffer address holding the log
pub(super) fn get_shader_info_log<G: GlBackend>(mut caller: Ctx<'_, G>, shader: Handle) -> u32 {
    with_memory(&mut caller, "glGetShaderInfoLog", |memory, ctx| {
        ctx.gl.shader_info_log(memory, shader)
    })
    .unwrap_or(0)
}

pub(super) fn create_program<G: GlBackend>(mut caller: Ctx<'_, G>) -> Handle {
    caller.data_mut().gl.create_program()
}

pub(super) fn delete_program<G: GlBackend>(mut caller: Ctx<'_, G>, program: Handle) {
    caller.data_mut().gl.delete_program(program);
}

pub(super) fn attach_shader<G: GlBackend>(mut caller: Ctx<'_, G>, program: Handle, shader: Handle) {
    caller.data_mut().gl.attach_shader(program, shader);
}

pub(super) fn bind_attrib_location<G: GlBackend>(
    mut caller: Ctx<'_, G>,
    program: Handle,
    index: u32,
    name: u32,
) {
    with_memory(&mut caller, "glBindAttribLocation", |memory, ctx| {
        ctx.gl.bind_attrib_location(memory, program, index, name);
    });
}

pub(super) fn link_program<G: GlBackend>(mut caller: Ctx<'_, G>, program: Handle) {
    caller.data_mut().gl.link_program(program);
}

pub(super) fn get_program_info_log<G: GlBackend>(mut caller: Ctx<'_, G>, program: Handle) -> u32 {
    with_memory(&mut caller, "glGetProgramInfoLog", |memory, ctx| {
        ctx.gl.program_info_log(memory, program)
    })
    .unwrap_or(0)
}

pub(super) fn use_program<G: GlBackend>(mut caller: Ctx<'_, G>, program: Handle) {
    caller.data_mut().gl.use_program(program);
}

// ============================================================================
// Uniforms
// ============================================================================

pub(super) fn get_uniform_location<G: GlBackend>(
    mut caller: Ctx<'_, G>,
    program: Handle,
    name: u32,
    name_len: u32,
) -> Handle {
    with_memory(&mut caller, "glGetUniformLocation", |memory, ctx| {
        ctx.gl.get_uniform_location(memory, program, name, name_len)
    })
    .unwrap_or(NULL_HANDLE)
}

pub(super) fn uniform_1i<G: GlBackend>(mut caller: Ctx<'_, G>, location: Handle, value: i32) {
    caller.data_mut().gl.uniform_1i(location, value);
}

pub(super) fn uniform_4fv<G: GlBackend>(
    mut caller: Ctx<'_, G>,
    location: Handle,
    count: u32,
    values: u32,
) {
    with_memory(&mut caller, "glUniform4fv", |memory, ctx| {
        ctx.gl.uniform_4fv(memory, location, count, values);
    });
}

pub(super) fn uniform_matrix_4fv<G: GlBackend>(
    mut caller: Ctx<'_, G>,
    location: Handle,
    count: u32,
    transpose: u32,
    values: u32,
) {
    with_memory(&mut caller, "glUniformMatrix4fv", |memory, ctx| {
        ctx.gl
            .uniform_matrix_4fv(memory, location, count, transpose != 0, values);
    });
}

// ============================================================================
// Textures
// ============================================================================

pub(super) fn create_texture<G: GlBackend>(mut caller: Ctx<'_, G>) -> Handle {
    caller.data_mut().gl.create_texture()
}

pub(super) fn delete_texture<G: GlBackend>(mut caller: Ctx<'_, G>, texture: Handle) {
    caller.data_mut().gl.delete_texture(texture);
}

pub(super) fn bind_texture<G: GlBackend>(mut caller: Ctx<'_, G>, target: u32, texture: Handle) {
    caller.data_mut().gl.bind_texture(target, texture);
}

#[allow(clippy::too_many_arguments)]
pub(super) fn tex_image_2d<G: GlBackend>(
    mut caller: Ctx<'_, G>,
    target: u32,
    level: i32,
    internal_format: i32,
    width: i32,
    height: i32,
    border: i32,
    format: u32,
    pixel_type: u32,
    pixels: u32,
    size: u32,
) {
    let image = TexImage2D {
        target,
        level,
        internal_format,
        width,
        height,
        border,
        format,
        pixel_type,
    };
    with_memory(&mut caller, "glTexImage2D", |memory, ctx| {
        ctx.gl.tex_image_2d(memory, image, pixels, size);
    });
}

pub(super) fn tex_parameteri<G: GlBackend>(
    mut caller: Ctx<'_, G>,
    target: u32,
    pname: u32,
    param: i32,
) {
    caller.data_mut().gl.tex_parameteri(target, pname, param);
}

pub(super) fn generate_mipmap<G: GlBackend>(mut caller: Ctx<'_, G>, target: u32) {
    caller.data_mut().gl.generate_mipmap(target);
}
