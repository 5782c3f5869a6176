//! Host functions imported by the guest
//!
//! Everything lives in the `env` module under the names a C guest built for
//! the browser imports. Graphics imports are thin wrappers that convert WASM
//! primitives and hand off to [`GlBridge`](crate::gl::GlBridge).

mod gl;
mod system;

#[cfg(test)]
mod tests;

use anyhow::Result;
use wasmtime::Linker;

use crate::gl::GlBackend;
use crate::wasm::BridgeContext;

/// Import module every host function is registered under
pub const IMPORT_MODULE: &str = "env";

/// Non-graphics imports
pub const SYSTEM_IMPORTS: &[&str] = &["console_log", "fetch_event"];

/// Graphics imports, in registration order
pub const GL_IMPORTS: &[&str] = &[
    "glActiveTexture",
    "glAttachShader",
    "glBindAttribLocation",
    "glBindBuffer",
    "glBindTexture",
    "glBufferData",
    "glClear",
    "glClearColor",
    "glCompileShader",
    "glCreateBuffer",
    "glCreateProgram",
    "glCreateShader",
    "glCreateTexture",
    "glDeleteBuffer",
    "glDeleteProgram",
    "glDeleteShader",
    "glDeleteTexture",
    "glDisable",
    "glDisableVertexAttribArray",
    "glDrawArrays",
    "glDrawElements",
    "glEnable",
    "glEnableVertexAttribArray",
    "glGenerateMipmap",
    "glGetError",
    "glGetProgramInfoLog",
    "glGetShaderInfoLog",
    "glGetUniformLocation",
    "glIsEnabled",
    "glLinkProgram",
    "glShaderSource",
    "glTexImage2D",
    "glTexParameteri",
    "glUseProgram",
    "glUniform1i",
    "glUniform4fv",
    "glUniformMatrix4fv",
    "glVertexAttribPointer",
    "glViewport",
];

/// Whether `name` is an import this host provides
pub fn is_supported_import(name: &str) -> bool {
    SYSTEM_IMPORTS.contains(&name) || GL_IMPORTS.contains(&name)
}

/// Register every bridge import with the linker
pub fn register_bridge_ffi<G: GlBackend>(linker: &mut Linker<BridgeContext<G>>) -> Result<()> {
    // System functions
    linker.func_wrap(IMPORT_MODULE, "console_log", system::console_log::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "fetch_event", system::fetch_event::<G>)?;

    // Context state
    linker.func_wrap(IMPORT_MODULE, "glViewport", gl::viewport::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glActiveTexture", gl::active_texture::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glClear", gl::clear::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glClearColor", gl::clear_color::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glEnable", gl::enable::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glDisable", gl::disable::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glIsEnabled", gl::is_enabled::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glGetError", gl::get_error::<G>)?;

    // Buffers and vertex attributes
    linker.func_wrap(IMPORT_MODULE, "glCreateBuffer", gl::create_buffer::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glDeleteBuffer", gl::delete_buffer::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glBindBuffer", gl::bind_buffer::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glBufferData", gl::buffer_data::<G>)?;
    linker.func_wrap(
        IMPORT_MODULE,
        "glEnableVertexAttribArray",
        gl::enable_vertex_attrib_array::<G>,
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        "glDisableVertexAttribArray",
        gl::disable_vertex_attrib_array::<G>,
    )?;
    linker.func_wrap(IMPORT_MODULE, "glVertexAttribPointer", gl::vertex_attrib_pointer::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glDrawArrays", gl::draw_arrays::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glDrawElements", gl::draw_elements::<G>)?;

    // Shaders and programs
    linker.func_wrap(IMPORT_MODULE, "glCreateShader", gl::create_shader::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glDeleteShader", gl::delete_shader::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glShaderSource", gl::shader_source::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glCompileShader", gl::compile_shader::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glGetShaderInfoLog", gl::get_shader_info_log::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glCreateProgram", gl::create_program::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glDeleteProgram", gl::delete_program::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glAttachShader", gl::attach_shader::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glBindAttribLocation", gl::bind_attrib_location::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glLinkProgram", gl::link_program::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glGetProgramInfoLog", gl::get_program_info_log::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glUseProgram", gl::use_program::<G>)?;

    // Uniforms
    linker.func_wrap(IMPORT_MODULE, "glGetUniformLocation", gl::get_uniform_location::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glUniform1i", gl::uniform_1i::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glUniform4fv", gl::uniform_4fv::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glUniformMatrix4fv", gl::uniform_matrix_4fv::<G>)?;

    // Textures
    linker.func_wrap(IMPORT_MODULE, "glCreateTexture", gl::create_texture::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glDeleteTexture", gl::delete_texture::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glBindTexture", gl::bind_texture::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glTexImage2D", gl::tex_image_2d::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glTexParameteri", gl::tex_parameteri::<G>)?;
    linker.func_wrap(IMPORT_MODULE, "glGenerateMipmap", gl::generate_mipmap::<G>)?;

    Ok(())
}
