//! Graphics forwarding
//!
//! The guest speaks a flat, WebGL-1-shaped API in integers: object handles,
//! memory offsets and element counts. [`GlBridge`] turns those into resolved
//! objects and memory views and makes exactly one call into a [`GlBackend`].
//!
//! # Key Types
//!
//! - [`GlBackend`] - The native rendering API seam
//! - [`GlBridge`] - Per-session graphics state (backend, handle table, error policy)
//! - [`RecordingGl`] - Headless backend that records every call

mod bridge;
pub mod consts;
mod recording;


use serde::{Deserialize, Serialize};

use crate::handles::ReusePolicy;
use crate::marshal::DEFAULT_SCAN_LIMIT;

pub use bridge::{GlBridge, ScratchBuffer};
pub use recording::{GlCall, RecordingGl};

/// Parameters of a `texImage2D` call, minus the pixel data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TexImage2D {
    pub target: u32,
    pub level: i32,
    pub internal_format: i32,
    pub width: i32,
    pub height: i32,
    pub border: i32,
    pub format: u32,
    pub pixel_type: u32,
}

/// The native rendering API
///
/// Object-typed arguments are `None` when the guest passed the null handle
/// (or a handle that does not resolve), which WebGL treats as "no object".
pub trait GlBackend: 'static {
    type Buffer;
    type Program;
    type Shader;
    type Texture;
    type UniformLocation;

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32);
    fn active_texture(&mut self, texture: u32);
    fn attach_shader(&mut self, program: Option<&Self::Program>, shader: Option<&Self::Shader>);
    fn bind_attrib_location(&mut self, program: Option<&Self::Program>, index: u32, name: &str);
    fn bind_buffer(&mut self, target: u32, buffer: Option<&Self::Buffer>);
    fn bind_texture(&mut self, target: u32, texture: Option<&Self::Texture>);
    fn buffer_data(&mut self, target: u32, data: &[u8], usage: u32);
    fn clear(&mut self, mask: u32);
    fn clear_color(&mut self, red: f32, green: f32, blue: f32, alpha: f32);
    fn compile_shader(&mut self, shader: Option<&Self::Shader>);

    /// Creation calls return `None` when the context cannot allocate (e.g. it was lost)
    fn create_buffer(&mut self) -> Option<Self::Buffer>;
    fn create_program(&mut self) -> Option<Self::Program>;
    fn create_shader(&mut self, shader_type: u32) -> Option<Self::Shader>;
    fn create_texture(&mut self) -> Option<Self::Texture>;

    fn delete_buffer(&mut self, buffer: Self::Buffer);
    fn delete_program(&mut self, program: Self::Program);
    fn delete_shader(&mut self, shader: Self::Shader);
    fn delete_texture(&mut self, texture: Self::Texture);

    fn disable(&mut self, cap: u32);
    fn disable_vertex_attrib_array(&mut self, index: u32);
    fn draw_arrays(&mut self, mode: u32, first: i32, count: i32);
    fn draw_elements(&mut self, mode: u32, count: i32, element_type: u32, offset: i32);
    fn enable(&mut self, cap: u32);
    fn enable_vertex_attrib_array(&mut self, index: u32);
    fn generate_mipmap(&mut self, target: u32);
    fn get_error(&mut self) -> u32;
    fn get_program_info_log(&mut self, program: Option<&Self::Program>) -> Option<String>;
    fn get_shader_info_log(&mut self, shader: Option<&Self::Shader>) -> Option<String>;
    fn get_uniform_location(
        &mut self,
        program: Option<&Self::Program>,
        name: &str,
    ) -> Option<Self::UniformLocation>;
    fn is_enabled(&mut self, cap: u32) -> bool;
    fn link_program(&mut self, program: Option<&Self::Program>);
    fn shader_source(&mut self, shader: Option<&Self::Shader>, source: &str);
    fn tex_image_2d(&mut self, image: TexImage2D, pixels: Option<&[u8]>);
    fn tex_parameteri(&mut self, target: u32, pname: u32, param: i32);
    fn use_program(&mut self, program: Option<&Self::Program>);
    fn uniform_1i(&mut self, location: Option<&Self::UniformLocation>, value: i32);
    fn uniform_4fv(&mut self, location: Option<&Self::UniformLocation>, values: &[f32]);
    fn uniform_matrix_4fv(
        &mut self,
        location: Option<&Self::UniformLocation>,
        transpose: bool,
        values: &[f32],
    );
    fn vertex_attrib_pointer(
        &mut self,
        index: u32,
        size: i32,
        attrib_type: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    );
}

/// Kind of object stored behind a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Buffer,
    Program,
    Shader,
    Texture,
    UniformLocation,
}

/// A host graphics object owned by the handle table
pub enum GlObject<G: GlBackend> {
    Buffer(G::Buffer),
    Program(G::Program),
    Shader(G::Shader),
    Texture(G::Texture),
    UniformLocation(G::UniformLocation),
}

impl<G: GlBackend> GlObject<G> {
    pub fn kind(&self) -> ObjectKind {
        match self {
            GlObject::Buffer(_) => ObjectKind::Buffer,
            GlObject::Program(_) => ObjectKind::Program,
            GlObject::Shader(_) => ObjectKind::Shader,
            GlObject::Texture(_) => ObjectKind::Texture,
            GlObject::UniformLocation(_) => ObjectKind::UniformLocation,
        }
    }

    pub fn as_buffer(&self) -> Option<&G::Buffer> {
        match self {
            GlObject::Buffer(buffer) => Some(buffer),
            _ => None,
        }
    }

    pub fn as_program(&self) -> Option<&G::Program> {
        match self {
            GlObject::Program(program) => Some(program),
            _ => None,
        }
    }

    pub fn as_shader(&self) -> Option<&G::Shader> {
        match self {
            GlObject::Shader(shader) => Some(shader),
            _ => None,
        }
    }

    pub fn as_texture(&self) -> Option<&G::Texture> {
        match self {
            GlObject::Texture(texture) => Some(texture),
            _ => None,
        }
    }

    pub fn as_uniform_location(&self) -> Option<&G::UniformLocation> {
        match self {
            GlObject::UniformLocation(location) => Some(location),
            _ => None,
        }
    }
}

/// Drawing-buffer attributes fixed when the context is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextAttributes {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default)]
    pub alpha: bool,
    #[serde(default = "default_true")]
    pub depth: bool,
    #[serde(default = "default_true")]
    pub premultiplied_alpha: bool,
    #[serde(default)]
    pub antialias: bool,
    #[serde(default)]
    pub preserve_drawing_buffer: bool,
}

/// Bridge-level graphics settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlConfig {
    /// Query the backend for errors at all
    #[serde(default = "default_true")]
    pub check_errors: bool,
    /// Answer `glGetError` with 0 while the draw hook runs (error queries are slow)
    #[serde(default = "default_true")]
    pub suppress_errors_during_draw: bool,
    /// How far to scan for a NUL terminator
    #[serde(default = "default_scan_limit")]
    pub string_scan_limit: usize,
    /// Whether deleted objects' handles may be handed out again
    #[serde(default)]
    pub handle_policy: ReusePolicy,
}

fn default_true() -> bool {
    true
}
fn default_width() -> u32 {
    640
}
fn default_height() -> u32 {
    480
}
fn default_scan_limit() -> usize {
    DEFAULT_SCAN_LIMIT
}

impl Default for ContextAttributes {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            alpha: false,
            depth: true,
            premultiplied_alpha: true,
            antialias: false,
            preserve_drawing_buffer: false,
        }
    }
}

impl Default for GlConfig {
    fn default() -> Self {
        Self {
            check_errors: true,
            suppress_errors_during_draw: true,
            string_scan_limit: default_scan_limit(),
            handle_policy: ReusePolicy::default(),
        }
    }
}
