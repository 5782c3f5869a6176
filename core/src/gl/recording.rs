//! Headless backend that records every call
//!
//! Objects are plain ids from a single counter. The recorder keeps just enough
//! state (enabled caps, queued errors, canned info logs) to answer queries
//! plausibly, which is what headless runs and tests need.

use std::collections::VecDeque;

use hashbrown::{HashMap, HashSet};
use serde::Serialize;

use super::{ContextAttributes, GlBackend, TexImage2D};

/// One recorded backend call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum GlCall {
    Viewport {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    ActiveTexture { texture: u32 },
    AttachShader {
        program: Option<u32>,
        shader: Option<u32>,
    },
    BindAttribLocation {
        program: Option<u32>,
        index: u32,
        name: String,
    },
    BindBuffer {
        target: u32,
        buffer: Option<u32>,
    },
    BindTexture {
        target: u32,
        texture: Option<u32>,
    },
    BufferData {
        target: u32,
        data: Vec<u8>,
        usage: u32,
    },
    Clear { mask: u32 },
    ClearColor { rgba: [f32; 4] },
    CompileShader {
        shader: Option<u32>,
    },
    CreateBuffer { id: u32 },
    CreateProgram { id: u32 },
    CreateShader {
        shader_type: u32,
        id: u32,
    },
    CreateTexture { id: u32 },
    DeleteBuffer { id: u32 },
    DeleteProgram { id: u32 },
    DeleteShader { id: u32 },
    DeleteTexture { id: u32 },
    Disable { cap: u32 },
    DisableVertexAttribArray {
        index: u32,
    },
    DrawArrays {
        mode: u32,
        first: i32,
        count: i32,
    },
    DrawElements {
        mode: u32,
        count: i32,
        element_type: u32,
        offset: i32,
    },
    Enable { cap: u32 },
    EnableVertexAttribArray {
        index: u32,
    },
    GenerateMipmap { target: u32 },
    GetError { code: u32 },
    GetProgramInfoLog {
        program: Option<u32>,
    },
    GetShaderInfoLog {
        shader: Option<u32>,
    },
    GetUniformLocation {
        program: Option<u32>,
        name: String,
        location: Option<u32>,
    },
    IsEnabled {
        cap: u32,
        enabled: bool,
    },
    LinkProgram {
        program: Option<u32>,
    },
    ShaderSource {
        shader: Option<u32>,
        source: String,
    },
    TexImage2D {
        image: TexImage2D,
        pixels: Option<usize>,
    },
    TexParameteri {
        target: u32,
        pname: u32,
        param: i32,
    },
    UseProgram {
        program: Option<u32>,
    },
    Uniform1i {
        location: Option<u32>,
        value: i32,
    },
    Uniform4fv {
        location: Option<u32>,
        values: Vec<f32>,
    },
    UniformMatrix4fv {
        location: Option<u32>,
        transpose: bool,
        values: Vec<f32>,
    },
    VertexAttribPointer {
        index: u32,
        size: i32,
        attrib_type: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    },
}

impl GlCall {
    /// Whether this call draws primitives
    pub fn is_draw(&self) -> bool {
        matches!(self, GlCall::DrawArrays { .. } | GlCall::DrawElements { .. })
    }
}

/// Recording backend
#[derive(Debug, Default)]
pub struct RecordingGl {
    attributes: ContextAttributes,
    calls: Vec<GlCall>,
    next_id: u32,
    enabled: HashSet<u32>,
    errors: VecDeque<u32>,
    shader_logs: HashMap<u32, String>,
    program_logs: HashMap<u32, String>,
    missing_uniforms: HashSet<String>,
    context_lost: bool,
}

impl RecordingGl {
    pub fn new(attributes: ContextAttributes) -> Self {
        Self {
            attributes,
            ..Self::default()
        }
    }

    pub fn attributes(&self) -> &ContextAttributes {
        &self.attributes
    }

    pub fn calls(&self) -> &[GlCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<GlCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn draw_count(&self) -> usize {
        self.calls.iter().filter(|call| call.is_draw()).count()
    }

    /// Queue an error code for the next `get_error`
    pub fn inject_error(&mut self, code: u32) {
        self.errors.push_back(code);
    }

    /// Info log returned for a shader id
    pub fn set_shader_log(&mut self, shader: u32, log: impl Into<String>) {
        self.shader_logs.insert(shader, log.into());
    }

    /// Info log returned for a program id
    pub fn set_program_log(&mut self, program: u32, log: impl Into<String>) {
        self.program_logs.insert(program, log.into());
    }

    /// Make `get_uniform_location` report `name` as inactive
    pub fn hide_uniform(&mut self, name: impl Into<String>) {
        self.missing_uniforms.insert(name.into());
    }

    /// Simulate context loss: creation calls start failing
    pub fn lose_context(&mut self) {
        self.context_lost = true;
    }

    fn allocate(&mut self) -> Option<u32> {
        if self.context_lost {
            return None;
        }
        self.next_id += 1;
        Some(self.next_id)
    }

    fn record(&mut self, call: GlCall) {
        self.calls.push(call);
    }
}

impl GlBackend for RecordingGl {
    type Buffer = u32;
    type Program = u32;
    type Shader = u32;
    type Texture = u32;
    type UniformLocation = u32;

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.record(GlCall::Viewport { x, y, width, height });
    }

    fn active_texture(&mut self, texture: u32) {
        self.record(GlCall::ActiveTexture { texture });
    }

    fn attach_shader(&mut self, program: Option<&u32>, shader: Option<&u32>) {
        self.record(GlCall::AttachShader {
            program: program.copied(),
            shader: shader.copied(),
        });
    }

    fn bind_attrib_location(&mut self, program: Option<&u32>, index: u32, name: &str) {
        self.record(GlCall::BindAttribLocation {
            program: program.copied(),
            index,
            name: name.to_owned(),
        });
    }

    fn bind_buffer(&mut self, target: u32, buffer: Option<&u32>) {
        self.record(GlCall::BindBuffer {
            target,
            buffer: buffer.copied(),
        });
    }

    fn bind_texture(&mut self, target: u32, texture: Option<&u32>) {
        self.record(GlCall::BindTexture {
            target,
            texture: texture.copied(),
        });
    }

    fn buffer_data(&mut self, target: u32, data: &[u8], usage: u32) {
        self.record(GlCall::BufferData {
            target,
            data: data.to_vec(),
            usage,
        });
    }

    fn clear(&mut self, mask: u32) {
        self.record(GlCall::Clear { mask });
    }

    fn clear_color(&mut self, red: f32, green: f32, blue: f32, alpha: f32) {
        self.record(GlCall::ClearColor {
            rgba: [red, green, blue, alpha],
        });
    }

    fn compile_shader(&mut self, shader: Option<&u32>) {
        self.record(GlCall::CompileShader {
            shader: shader.copied(),
        });
    }

    fn create_buffer(&mut self) -> Option<u32> {
        let id = self.allocate()?;
        self.record(GlCall::CreateBuffer { id });
        Some(id)
    }

    fn create_program(&mut self) -> Option<u32> {
        let id = self.allocate()?;
        self.record(GlCall::CreateProgram { id });
        Some(id)
    }

    fn create_shader(&mut self, shader_type: u32) -> Option<u32> {
        let id = self.allocate()?;
        self.record(GlCall::CreateShader { shader_type, id });
        Some(id)
    }

    fn create_texture(&mut self) -> Option<u32> {
        let id = self.allocate()?;
        self.record(GlCall::CreateTexture { id });
        Some(id)
    }

    fn delete_buffer(&mut self, id: u32) {
        self.record(GlCall::DeleteBuffer { id });
    }

    fn delete_program(&mut self, id: u32) {
        self.program_logs.remove(&id);
        self.record(GlCall::DeleteProgram { id });
    }

    fn delete_shader(&mut self, id: u32) {
        self.shader_logs.remove(&id);
        self.record(GlCall::DeleteShader { id });
    }

    fn delete_texture(&mut self, id: u32) {
        self.record(GlCall::DeleteTexture { id });
    }

    fn disable(&mut self, cap: u32) {
        self.enabled.remove(&cap);
        self.record(GlCall::Disable { cap });
    }

    fn disable_vertex_attrib_array(&mut self, index: u32) {
        self.record(GlCall::DisableVertexAttribArray { index });
    }

    fn draw_arrays(&mut self, mode: u32, first: i32, count: i32) {
        self.record(GlCall::DrawArrays { mode, first, count });
    }

    fn draw_elements(&mut self, mode: u32, count: i32, element_type: u32, offset: i32) {
        self.record(GlCall::DrawElements {
            mode,
            count,
            element_type,
            offset,
        });
    }

    fn enable(&mut self, cap: u32) {
        self.enabled.insert(cap);
        self.record(GlCall::Enable { cap });
    }

    fn enable_vertex_attrib_array(&mut self, index: u32) {
        self.record(GlCall::EnableVertexAttribArray { index });
    }

    fn generate_mipmap(&mut self, target: u32) {
        self.record(GlCall::GenerateMipmap { target });
    }

    fn get_error(&mut self) -> u32 {
        let code = self.errors.pop_front().unwrap_or(super::consts::NO_ERROR);
        self.record(GlCall::GetError { code });
        code
    }

    fn get_program_info_log(&mut self, program: Option<&u32>) -> Option<String> {
        let program = program.copied();
        self.record(GlCall::GetProgramInfoLog { program });
        Some(
            program
                .and_then(|id| self.program_logs.get(&id).cloned())
                .unwrap_or_default(),
        )
    }

    fn get_shader_info_log(&mut self, shader: Option<&u32>) -> Option<String> {
        let shader = shader.copied();
        self.record(GlCall::GetShaderInfoLog { shader });
        Some(
            shader
                .and_then(|id| self.shader_logs.get(&id).cloned())
                .unwrap_or_default(),
        )
    }

    fn get_uniform_location(&mut self, program: Option<&u32>, name: &str) -> Option<u32> {
        let program = program.copied();
        let location = if program.is_none() || self.missing_uniforms.contains(name) {
            None
        } else {
            self.allocate()
        };
        self.record(GlCall::GetUniformLocation {
            program,
            name: name.to_owned(),
            location,
        });
        location
    }

    fn is_enabled(&mut self, cap: u32) -> bool {
        let enabled = self.enabled.contains(&cap);
        self.record(GlCall::IsEnabled { cap, enabled });
        enabled
    }

    fn link_program(&mut self, program: Option<&u32>) {
        self.record(GlCall::LinkProgram {
            program: program.copied(),
        });
    }

    fn shader_source(&mut self, shader: Option<&u32>, source: &str) {
        self.record(GlCall::ShaderSource {
            shader: shader.copied(),
            source: source.to_owned(),
        });
    }

    fn tex_image_2d(&mut self, image: TexImage2D, pixels: Option<&[u8]>) {
        self.record(GlCall::TexImage2D {
            image,
            pixels: pixels.map(<[u8]>::len),
        });
    }

    fn tex_parameteri(&mut self, target: u32, pname: u32, param: i32) {
        self.record(GlCall::TexParameteri {
            target,
            pname,
            param,
        });
    }

    fn use_program(&mut self, program: Option<&u32>) {
        self.record(GlCall::UseProgram {
            program: program.copied(),
        });
    }

    fn uniform_1i(&mut self, location: Option<&u32>, value: i32) {
        self.record(GlCall::Uniform1i {
            location: location.copied(),
            value,
        });
    }

    fn uniform_4fv(&mut self, location: Option<&u32>, values: &[f32]) {
        self.record(GlCall::Uniform4fv {
            location: location.copied(),
            values: values.to_vec(),
        });
    }

    fn uniform_matrix_4fv(&mut self, location: Option<&u32>, transpose: bool, values: &[f32]) {
        self.record(GlCall::UniformMatrix4fv {
            location: location.copied(),
            transpose,
            values: values.to_vec(),
        });
    }

    fn vertex_attrib_pointer(
        &mut self,
        index: u32,
        size: i32,
        attrib_type: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    ) {
        self.record(GlCall::VertexAttribPointer {
            index,
            size,
            attrib_type,
            normalized,
            stride,
            offset,
        });
    }
}
