//! Per-session graphics state and call forwarding

use std::collections::VecDeque;

use hashbrown::HashMap;
use tracing::{debug, info, warn};

use super::{GlBackend, GlConfig, GlObject, ObjectKind, TexImage2D};
use crate::handles::{Handle, HandleTable, NULL_HANDLE};
use crate::marshal::{self, MarshalError};

/// Upper bound on errors drained after a single failure-prone call
const MAX_DRAINED_ERRORS: usize = 8;

/// Guest-owned region that receives diagnostic text (info logs)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScratchBuffer {
    pub address: u32,
    /// Size in bytes, when the guest exports one
    pub capacity: Option<usize>,
}

/// Graphics half of a bridge session
///
/// Owns the backend and every object the guest has created through it. Each
/// forwarding method takes the guest's primitive arguments, resolves handles,
/// builds memory views, and calls the backend once.
pub struct GlBridge<G: GlBackend> {
    backend: G,
    objects: HandleTable<GlObject<G>>,
    config: GlConfig,
    in_draw: bool,
    /// Errors drained for logging, still owed to the guest's `glGetError`
    ///
    /// Holds each code at most once, like the per-kind error flags of a GL
    /// context.
    pending_errors: VecDeque<u32>,
    /// Location handles already handed out, keyed by program handle and name
    uniform_locations: HashMap<(Handle, String), Handle>,
    scratch: Option<ScratchBuffer>,
}

fn lookup<'a, G: GlBackend, T: 'a>(
    objects: &'a HandleTable<GlObject<G>>,
    handle: Handle,
    call: &'static str,
    project: fn(&GlObject<G>) -> Option<&T>,
) -> Option<&'a T> {
    if handle == NULL_HANDLE {
        return None;
    }
    let Some(object) = objects.get(handle) else {
        warn!(call, handle, "Unknown handle, passing null");
        return None;
    };
    let resolved = project(object);
    if resolved.is_none() {
        warn!(call, handle, kind = ?object.kind(), "Handle refers to the wrong kind of object");
    }
    resolved
}

fn skip_call(call: &'static str, error: MarshalError) {
    warn!(call, %error, "Skipping call with unreadable guest memory");
}

impl<G: GlBackend> GlBridge<G> {
    pub fn new(backend: G, config: GlConfig) -> Self {
        Self {
            backend,
            objects: HandleTable::with_policy(config.handle_policy),
            config,
            in_draw: false,
            pending_errors: VecDeque::new(),
            uniform_locations: HashMap::new(),
            scratch: None,
        }
    }

    pub fn backend(&self) -> &G {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut G {
        &mut self.backend
    }

    pub fn into_backend(self) -> G {
        self.backend
    }

    pub fn config(&self) -> &GlConfig {
        &self.config
    }

    /// Number of live objects behind handles
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Kind of the object behind a handle, if any
    pub fn object_kind(&self, handle: Handle) -> Option<ObjectKind> {
        self.objects.get(handle).map(GlObject::kind)
    }

    pub fn scratch_buffer(&self) -> Option<ScratchBuffer> {
        self.scratch
    }

    pub fn set_scratch_buffer(&mut self, scratch: Option<ScratchBuffer>) {
        self.scratch = scratch;
    }

    /// Mark the start of the guest's draw hook
    pub fn begin_draw(&mut self) {
        self.in_draw = true;
    }

    pub fn end_draw(&mut self) {
        self.in_draw = false;
    }

    fn errors_suppressed(&self) -> bool {
        !self.config.check_errors || (self.in_draw && self.config.suppress_errors_during_draw)
    }

    /// Drain and log backend errors after a call that commonly fails
    ///
    /// Drained codes stay queued for the guest's next `glGetError`.
    fn log_errors_after(&mut self, call: &'static str) {
        if self.errors_suppressed() {
            return;
        }
        for _ in 0..MAX_DRAINED_ERRORS {
            let code = self.backend.get_error();
            if code == super::consts::NO_ERROR {
                break;
            }
            warn!(call, code, "GL error");
            if !self.pending_errors.contains(&code) {
                self.pending_errors.push_back(code);
            }
        }
    }

    fn insert(&mut self, object: Option<GlObject<G>>, call: &'static str) -> Handle {
        match object {
            Some(object) => self.objects.insert(object),
            None => {
                warn!(call, "Backend returned no object");
                NULL_HANDLE
            }
        }
    }

    fn release(
        &mut self,
        handle: Handle,
        kind: ObjectKind,
        call: &'static str,
    ) -> Option<GlObject<G>> {
        match self.objects.get(handle).map(GlObject::kind) {
            Some(found) if found == kind => self.objects.remove(handle),
            Some(found) => {
                warn!(call, handle, kind = ?found, "Refusing to delete object of another kind");
                None
            }
            None => {
                if handle != NULL_HANDLE {
                    warn!(call, handle, "Unknown handle");
                }
                None
            }
        }
    }

    fn write_scratch(&self, memory: &mut [u8], text: &str, call: &'static str) -> u32 {
        let Some(scratch) = self.scratch else {
            warn!(call, "Guest exports no scratch buffer, dropping text");
            return 0;
        };
        match marshal::write_c_string(memory, scratch.address, scratch.capacity, text) {
            Ok(written) => {
                if written < text.len() {
                    debug!(call, written, len = text.len(), "Info log truncated");
                }
                scratch.address
            }
            Err(error) => {
                skip_call(call, error);
                0
            }
        }
    }

    // ------------------------------------------------------------------
    // Context state
    // ------------------------------------------------------------------

    pub fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.backend.viewport(x, y, width, height);
    }

    pub fn active_texture(&mut self, texture: u32) {
        self.backend.active_texture(texture);
    }

    pub fn clear(&mut self, mask: u32) {
        self.backend.clear(mask);
    }

    pub fn clear_color(&mut self, red: f32, green: f32, blue: f32, alpha: f32) {
        self.backend.clear_color(red, green, blue, alpha);
    }

    pub fn enable(&mut self, cap: u32) {
        self.backend.enable(cap);
    }

    pub fn disable(&mut self, cap: u32) {
        self.backend.disable(cap);
    }

    pub fn is_enabled(&mut self, cap: u32) -> bool {
        self.backend.is_enabled(cap)
    }

    pub fn get_error(&mut self) -> u32 {
        if let Some(code) = self.pending_errors.pop_front() {
            return code;
        }
        if self.errors_suppressed() {
            return super::consts::NO_ERROR;
        }
        self.backend.get_error()
    }

    // ------------------------------------------------------------------
    // Buffers and vertex attributes
    // ------------------------------------------------------------------

    pub fn create_buffer(&mut self) -> Handle {
        let buffer = self.backend.create_buffer().map(GlObject::Buffer);
        self.insert(buffer, "glCreateBuffer")
    }

    pub fn delete_buffer(&mut self, buffer: Handle) {
        if let Some(GlObject::Buffer(buffer)) =
            self.release(buffer, ObjectKind::Buffer, "glDeleteBuffer")
        {
            self.backend.delete_buffer(buffer);
        }
    }

    pub fn bind_buffer(&mut self, target: u32, buffer: Handle) {
        let buffer = lookup(&self.objects, buffer, "glBindBuffer", GlObject::as_buffer);
        self.backend.bind_buffer(target, buffer);
    }

    /// `size` is in bytes
    pub fn buffer_data(&mut self, memory: &[u8], target: u32, size: u32, data: u32, usage: u32) {
        match marshal::view_bytes(memory, data, size) {
            Ok(bytes) => self.backend.buffer_data(target, bytes, usage),
            Err(error) => skip_call("glBufferData", error),
        }
    }

    pub fn enable_vertex_attrib_array(&mut self, index: u32) {
        self.backend.enable_vertex_attrib_array(index);
    }

    pub fn disable_vertex_attrib_array(&mut self, index: u32) {
        self.backend.disable_vertex_attrib_array(index);
    }

    pub fn vertex_attrib_pointer(
        &mut self,
        index: u32,
        size: i32,
        attrib_type: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    ) {
        self.backend
            .vertex_attrib_pointer(index, size, attrib_type, normalized, stride, offset);
    }

    pub fn draw_arrays(&mut self, mode: u32, first: i32, count: i32) {
        self.backend.draw_arrays(mode, first, count);
    }

    /// `offset` is a byte offset into the bound element buffer, not guest memory
    pub fn draw_elements(&mut self, mode: u32, count: i32, element_type: u32, offset: i32) {
        self.backend.draw_elements(mode, count, element_type, offset);
    }

    // ------------------------------------------------------------------
    // Shaders and programs
    // ------------------------------------------------------------------

    pub fn create_shader(&mut self, shader_type: u32) -> Handle {
        let shader = self.backend.create_shader(shader_type).map(GlObject::Shader);
        self.insert(shader, "glCreateShader")
    }

    pub fn delete_shader(&mut self, shader: Handle) {
        if let Some(GlObject::Shader(shader)) =
            self.release(shader, ObjectKind::Shader, "glDeleteShader")
        {
            self.backend.delete_shader(shader);
        }
    }

    /// `source` is a NUL-terminated string
    pub fn shader_source(&mut self, memory: &[u8], shader: Handle, source: u32) {
        let source = match marshal::read_c_string(memory, source, self.config.string_scan_limit) {
            Ok(source) => source,
            Err(error) => return skip_call("glShaderSource", error),
        };
        let shader = lookup(&self.objects, shader, "glShaderSource", GlObject::as_shader);
        self.backend.shader_source(shader, &source);
    }

    pub fn compile_shader(&mut self, shader: Handle) {
        let resolved = lookup(&self.objects, shader, "glCompileShader", GlObject::as_shader);
        self.backend.compile_shader(resolved);
        self.log_errors_after("glCompileShader");
    }

    /// Logs the shader's info log and copies it into the scratch buffer
    ///
    /// Returns the scratch buffer address, or 0 when there is none.
    pub fn shader_info_log(&mut self, memory: &mut [u8], shader: Handle) -> u32 {
        let resolved = lookup(&self.objects, shader, "glGetShaderInfoLog", GlObject::as_shader);
        let log = self.backend.get_shader_info_log(resolved).unwrap_or_default();
        info!(target: "guest", shader, "SHADER LOG: {}", log);
        self.write_scratch(memory, &log, "glGetShaderInfoLog")
    }

    pub fn create_program(&mut self) -> Handle {
        let program = self.backend.create_program().map(GlObject::Program);
        self.insert(program, "glCreateProgram")
    }

    /// Also releases every uniform location handle looked up on the program
    pub fn delete_program(&mut self, program: Handle) {
        let Some(GlObject::Program(resolved)) =
            self.release(program, ObjectKind::Program, "glDeleteProgram")
        else {
            return;
        };
        let objects = &mut self.objects;
        self.uniform_locations.retain(|(owner, _), location| {
            if *owner != program {
                return true;
            }
            objects.remove(*location);
            false
        });
        self.backend.delete_program(resolved);
    }

    pub fn attach_shader(&mut self, program: Handle, shader: Handle) {
        let program = lookup(&self.objects, program, "glAttachShader", GlObject::as_program);
        let shader = lookup(&self.objects, shader, "glAttachShader", GlObject::as_shader);
        self.backend.attach_shader(program, shader);
    }

    /// `name` is a NUL-terminated string
    pub fn bind_attrib_location(&mut self, memory: &[u8], program: Handle, index: u32, name: u32) {
        let name = match marshal::read_c_string(memory, name, self.config.string_scan_limit) {
            Ok(name) => name,
            Err(error) => return skip_call("glBindAttribLocation", error),
        };
        debug!(program, index, name = %name, "bindAttribLocation");
        let program = lookup(&self.objects, program, "glBindAttribLocation", GlObject::as_program);
        self.backend.bind_attrib_location(program, index, &name);
    }

    pub fn link_program(&mut self, program: Handle) {
        let resolved = lookup(&self.objects, program, "glLinkProgram", GlObject::as_program);
        self.backend.link_program(resolved);
        self.log_errors_after("glLinkProgram");
    }

    /// Logs the program's info log and copies it into the scratch buffer
    pub fn program_info_log(&mut self, memory: &mut [u8], program: Handle) -> u32 {
        let resolved = lookup(&self.objects, program, "glGetProgramInfoLog", GlObject::as_program);
        let log = self.backend.get_program_info_log(resolved).unwrap_or_default();
        info!(target: "guest", program, "PROGRAM LOG: {}", log);
        self.write_scratch(memory, &log, "glGetProgramInfoLog")
    }

    pub fn use_program(&mut self, program: Handle) {
        let program = lookup(&self.objects, program, "glUseProgram", GlObject::as_program);
        self.backend.use_program(program);
    }

    // ------------------------------------------------------------------
    // Uniforms
    // ------------------------------------------------------------------

    /// `name` is `name_len` bytes, not NUL-terminated
    ///
    /// Returns 0 when the program has no active uniform of that name.
    /// Repeated lookups of the same name on the same program return the same
    /// handle without asking the backend again.
    pub fn get_uniform_location(
        &mut self,
        memory: &[u8],
        program: Handle,
        name: u32,
        name_len: u32,
    ) -> Handle {
        let name = match marshal::read_sized_string(memory, name, name_len) {
            Ok(name) => name.into_owned(),
            Err(error) => {
                skip_call("glGetUniformLocation", error);
                return NULL_HANDLE;
            }
        };
        if let Some(&location) = self.uniform_locations.get(&(program, name.clone())) {
            return location;
        }
        let resolved = lookup(&self.objects, program, "glGetUniformLocation", GlObject::as_program);
        let known_program = resolved.is_some();
        match self.backend.get_uniform_location(resolved, &name) {
            Some(location) => {
                let handle = self.objects.insert(GlObject::UniformLocation(location));
                if known_program {
                    self.uniform_locations.insert((program, name), handle);
                }
                handle
            }
            None => {
                debug!(program, name = %name, "No such uniform");
                NULL_HANDLE
            }
        }
    }

    pub fn uniform_1i(&mut self, location: Handle, value: i32) {
        let location = lookup(
            &self.objects,
            location,
            "glUniform1i",
            GlObject::as_uniform_location,
        );
        self.backend.uniform_1i(location, value);
    }

    /// `count` is the number of vec4s at `values`
    pub fn uniform_4fv(&mut self, memory: &[u8], location: Handle, count: u32, values: u32) {
        let Some(floats) = count.checked_mul(4) else {
            return skip_call(
                "glUniform4fv",
                MarshalError::Overflow {
                    offset: values,
                    count,
                },
            );
        };
        let values = match marshal::view_f32(memory, values, floats) {
            Ok(values) => values,
            Err(error) => return skip_call("glUniform4fv", error),
        };
        let location = lookup(
            &self.objects,
            location,
            "glUniform4fv",
            GlObject::as_uniform_location,
        );
        self.backend.uniform_4fv(location, &values);
    }

    /// `count` is the number of 4x4 matrices at `values`
    pub fn uniform_matrix_4fv(
        &mut self,
        memory: &[u8],
        location: Handle,
        count: u32,
        transpose: bool,
        values: u32,
    ) {
        let Some(floats) = count.checked_mul(16) else {
            return skip_call(
                "glUniformMatrix4fv",
                MarshalError::Overflow {
                    offset: values,
                    count,
                },
            );
        };
        let values = match marshal::view_f32(memory, values, floats) {
            Ok(values) => values,
            Err(error) => return skip_call("glUniformMatrix4fv", error),
        };
        let location = lookup(
            &self.objects,
            location,
            "glUniformMatrix4fv",
            GlObject::as_uniform_location,
        );
        self.backend.uniform_matrix_4fv(location, transpose, &values);
    }

    // ------------------------------------------------------------------
    // Textures
    // ------------------------------------------------------------------

    pub fn create_texture(&mut self) -> Handle {
        let texture = self.backend.create_texture().map(GlObject::Texture);
        self.insert(texture, "glCreateTexture")
    }

    pub fn delete_texture(&mut self, texture: Handle) {
        if let Some(GlObject::Texture(texture)) =
            self.release(texture, ObjectKind::Texture, "glDeleteTexture")
        {
            self.backend.delete_texture(texture);
        }
    }

    pub fn bind_texture(&mut self, target: u32, texture: Handle) {
        let texture = lookup(&self.objects, texture, "glBindTexture", GlObject::as_texture);
        self.backend.bind_texture(target, texture);
    }

    /// `pixels` is `size` bytes; a null pointer allocates without uploading
    pub fn tex_image_2d(&mut self, memory: &[u8], image: TexImage2D, pixels: u32, size: u32) {
        if pixels == 0 {
            self.backend.tex_image_2d(image, None);
            return;
        }
        match marshal::view_bytes(memory, pixels, size) {
            Ok(bytes) => self.backend.tex_image_2d(image, Some(bytes)),
            Err(error) => skip_call("glTexImage2D", error),
        }
    }

    pub fn tex_parameteri(&mut self, target: u32, pname: u32, param: i32) {
        self.backend.tex_parameteri(target, pname, param);
    }

    pub fn generate_mipmap(&mut self, target: u32) {
        self.backend.generate_mipmap(target);
    }
}
