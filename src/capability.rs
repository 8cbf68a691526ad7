//! The functions a guest imports.
//!
//! Each capability decodes its memory arguments through the [Marshaler](crate::memory::Marshaler),
//! resolves its handle arguments through the [Registry](crate::registry::Registry) and then
//! forwards to the native graphics API or the host. Registry borrows are scoped to the native
//! call; none of these functions enter the guest while holding one, except through the guest's
//! allocator.

use crate::bridge::{Bridge, Host, Platform};
use crate::error::{BridgeError, MemoryError};
use crate::graphics::{GraphicsApi, TexImage2D};
use crate::memory::{Element, View, Write};
use crate::registry::{Handle, HandleTable, Registry};

const RANDOM_STRING_LEN: usize = 20;
const RANDOM_SEED_RANGE: f64 = 2_147_483_647.0;
const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn created<T>(object: Option<T>, call: &'static str) -> Result<T, BridgeError> {
    object.ok_or_else(|| BridgeError::native(call, "returned null"))
}

// Runtime.
impl<P> Bridge<P>
where
    P: Platform,
{
    pub fn console_log(&self, value: f64) {
        log::info!(target: "guest", "consoleLog {}", value);
    }

    pub fn console_log_str(&self, ptr: u32, len: u32) -> Result<(), BridgeError> {
        let message = self.marshaler()?.read_string(ptr, len)?;

        log::info!(target: "guest", "{}", message);

        Ok(())
    }

    /// A random integer in `[0, 2147483647)`.
    pub fn random_seed(&self) -> i32 {
        (self.host.random() * RANDOM_SEED_RANGE).floor() as i32
    }

    /// Fills up to `cap` bytes at `ptr` with random base-36 digits and returns how many were
    /// written.
    pub fn random_string(&self, ptr: u32, cap: u32) -> Result<u32, BridgeError> {
        let len = RANDOM_STRING_LEN.min(cap as usize);
        let text: Vec<u8> = (0..len)
            .map(|_| {
                let digit = (self.host.random() * 36.0) as usize;

                BASE36_DIGITS[digit.min(35)]
            })
            .collect();

        self.marshaler()?.write_bytes(ptr, &text)?;

        Ok(len as u32)
    }

    pub fn debug_break(&self) {
        self.host.debug_break();
    }

    /// Decodes and logs a JSON document produced by the guest's equation evaluator.
    pub fn log_equation_result(
        &self,
        ptr: u32,
        len: u32,
    ) -> Result<serde_json::Value, BridgeError> {
        let text = self.marshaler()?.read_string(ptr, len)?;
        let value: serde_json::Value = serde_json::from_str(&text)?;

        log::info!(target: "guest", "onEquationResult {}", value);

        Ok(value)
    }
}

// Shaders and programs.
impl<P> Bridge<P>
where
    P: Platform,
{
    /// Compiles the shader source in the string view `(source_ptr, source_len)`.
    ///
    /// A compilation failure is returned with the native info log and allocates no handle.
    pub fn init_shader(
        &self,
        source_ptr: u32,
        source_len: u32,
        kind: u32,
    ) -> Result<Handle, BridgeError> {
        let source = self.marshaler()?.read_string(source_ptr, source_len)?;
        let gl = &self.gl;
        let shader = created(gl.create_shader(kind), "createShader")?;

        gl.shader_source(&shader, &source);
        gl.compile_shader(&shader);

        if !gl.shader_compiled(&shader) {
            let info = gl.shader_info_log(&shader).unwrap_or_default();

            gl.delete_shader(&shader);

            return Err(BridgeError::ShaderCompilation(info));
        }

        Ok(self.registry.borrow_mut().shaders.create(shader))
    }

    pub fn link_shader_program(
        &self,
        vertex_shader: Handle,
        fragment_shader: Handle,
    ) -> Result<Handle, BridgeError> {
        let registry = &mut *self.registry.borrow_mut();
        let gl = &self.gl;
        let vertex_shader = registry.shaders.get(vertex_shader)?;
        let fragment_shader = registry.shaders.get(fragment_shader)?;
        let program = created(gl.create_program(), "createProgram")?;

        gl.attach_shader(&program, vertex_shader);
        gl.attach_shader(&program, fragment_shader);
        gl.link_program(&program);

        if !gl.program_linked(&program) {
            let info = gl.program_info_log(&program).unwrap_or_default();

            gl.delete_program(&program);

            return Err(BridgeError::ShaderLinking(info));
        }

        Ok(registry.programs.create(program))
    }

    pub fn detach_shader(&self, program: Handle, shader: Handle) -> Result<(), BridgeError> {
        let registry = self.registry.borrow();

        self.gl.detach_shader(
            registry.programs.get(program)?,
            registry.shaders.get(shader)?,
        );

        Ok(())
    }

    pub fn delete_shader(&self, shader: Handle) -> Result<(), BridgeError> {
        let shader = self.registry.borrow_mut().shaders.delete(shader)?;

        self.gl.delete_shader(&shader);

        Ok(())
    }

    pub fn delete_program(&self, program: Handle) -> Result<(), BridgeError> {
        let program = self.registry.borrow_mut().programs.delete(program)?;

        self.gl.delete_program(&program);

        Ok(())
    }

    pub fn use_program(&self, program: Handle) -> Result<(), BridgeError> {
        self.gl.use_program(self.registry.borrow().programs.get(program)?);

        Ok(())
    }

    pub fn program_parameter(&self, program: Handle, pname: u32) -> Result<i32, BridgeError> {
        let registry = self.registry.borrow();
        let value = self
            .gl
            .program_parameter(registry.programs.get(program)?, pname);

        Ok(value as i32)
    }

    /// Resolves a vertex attribute's native location; `-1` if the program has no such attribute.
    pub fn attrib_location(
        &self,
        program: Handle,
        name_ptr: u32,
        name_len: u32,
    ) -> Result<i32, BridgeError> {
        let name = self.marshaler()?.read_string(name_ptr, name_len)?;
        let registry = self.registry.borrow();

        Ok(self.gl.attrib_location(registry.programs.get(program)?, &name))
    }

    /// Resolves a uniform's location and registers it under a new handle.
    pub fn uniform_location(
        &self,
        program: Handle,
        name_ptr: u32,
        name_len: u32,
    ) -> Result<Handle, BridgeError> {
        let name = self.marshaler()?.read_string(name_ptr, name_len)?;
        let registry = &mut *self.registry.borrow_mut();
        let location = self
            .gl
            .uniform_location(registry.programs.get(program)?, &name);

        Ok(registry.uniform_locations.create(location))
    }

    /// Writes the description of the active uniform at `index` into guest memory.
    ///
    /// The name is written as UTF-8, truncated to `name_capacity` bytes. Its written length, the
    /// uniform's array size and its type are stored at `length_ptr`, `size_ptr` and `type_ptr`.
    /// Either every output is written or none is.
    #[allow(clippy::too_many_arguments)]
    pub fn active_uniform(
        &self,
        program: Handle,
        index: u32,
        name_capacity: u32,
        length_ptr: u32,
        size_ptr: u32,
        type_ptr: u32,
        name_ptr: u32,
    ) -> Result<(), BridgeError> {
        let info = {
            let registry = self.registry.borrow();

            self.gl
                .active_uniform(registry.programs.get(program)?, index)
                .ok_or_else(|| {
                    BridgeError::native("getActiveUniform", format!("no active uniform {}", index))
                })?
        };

        let name = info.name.as_bytes();
        let len = name.len().min(name_capacity as usize);
        let marshaler = self.marshaler()?;

        marshaler.check(View::bytes(name_ptr, name_capacity))?;
        marshaler.write_batch(&[
            Write::U32 {
                ptr: length_ptr,
                value: len as u32,
            },
            Write::U32 {
                ptr: size_ptr,
                value: info.size as u32,
            },
            Write::I32 {
                ptr: type_ptr,
                value: info.kind as i32,
            },
            Write::Bytes {
                ptr: name_ptr,
                bytes: &name[..len],
            },
        ])?;

        Ok(())
    }
}

// Uniforms.
impl<P> Bridge<P>
where
    P: Platform,
{
    pub fn uniform1f(&self, location: Handle, x: f32) -> Result<(), BridgeError> {
        let registry = self.registry.borrow();

        self.gl
            .uniform1f(registry.uniform_locations.get(location)?.as_ref(), x);

        Ok(())
    }

    pub fn uniform1i(&self, location: Handle, x: i32) -> Result<(), BridgeError> {
        let registry = self.registry.borrow();

        self.gl
            .uniform1i(registry.uniform_locations.get(location)?.as_ref(), x);

        Ok(())
    }

    pub fn uniform2fv(&self, location: Handle, x: f32, y: f32) -> Result<(), BridgeError> {
        let registry = self.registry.borrow();

        self.gl
            .uniform2fv(registry.uniform_locations.get(location)?.as_ref(), &[x, y]);

        Ok(())
    }

    pub fn uniform3fv(&self, location: Handle, x: f32, y: f32, z: f32) -> Result<(), BridgeError> {
        let registry = self.registry.borrow();

        self.gl
            .uniform3fv(registry.uniform_locations.get(location)?.as_ref(), &[x, y, z]);

        Ok(())
    }

    pub fn uniform4fv(
        &self,
        location: Handle,
        x: f32,
        y: f32,
        z: f32,
        w: f32,
    ) -> Result<(), BridgeError> {
        let registry = self.registry.borrow();

        self.gl.uniform4fv(
            registry.uniform_locations.get(location)?.as_ref(),
            &[x, y, z, w],
        );

        Ok(())
    }

    /// Uploads `count` 4x4 matrices read from guest memory at `data_ptr`.
    pub fn uniform_matrix4fv(
        &self,
        location: Handle,
        count: u32,
        transpose: bool,
        data_ptr: u32,
    ) -> Result<(), BridgeError> {
        let floats = count
            .checked_mul(16)
            .ok_or(MemoryError::TooLarge(count as usize))?;
        let values = self.marshaler()?.read_f32s(data_ptr, floats)?;
        let registry = self.registry.borrow();

        self.gl.uniform_matrix4fv(
            registry.uniform_locations.get(location)?.as_ref(),
            transpose,
            &values,
        );

        Ok(())
    }
}

// Buffers, textures and vertex arrays.
impl<P> Bridge<P>
where
    P: Platform,
{
    /// Creates `count` native objects and writes their handles, in creation order, to the `u32`
    /// array at `out_ptr`. The output array is checked before anything is created.
    ///
    /// Nothing is registered unless every creation succeeds; objects created before a failure
    /// are deleted again.
    fn create_into<T>(
        &self,
        count: u32,
        out_ptr: u32,
        call: &'static str,
        create: fn(&P::Gl) -> Option<T>,
        delete: fn(&P::Gl, &T),
        table: fn(&mut Registry<P::Gl>) -> &mut HandleTable<T>,
    ) -> Result<(), BridgeError> {
        self.marshaler()?
            .check(View::new(Element::U32, out_ptr, count))?;

        let mut objects = Vec::with_capacity(count as usize);

        for _ in 0..count {
            match create(&self.gl) {
                Some(object) => objects.push(object),
                None => {
                    for object in &objects {
                        delete(&self.gl, object);
                    }

                    return Err(BridgeError::native(call, "returned null"));
                }
            }
        }

        let handles = {
            let mut registry = self.registry.borrow_mut();

            table(&mut registry).create_many(objects)
        };

        self.marshaler()?.write_u32s(out_ptr, &handles)?;

        Ok(())
    }

    /// Deletes every handle in the `u32` array at `ptr` with `delete`.
    ///
    /// A handle that fails to resolve does not stop the remaining deletions; the first failure is
    /// reported once all handles have been processed.
    fn delete_from<F>(&self, count: u32, ptr: u32, delete: F) -> Result<(), BridgeError>
    where
        F: Fn(&Self, Handle) -> Result<(), BridgeError>,
    {
        let handles = self.marshaler()?.read_u32s(ptr, count)?;
        let mut first_error = None;

        for handle in handles {
            if let Err(err) = delete(self, handle) {
                first_error.get_or_insert(err);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    pub fn create_buffer(&self) -> Result<Handle, BridgeError> {
        let buffer = created(self.gl.create_buffer(), "createBuffer")?;

        Ok(self.registry.borrow_mut().buffers.create(buffer))
    }

    pub fn gen_buffers(&self, count: u32, out_ptr: u32) -> Result<(), BridgeError> {
        self.create_into(
            count,
            out_ptr,
            "createBuffer",
            |gl| gl.create_buffer(),
            |gl, buffer| gl.delete_buffer(buffer),
            |registry| &mut registry.buffers,
        )
    }

    pub fn delete_buffer(&self, buffer: Handle) -> Result<(), BridgeError> {
        let buffer = self.registry.borrow_mut().buffers.delete(buffer)?;

        self.gl.delete_buffer(&buffer);

        Ok(())
    }

    pub fn delete_buffers(&self, count: u32, ptr: u32) -> Result<(), BridgeError> {
        self.delete_from(count, ptr, Self::delete_buffer)
    }

    pub fn bind_buffer(&self, target: u32, buffer: Handle) -> Result<(), BridgeError> {
        self.gl
            .bind_buffer(target, self.registry.borrow().buffers.get(buffer)?);

        Ok(())
    }

    /// Uploads `count` floats read from guest memory at `data_ptr` to the buffer bound to
    /// `target`.
    pub fn buffer_data(
        &self,
        target: u32,
        count: u32,
        data_ptr: u32,
        usage: u32,
    ) -> Result<(), BridgeError> {
        let data = self
            .marshaler()?
            .read_view(View::new(Element::F32, data_ptr, count))?;

        self.gl.buffer_data(target, &data, usage);

        Ok(())
    }

    pub fn create_texture(&self) -> Result<Handle, BridgeError> {
        let texture = created(self.gl.create_texture(), "createTexture")?;

        Ok(self.registry.borrow_mut().textures.create(texture))
    }

    pub fn gen_textures(&self, count: u32, out_ptr: u32) -> Result<(), BridgeError> {
        self.create_into(
            count,
            out_ptr,
            "createTexture",
            |gl| gl.create_texture(),
            |gl, texture| gl.delete_texture(texture),
            |registry| &mut registry.textures,
        )
    }

    pub fn delete_texture(&self, texture: Handle) -> Result<(), BridgeError> {
        let texture = self.registry.borrow_mut().textures.delete(texture)?;

        self.gl.delete_texture(&texture);

        Ok(())
    }

    pub fn delete_textures(&self, count: u32, ptr: u32) -> Result<(), BridgeError> {
        self.delete_from(count, ptr, Self::delete_texture)
    }

    pub fn bind_texture(&self, target: u32, texture: Handle) -> Result<(), BridgeError> {
        self.gl
            .bind_texture(target, self.registry.borrow().textures.get(texture)?);

        Ok(())
    }

    /// Uploads `data_len` bytes read from guest memory at `data_ptr` to the texture bound to
    /// `image.target`. A zero-length upload only allocates the texture's storage.
    pub fn tex_image_2d(
        &self,
        image: &TexImage2D,
        data_ptr: u32,
        data_len: u32,
    ) -> Result<(), BridgeError> {
        let data = if data_len == 0 {
            None
        } else {
            Some(self.marshaler()?.read_bytes(data_ptr, data_len)?)
        };

        self.gl
            .tex_image_2d(image, data.as_deref())
            .map_err(|message| BridgeError::native("texImage2D", message))
    }

    pub fn tex_parameteri(&self, target: u32, pname: u32, param: i32) {
        self.gl.tex_parameteri(target, pname, param);
    }

    pub fn active_texture(&self, unit: u32) {
        self.gl.active_texture(unit);
    }

    pub fn create_vertex_array(&self) -> Result<Handle, BridgeError> {
        let vertex_array = created(self.gl.create_vertex_array(), "createVertexArray")?;

        Ok(self.registry.borrow_mut().vertex_arrays.create(vertex_array))
    }

    pub fn gen_vertex_arrays(&self, count: u32, out_ptr: u32) -> Result<(), BridgeError> {
        self.create_into(
            count,
            out_ptr,
            "createVertexArray",
            |gl| gl.create_vertex_array(),
            |gl, vertex_array| gl.delete_vertex_array(vertex_array),
            |registry| &mut registry.vertex_arrays,
        )
    }

    pub fn delete_vertex_array(&self, vertex_array: Handle) -> Result<(), BridgeError> {
        let vertex_array = self
            .registry
            .borrow_mut()
            .vertex_arrays
            .delete(vertex_array)?;

        self.gl.delete_vertex_array(&vertex_array);

        Ok(())
    }

    pub fn delete_vertex_arrays(&self, count: u32, ptr: u32) -> Result<(), BridgeError> {
        self.delete_from(count, ptr, Self::delete_vertex_array)
    }

    pub fn bind_vertex_array(&self, vertex_array: Handle) -> Result<(), BridgeError> {
        self.gl
            .bind_vertex_array(self.registry.borrow().vertex_arrays.get(vertex_array)?);

        Ok(())
    }
}

// Fixed-function state and drawing.
impl<P> Bridge<P>
where
    P: Platform,
{
    pub fn enable_vertex_attrib_array(&self, index: u32) {
        self.gl.enable_vertex_attrib_array(index);
    }

    pub fn vertex_attrib_pointer(
        &self,
        index: u32,
        size: i32,
        kind: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    ) {
        self.gl
            .vertex_attrib_pointer(index, size, kind, normalized, stride, offset);
    }

    pub fn draw_arrays(&self, mode: u32, first: i32, count: i32) {
        self.gl.draw_arrays(mode, first, count);
    }

    pub fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.gl.viewport(x, y, width, height);
    }

    pub fn clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        self.gl.clear_color(r, g, b, a);
    }

    pub fn clear(&self, mask: u32) {
        self.gl.clear(mask);
    }

    pub fn enable(&self, cap: u32) {
        self.gl.enable(cap);
    }

    pub fn disable(&self, cap: u32) {
        self.gl.disable(cap);
    }

    pub fn depth_func(&self, func: u32) {
        self.gl.depth_func(func);
    }

    pub fn blend_func(&self, src: u32, dst: u32) {
        self.gl.blend_func(src, dst);
    }

    pub fn pixel_storei(&self, pname: u32, param: i32) {
        self.gl.pixel_storei(pname, param);
    }

    pub fn get_error(&self) -> u32 {
        self.gl.get_error()
    }
}
