use web_sys::{
    WebGl2RenderingContext as Gl, WebGlBuffer, WebGlProgram, WebGlShader, WebGlTexture,
    WebGlUniformLocation, WebGlVertexArrayObject,
};

use crate::graphics::{ActiveUniform, GraphicsApi, TexImage2D};
use crate::runtime::js_message;

impl GraphicsApi for Gl {
    type Shader = WebGlShader;
    type Program = WebGlProgram;
    type Buffer = WebGlBuffer;
    type Texture = WebGlTexture;
    type VertexArray = WebGlVertexArrayObject;
    type UniformLocation = WebGlUniformLocation;

    fn create_shader(&self, kind: u32) -> Option<WebGlShader> {
        Gl::create_shader(self, kind)
    }

    fn shader_source(&self, shader: &WebGlShader, source: &str) {
        Gl::shader_source(self, shader, source);
    }

    fn compile_shader(&self, shader: &WebGlShader) {
        Gl::compile_shader(self, shader);
    }

    fn shader_compiled(&self, shader: &WebGlShader) -> bool {
        self.get_shader_parameter(shader, Gl::COMPILE_STATUS)
            .as_bool()
            .unwrap_or(false)
    }

    fn shader_info_log(&self, shader: &WebGlShader) -> Option<String> {
        self.get_shader_info_log(shader)
    }

    fn delete_shader(&self, shader: &WebGlShader) {
        Gl::delete_shader(self, Some(shader));
    }

    fn create_program(&self) -> Option<WebGlProgram> {
        Gl::create_program(self)
    }

    fn attach_shader(&self, program: &WebGlProgram, shader: &WebGlShader) {
        Gl::attach_shader(self, program, shader);
    }

    fn detach_shader(&self, program: &WebGlProgram, shader: &WebGlShader) {
        Gl::detach_shader(self, program, shader);
    }

    fn link_program(&self, program: &WebGlProgram) {
        Gl::link_program(self, program);
    }

    fn program_linked(&self, program: &WebGlProgram) -> bool {
        self.get_program_parameter(program, Gl::LINK_STATUS)
            .as_bool()
            .unwrap_or(false)
    }

    fn program_info_log(&self, program: &WebGlProgram) -> Option<String> {
        self.get_program_info_log(program)
    }

    fn program_parameter(&self, program: &WebGlProgram, pname: u32) -> f64 {
        let value = self.get_program_parameter(program, pname);

        match value.as_bool() {
            Some(flag) => f64::from(u8::from(flag)),
            None => value.as_f64().unwrap_or(0.0),
        }
    }

    fn use_program(&self, program: &WebGlProgram) {
        Gl::use_program(self, Some(program));
    }

    fn delete_program(&self, program: &WebGlProgram) {
        Gl::delete_program(self, Some(program));
    }

    fn attrib_location(&self, program: &WebGlProgram, name: &str) -> i32 {
        self.get_attrib_location(program, name)
    }

    fn uniform_location(&self, program: &WebGlProgram, name: &str) -> Option<WebGlUniformLocation> {
        self.get_uniform_location(program, name)
    }

    fn active_uniform(&self, program: &WebGlProgram, index: u32) -> Option<ActiveUniform> {
        self.get_active_uniform(program, index)
            .map(|info| ActiveUniform {
                name: info.name(),
                size: info.size(),
                kind: info.type_(),
            })
    }

    fn uniform1f(&self, location: Option<&WebGlUniformLocation>, x: f32) {
        Gl::uniform1f(self, location, x);
    }

    fn uniform1i(&self, location: Option<&WebGlUniformLocation>, x: i32) {
        Gl::uniform1i(self, location, x);
    }

    fn uniform2fv(&self, location: Option<&WebGlUniformLocation>, values: &[f32; 2]) {
        self.uniform2fv_with_f32_array(location, values);
    }

    fn uniform3fv(&self, location: Option<&WebGlUniformLocation>, values: &[f32; 3]) {
        self.uniform3fv_with_f32_array(location, values);
    }

    fn uniform4fv(&self, location: Option<&WebGlUniformLocation>, values: &[f32; 4]) {
        self.uniform4fv_with_f32_array(location, values);
    }

    fn uniform_matrix4fv(
        &self,
        location: Option<&WebGlUniformLocation>,
        transpose: bool,
        values: &[f32],
    ) {
        self.uniform_matrix4fv_with_f32_array(location, transpose, values);
    }

    fn create_buffer(&self) -> Option<WebGlBuffer> {
        Gl::create_buffer(self)
    }

    fn bind_buffer(&self, target: u32, buffer: &WebGlBuffer) {
        Gl::bind_buffer(self, target, Some(buffer));
    }

    fn buffer_data(&self, target: u32, data: &[u8], usage: u32) {
        self.buffer_data_with_u8_array(target, data, usage);
    }

    fn delete_buffer(&self, buffer: &WebGlBuffer) {
        Gl::delete_buffer(self, Some(buffer));
    }

    fn create_texture(&self) -> Option<WebGlTexture> {
        Gl::create_texture(self)
    }

    fn bind_texture(&self, target: u32, texture: &WebGlTexture) {
        Gl::bind_texture(self, target, Some(texture));
    }

    fn delete_texture(&self, texture: &WebGlTexture) {
        Gl::delete_texture(self, Some(texture));
    }

    fn tex_image_2d(&self, image: &TexImage2D, data: Option<&[u8]>) -> Result<(), String> {
        self.tex_image_2d_with_i32_and_i32_and_i32_and_format_and_type_and_opt_u8_array(
            image.target,
            image.level,
            image.internal_format,
            image.width,
            image.height,
            image.border,
            image.format,
            image.kind,
            data,
        )
        .map_err(|err| js_message(&err))
    }

    fn tex_parameteri(&self, target: u32, pname: u32, param: i32) {
        Gl::tex_parameteri(self, target, pname, param);
    }

    fn active_texture(&self, unit: u32) {
        Gl::active_texture(self, unit);
    }

    fn create_vertex_array(&self) -> Option<WebGlVertexArrayObject> {
        Gl::create_vertex_array(self)
    }

    fn bind_vertex_array(&self, vertex_array: &WebGlVertexArrayObject) {
        Gl::bind_vertex_array(self, Some(vertex_array));
    }

    fn delete_vertex_array(&self, vertex_array: &WebGlVertexArrayObject) {
        Gl::delete_vertex_array(self, Some(vertex_array));
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        Gl::enable_vertex_attrib_array(self, index);
    }

    fn vertex_attrib_pointer(
        &self,
        index: u32,
        size: i32,
        kind: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    ) {
        self.vertex_attrib_pointer_with_i32(index, size, kind, normalized, stride, offset);
    }

    fn draw_arrays(&self, mode: u32, first: i32, count: i32) {
        Gl::draw_arrays(self, mode, first, count);
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        Gl::viewport(self, x, y, width, height);
    }

    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        Gl::clear_color(self, r, g, b, a);
    }

    fn clear(&self, mask: u32) {
        Gl::clear(self, mask);
    }

    fn enable(&self, cap: u32) {
        Gl::enable(self, cap);
    }

    fn disable(&self, cap: u32) {
        Gl::disable(self, cap);
    }

    fn depth_func(&self, func: u32) {
        Gl::depth_func(self, func);
    }

    fn blend_func(&self, src: u32, dst: u32) {
        Gl::blend_func(self, src, dst);
    }

    fn pixel_storei(&self, pname: u32, param: i32) {
        Gl::pixel_storei(self, pname, param);
    }

    fn get_error(&self) -> u32 {
        Gl::get_error(self)
    }
}
