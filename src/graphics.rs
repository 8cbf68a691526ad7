//! The native graphics operations the capability surface forwards to.
//!
//! [GraphicsApi] mirrors the subset of the WebGL 2.0 API the guest may reach. Enum parameters are
//! passed through as raw GL constants: the bridge never interprets them.

/// Properties of an active uniform reported by program introspection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveUniform {
    pub name: String,
    pub size: i32,
    pub kind: u32,
}

/// Parameters of a `texImage2D` upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TexImage2D {
    pub target: u32,
    pub level: i32,
    pub internal_format: i32,
    pub width: i32,
    pub height: i32,
    pub border: i32,
    pub format: u32,
    pub kind: u32,
}

pub trait GraphicsApi {
    type Shader;
    type Program;
    type Buffer;
    type Texture;
    type VertexArray;
    type UniformLocation;

    fn create_shader(&self, kind: u32) -> Option<Self::Shader>;

    fn shader_source(&self, shader: &Self::Shader, source: &str);

    fn compile_shader(&self, shader: &Self::Shader);

    fn shader_compiled(&self, shader: &Self::Shader) -> bool;

    fn shader_info_log(&self, shader: &Self::Shader) -> Option<String>;

    fn delete_shader(&self, shader: &Self::Shader);

    fn create_program(&self) -> Option<Self::Program>;

    fn attach_shader(&self, program: &Self::Program, shader: &Self::Shader);

    fn detach_shader(&self, program: &Self::Program, shader: &Self::Shader);

    fn link_program(&self, program: &Self::Program);

    fn program_linked(&self, program: &Self::Program) -> bool;

    fn program_info_log(&self, program: &Self::Program) -> Option<String>;

    /// Queries a program parameter; boolean parameters are reported as `0.0` or `1.0`.
    fn program_parameter(&self, program: &Self::Program, pname: u32) -> f64;

    fn use_program(&self, program: &Self::Program);

    fn delete_program(&self, program: &Self::Program);

    fn attrib_location(&self, program: &Self::Program, name: &str) -> i32;

    fn uniform_location(&self, program: &Self::Program, name: &str)
        -> Option<Self::UniformLocation>;

    fn active_uniform(&self, program: &Self::Program, index: u32) -> Option<ActiveUniform>;

    fn uniform1f(&self, location: Option<&Self::UniformLocation>, x: f32);

    fn uniform1i(&self, location: Option<&Self::UniformLocation>, x: i32);

    fn uniform2fv(&self, location: Option<&Self::UniformLocation>, values: &[f32; 2]);

    fn uniform3fv(&self, location: Option<&Self::UniformLocation>, values: &[f32; 3]);

    fn uniform4fv(&self, location: Option<&Self::UniformLocation>, values: &[f32; 4]);

    fn uniform_matrix4fv(
        &self,
        location: Option<&Self::UniformLocation>,
        transpose: bool,
        values: &[f32],
    );

    fn create_buffer(&self) -> Option<Self::Buffer>;

    fn bind_buffer(&self, target: u32, buffer: &Self::Buffer);

    fn buffer_data(&self, target: u32, data: &[u8], usage: u32);

    fn delete_buffer(&self, buffer: &Self::Buffer);

    fn create_texture(&self) -> Option<Self::Texture>;

    fn bind_texture(&self, target: u32, texture: &Self::Texture);

    fn delete_texture(&self, texture: &Self::Texture);

    fn tex_image_2d(&self, image: &TexImage2D, data: Option<&[u8]>) -> Result<(), String>;

    fn tex_parameteri(&self, target: u32, pname: u32, param: i32);

    fn active_texture(&self, unit: u32);

    fn create_vertex_array(&self) -> Option<Self::VertexArray>;

    fn bind_vertex_array(&self, vertex_array: &Self::VertexArray);

    fn delete_vertex_array(&self, vertex_array: &Self::VertexArray);

    fn enable_vertex_attrib_array(&self, index: u32);

    fn vertex_attrib_pointer(
        &self,
        index: u32,
        size: i32,
        kind: u32,
        normalized: bool,
        stride: i32,
        offset: i32,
    );

    fn draw_arrays(&self, mode: u32, first: i32, count: i32);

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);

    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32);

    fn clear(&self, mask: u32);

    fn enable(&self, cap: u32);

    fn disable(&self, cap: u32);

    fn depth_func(&self, func: u32);

    fn blend_func(&self, src: u32, dst: u32);

    fn pixel_storei(&self, pname: u32, param: i32);

    fn get_error(&self) -> u32;
}
