//! The `env` import object handed to the guest at instantiation.
//!
//! Every import is a Rust closure taking its arguments as one array. A small JS adapter collects
//! the guest's positional arguments into that array, so imports of any arity share a single
//! closure type.
//!
//! Registry errors are logged and answered with a neutral value. Any other error is thrown into
//! the guest, aborting the guest call that issued the import; all bridge borrows have been
//! released by the time it is thrown.

use std::rc::Rc;

use js_sys::{Array, Function, Object, Reflect};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsValue;

use crate::error::BridgeError;
use crate::graphics::TexImage2D;
use crate::runtime::WebBridge;

type ImportFn = Closure<dyn FnMut(Array) -> JsValue>;

/// Positional import arguments as the guest passed them.
struct Args(Array);

impl Args {
    fn f64(&self, index: u32) -> f64 {
        let value = self.0.get(index);

        match value.as_bool() {
            Some(flag) => f64::from(u8::from(flag)),
            None => value.as_f64().unwrap_or(0.0),
        }
    }

    fn i32(&self, index: u32) -> i32 {
        self.f64(index) as i32
    }

    /// Pointers, lengths, handles and GL enums arrive as `i32` and are reinterpreted bitwise.
    fn u32(&self, index: u32) -> u32 {
        self.i32(index) as u32
    }

    fn f32(&self, index: u32) -> f32 {
        self.f64(index) as f32
    }

    fn bool(&self, index: u32) -> bool {
        self.f64(index) != 0.0
    }
}

fn guarded<T>(name: &str, fallback: JsValue, result: Result<T, BridgeError>) -> JsValue
where
    T: Into<JsValue>,
{
    match result {
        Ok(value) => value.into(),
        Err(err) if !err.is_fatal() => {
            log::warn!("{}: {}", name, err);

            fallback
        }
        Err(err) => wasm_bindgen::throw_str(&format!("{}: {}", name, err)),
    }
}

fn guarded_unit(name: &str, result: Result<(), BridgeError>) -> JsValue {
    guarded(name, JsValue::UNDEFINED, result.map(|()| JsValue::UNDEFINED))
}

/// The import object and the closures backing it.
///
/// The closures are released when this is dropped; the guest must not call any import after
/// that.
pub struct Imports {
    object: Object,
    closures: Vec<ImportFn>,
    adapter: Function,
}

impl Imports {
    pub fn new(bridge: &Rc<WebBridge>) -> Result<Self, JsValue> {
        let env = Object::new();
        let object = Object::new();

        Reflect::set(&object, &JsValue::from_str("env"), &env)?;

        let mut imports = Imports {
            object,
            closures: Vec::new(),
            adapter: Function::new_with_args(
                "f",
                "return function() { return f(Array.prototype.slice.call(arguments)); };",
            ),
        };

        imports.register_runtime(&env, bridge)?;
        imports.register_graphics(&env, bridge)?;

        log::debug!("registered {} guest imports", imports.closures.len());

        Ok(imports)
    }

    /// The `{ env }` object to instantiate the guest with.
    pub fn object(&self) -> &Object {
        &self.object
    }

    fn register<F>(&mut self, env: &Object, name: &'static str, import: F) -> Result<(), JsValue>
    where
        F: FnMut(Args) -> JsValue + 'static,
    {
        let mut import = import;
        let closure: ImportFn = Closure::wrap(
            Box::new(move |args: Array| import(Args(args))) as Box<dyn FnMut(Array) -> JsValue>
        );
        let function = self.adapter.call1(&JsValue::NULL, closure.as_ref())?;

        Reflect::set(env, &JsValue::from_str(name), &function)?;
        self.closures.push(closure);

        Ok(())
    }

    fn register_runtime(&mut self, env: &Object, bridge: &Rc<WebBridge>) -> Result<(), JsValue> {
        let b = bridge.clone();
        self.register(env, "consoleLog", move |args| {
            b.console_log(args.f64(0));

            JsValue::UNDEFINED
        })?;

        let b = bridge.clone();
        self.register(env, "consoleLogS", move |args| {
            guarded_unit("consoleLogS", b.console_log_str(args.u32(0), args.u32(1)))
        })?;

        let b = bridge.clone();
        self.register(env, "getRandomSeed", move |_| JsValue::from(b.random_seed()))?;

        let b = bridge.clone();
        self.register(env, "getRandomString", move |args| {
            guarded(
                "getRandomString",
                JsValue::from(0),
                b.random_string(args.u32(0), args.u32(1)),
            )
        })?;

        let b = bridge.clone();
        self.register(env, "debugBreak", move |_| {
            b.debug_break();

            JsValue::UNDEFINED
        })?;

        let b = bridge.clone();
        self.register(env, "fetchBytes", move |args| {
            guarded_unit(
                "fetchBytes",
                b.fetch_bytes(args.u32(0), args.u32(1), args.u32(2))
                    .map(|_| ()),
            )
        })?;

        let b = bridge.clone();
        self.register(env, "onEquationResultJSON", move |args| {
            guarded_unit(
                "onEquationResultJSON",
                b.log_equation_result(args.u32(0), args.u32(1)).map(|_| ()),
            )
        })?;

        Ok(())
    }

    fn register_graphics(&mut self, env: &Object, bridge: &Rc<WebBridge>) -> Result<(), JsValue> {
        let b = bridge.clone();
        self.register(env, "glInitShader", move |args| {
            guarded(
                "glInitShader",
                JsValue::from(0),
                b.init_shader(args.u32(0), args.u32(1), args.u32(2)),
            )
        })?;

        let b = bridge.clone();
        self.register(env, "glLinkShaderProgram", move |args| {
            guarded(
                "glLinkShaderProgram",
                JsValue::from(0),
                b.link_shader_program(args.u32(0), args.u32(1)),
            )
        })?;

        let b = bridge.clone();
        self.register(env, "glDeleteProgram", move |args| {
            guarded_unit("glDeleteProgram", b.delete_program(args.u32(0)))
        })?;

        let b = bridge.clone();
        self.register(env, "glDetachShader", move |args| {
            guarded_unit("glDetachShader", b.detach_shader(args.u32(0), args.u32(1)))
        })?;

        let b = bridge.clone();
        self.register(env, "glDeleteShader", move |args| {
            guarded_unit("glDeleteShader", b.delete_shader(args.u32(0)))
        })?;

        let b = bridge.clone();
        self.register(env, "glUseProgram", move |args| {
            guarded_unit("glUseProgram", b.use_program(args.u32(0)))
        })?;

        let b = bridge.clone();
        self.register(env, "glGetProgramParameter", move |args| {
            guarded(
                "glGetProgramParameter",
                JsValue::from(0),
                b.program_parameter(args.u32(0), args.u32(1)),
            )
        })?;

        let b = bridge.clone();
        self.register(env, "glGetAttribLocation", move |args| {
            guarded(
                "glGetAttribLocation",
                JsValue::from(-1),
                b.attrib_location(args.u32(0), args.u32(1), args.u32(2)),
            )
        })?;

        let b = bridge.clone();
        self.register(env, "glGetUniformLocation", move |args| {
            guarded(
                "glGetUniformLocation",
                JsValue::from(0),
                b.uniform_location(args.u32(0), args.u32(1), args.u32(2)),
            )
        })?;

        let b = bridge.clone();
        self.register(env, "glGetActiveUniform", move |args| {
            guarded_unit(
                "glGetActiveUniform",
                b.active_uniform(
                    args.u32(0),
                    args.u32(1),
                    args.u32(2),
                    args.u32(3),
                    args.u32(4),
                    args.u32(5),
                    args.u32(6),
                ),
            )
        })?;

        let b = bridge.clone();
        self.register(env, "glUniform1f", move |args| {
            guarded_unit("glUniform1f", b.uniform1f(args.u32(0), args.f32(1)))
        })?;

        let b = bridge.clone();
        self.register(env, "glUniform1i", move |args| {
            guarded_unit("glUniform1i", b.uniform1i(args.u32(0), args.i32(1)))
        })?;

        let b = bridge.clone();
        self.register(env, "glUniform2fv", move |args| {
            guarded_unit(
                "glUniform2fv",
                b.uniform2fv(args.u32(0), args.f32(1), args.f32(2)),
            )
        })?;

        let b = bridge.clone();
        self.register(env, "glUniform3fv", move |args| {
            guarded_unit(
                "glUniform3fv",
                b.uniform3fv(args.u32(0), args.f32(1), args.f32(2), args.f32(3)),
            )
        })?;

        let b = bridge.clone();
        self.register(env, "glUniform4fv", move |args| {
            guarded_unit(
                "glUniform4fv",
                b.uniform4fv(
                    args.u32(0),
                    args.f32(1),
                    args.f32(2),
                    args.f32(3),
                    args.f32(4),
                ),
            )
        })?;

        let b = bridge.clone();
        self.register(env, "glUniformMatrix4fv", move |args| {
            guarded_unit(
                "glUniformMatrix4fv",
                b.uniform_matrix4fv(args.u32(0), args.u32(1), args.bool(2), args.u32(3)),
            )
        })?;

        let b = bridge.clone();
        self.register(env, "glCreateBuffer", move |_| {
            guarded("glCreateBuffer", JsValue::from(0), b.create_buffer())
        })?;

        let b = bridge.clone();
        self.register(env, "glGenBuffers", move |args| {
            guarded_unit("glGenBuffers", b.gen_buffers(args.u32(0), args.u32(1)))
        })?;

        let b = bridge.clone();
        self.register(env, "glDeleteBuffer", move |args| {
            guarded_unit("glDeleteBuffer", b.delete_buffer(args.u32(0)))
        })?;

        let b = bridge.clone();
        self.register(env, "glDeleteBuffers", move |args| {
            guarded_unit(
                "glDeleteBuffers",
                b.delete_buffers(args.u32(0), args.u32(1)),
            )
        })?;

        let b = bridge.clone();
        self.register(env, "glBindBuffer", move |args| {
            guarded_unit("glBindBuffer", b.bind_buffer(args.u32(0), args.u32(1)))
        })?;

        let b = bridge.clone();
        self.register(env, "glBufferData", move |args| {
            guarded_unit(
                "glBufferData",
                b.buffer_data(args.u32(0), args.u32(1), args.u32(2), args.u32(3)),
            )
        })?;

        let b = bridge.clone();
        self.register(env, "glCreateTexture", move |_| {
            guarded("glCreateTexture", JsValue::from(0), b.create_texture())
        })?;

        let b = bridge.clone();
        self.register(env, "glGenTextures", move |args| {
            guarded_unit("glGenTextures", b.gen_textures(args.u32(0), args.u32(1)))
        })?;

        let b = bridge.clone();
        self.register(env, "glDeleteTexture", move |args| {
            guarded_unit("glDeleteTexture", b.delete_texture(args.u32(0)))
        })?;

        let b = bridge.clone();
        self.register(env, "glDeleteTextures", move |args| {
            guarded_unit(
                "glDeleteTextures",
                b.delete_textures(args.u32(0), args.u32(1)),
            )
        })?;

        let b = bridge.clone();
        self.register(env, "glBindTexture", move |args| {
            guarded_unit("glBindTexture", b.bind_texture(args.u32(0), args.u32(1)))
        })?;

        let b = bridge.clone();
        self.register(env, "glTexImage2D", move |args| {
            let image = TexImage2D {
                target: args.u32(0),
                level: args.i32(1),
                internal_format: args.i32(2),
                width: args.i32(3),
                height: args.i32(4),
                border: args.i32(5),
                format: args.u32(6),
                kind: args.u32(7),
            };

            guarded_unit(
                "glTexImage2D",
                b.tex_image_2d(&image, args.u32(8), args.u32(9)),
            )
        })?;

        let b = bridge.clone();
        self.register(env, "glTexParameteri", move |args| {
            b.tex_parameteri(args.u32(0), args.u32(1), args.i32(2));

            JsValue::UNDEFINED
        })?;

        let b = bridge.clone();
        self.register(env, "glActiveTexture", move |args| {
            b.active_texture(args.u32(0));

            JsValue::UNDEFINED
        })?;

        let b = bridge.clone();
        self.register(env, "glCreateVertexArray", move |_| {
            guarded(
                "glCreateVertexArray",
                JsValue::from(0),
                b.create_vertex_array(),
            )
        })?;

        let b = bridge.clone();
        self.register(env, "glGenVertexArrays", move |args| {
            guarded_unit(
                "glGenVertexArrays",
                b.gen_vertex_arrays(args.u32(0), args.u32(1)),
            )
        })?;

        let b = bridge.clone();
        self.register(env, "glDeleteVertexArray", move |args| {
            guarded_unit("glDeleteVertexArray", b.delete_vertex_array(args.u32(0)))
        })?;

        let b = bridge.clone();
        self.register(env, "glDeleteVertexArrays", move |args| {
            guarded_unit(
                "glDeleteVertexArrays",
                b.delete_vertex_arrays(args.u32(0), args.u32(1)),
            )
        })?;

        let b = bridge.clone();
        self.register(env, "glBindVertexArray", move |args| {
            guarded_unit("glBindVertexArray", b.bind_vertex_array(args.u32(0)))
        })?;

        let b = bridge.clone();
        self.register(env, "glEnableVertexAttribArray", move |args| {
            b.enable_vertex_attrib_array(args.u32(0));

            JsValue::UNDEFINED
        })?;

        let b = bridge.clone();
        self.register(env, "glVertexAttribPointer", move |args| {
            b.vertex_attrib_pointer(
                args.u32(0),
                args.i32(1),
                args.u32(2),
                args.bool(3),
                args.i32(4),
                args.i32(5),
            );

            JsValue::UNDEFINED
        })?;

        let b = bridge.clone();
        self.register(env, "glDrawArrays", move |args| {
            b.draw_arrays(args.u32(0), args.i32(1), args.i32(2));

            JsValue::UNDEFINED
        })?;

        let b = bridge.clone();
        self.register(env, "glViewport", move |args| {
            b.viewport(args.i32(0), args.i32(1), args.i32(2), args.i32(3));

            JsValue::UNDEFINED
        })?;

        let b = bridge.clone();
        self.register(env, "glClearColor", move |args| {
            b.clear_color(args.f32(0), args.f32(1), args.f32(2), args.f32(3));

            JsValue::UNDEFINED
        })?;

        let b = bridge.clone();
        self.register(env, "glClear", move |args| {
            b.clear(args.u32(0));

            JsValue::UNDEFINED
        })?;

        let b = bridge.clone();
        self.register(env, "glEnable", move |args| {
            b.enable(args.u32(0));

            JsValue::UNDEFINED
        })?;

        let b = bridge.clone();
        self.register(env, "glDisable", move |args| {
            b.disable(args.u32(0));

            JsValue::UNDEFINED
        })?;

        let b = bridge.clone();
        self.register(env, "glDepthFunc", move |args| {
            b.depth_func(args.u32(0));

            JsValue::UNDEFINED
        })?;

        let b = bridge.clone();
        self.register(env, "glBlendFunc", move |args| {
            b.blend_func(args.u32(0), args.u32(1));

            JsValue::UNDEFINED
        })?;

        let b = bridge.clone();
        self.register(env, "glPixelStorei", move |args| {
            b.pixel_storei(args.u32(0), args.i32(1));

            JsValue::UNDEFINED
        })?;

        let b = bridge.clone();
        self.register(env, "glGetError", move |_| JsValue::from(b.get_error()))?;

        Ok(())
    }
}
