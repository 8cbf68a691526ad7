//! In-process stand-ins for every platform seam, used by the unit tests.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use futures::executor::{LocalPool, LocalSpawner};
use futures::future::{FutureExt, LocalBoxFuture};
use futures::task::LocalSpawnExt;

use crate::bridge::{Bridge, Host, Platform};
use crate::error::{FetchError, GuestError};
use crate::fetch::{DecodedImage, ImageLoader};
use crate::graphics::{ActiveUniform, GraphicsApi, TexImage2D};
use crate::guest::{EntryPoint, Guest};
use crate::memory::LinearMemory;

const ALLOC_ALIGN: u32 = 8;
const PAGE: usize = 64;

#[derive(Debug, Default)]
pub struct VecMemory {
    bytes: RefCell<Vec<u8>>,
}

impl VecMemory {
    pub fn new(len: usize) -> Self {
        VecMemory {
            bytes: RefCell::new(vec![0; len]),
        }
    }

    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes.borrow().clone()
    }

    pub fn grow(&self, len: usize) {
        let mut bytes = self.bytes.borrow_mut();

        if bytes.len() < len {
            bytes.resize(len, 0);
        }
    }
}

impl LinearMemory for VecMemory {
    fn byte_len(&self) -> usize {
        self.bytes.borrow().len()
    }

    fn read(&self, offset: usize, dst: &mut [u8]) {
        dst.copy_from_slice(&self.bytes.borrow()[offset..offset + dst.len()]);
    }

    fn write(&self, offset: usize, src: &[u8]) {
        self.bytes.borrow_mut()[offset..offset + src.len()].copy_from_slice(src);
    }
}

/// A guest with a bump allocator that records every entry point call.
///
/// Allocations that do not fit grow the memory, the way a real allocator would.
#[derive(Debug)]
pub struct RecordingGuest {
    memory: VecMemory,
    next: Cell<u32>,
    allocations: RefCell<Vec<u32>>,
    calls: RefCell<Vec<EntryPoint>>,
    failing: RefCell<Vec<&'static str>>,
}

impl RecordingGuest {
    pub fn new(memory_len: usize) -> Self {
        RecordingGuest {
            memory: VecMemory::new(memory_len),
            next: Cell::new(ALLOC_ALIGN),
            allocations: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
            failing: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<EntryPoint> {
        self.calls.borrow().clone()
    }

    /// The lengths of all allocations requested so far, in order.
    pub fn allocations(&self) -> Vec<u32> {
        self.allocations.borrow().clone()
    }

    /// Makes every later call of `export` trap.
    pub fn fail_on(&self, export: &'static str) {
        self.failing.borrow_mut().push(export);
    }
}

impl Guest for RecordingGuest {
    type Memory = VecMemory;

    fn memory(&self) -> &VecMemory {
        &self.memory
    }

    fn alloc(&self, len: u32) -> Result<u32, GuestError> {
        let ptr = (self.next.get() + ALLOC_ALIGN - 1) / ALLOC_ALIGN * ALLOC_ALIGN;
        let end = ptr + len;

        if end as usize > self.memory.byte_len() {
            self.memory.grow((end as usize + PAGE - 1) / PAGE * PAGE);
        }

        self.next.set(end);
        self.allocations.borrow_mut().push(len);

        Ok(ptr)
    }

    fn call(&self, entry: EntryPoint) -> Result<(), GuestError> {
        self.calls.borrow_mut().push(entry);

        let export = entry.export_name();

        if self.failing.borrow().contains(&export) {
            return Err(GuestError::Trap {
                export,
                message: "unreachable executed".into(),
            });
        }

        Ok(())
    }
}

/// A graphics backend that hands out numbered objects and records every call it receives.
#[derive(Debug)]
pub struct FakeGl {
    next_object: Cell<u32>,
    calls: RefCell<Vec<String>>,
    compile_error: RefCell<Option<String>>,
    link_error: RefCell<Option<String>>,
    uniforms: RefCell<Vec<ActiveUniform>>,
    attribs: RefCell<HashMap<String, i32>>,
    remaining: Cell<Option<u32>>,
}

impl Default for FakeGl {
    fn default() -> Self {
        FakeGl {
            next_object: Cell::new(100),
            calls: RefCell::new(Vec::new()),
            compile_error: RefCell::new(None),
            link_error: RefCell::new(None),
            uniforms: RefCell::new(Vec::new()),
            attribs: RefCell::new(HashMap::new()),
            remaining: Cell::new(None),
        }
    }
}

impl FakeGl {
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn fail_compile(&self, log: &str) {
        *self.compile_error.borrow_mut() = Some(log.to_string());
    }

    pub fn fail_link(&self, log: &str) {
        *self.link_error.borrow_mut() = Some(log.to_string());
    }

    /// Makes every later object creation fail.
    pub fn exhaust(&self) {
        self.limit_objects(0);
    }

    /// Lets `count` more objects be created before creation starts failing.
    pub fn limit_objects(&self, count: u32) {
        self.remaining.set(Some(count));
    }

    pub fn add_uniform(&self, name: &str, size: i32, kind: u32) {
        self.uniforms.borrow_mut().push(ActiveUniform {
            name: name.to_string(),
            size,
            kind,
        });
    }

    pub fn add_attrib(&self, name: &str, location: i32) {
        self.attribs.borrow_mut().insert(name.to_string(), location);
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }

    fn object(&self, kind: &str) -> Option<u32> {
        match self.remaining.get() {
            Some(0) => return None,
            Some(count) => self.remaining.set(Some(count - 1)),
            None => {}
        }

        let id = self.next_object.get();

        self.next_object.set(id + 1);
        self.record(format!("create{}() = {}", kind, id));

        Some(id)
    }
}

impl GraphicsApi for FakeGl {
    type Shader = u32;
    type Program = u32;
    type Buffer = u32;
    type Texture = u32;
    type VertexArray = u32;
    type UniformLocation = u32;

    fn create_shader(&self, _kind: u32) -> Option<u32> {
        self.object("Shader")
    }

    fn shader_source(&self, shader: &u32, source: &str) {
        self.record(format!("shaderSource({}, {:?})", shader, source));
    }

    fn compile_shader(&self, shader: &u32) {
        self.record(format!("compileShader({})", shader));
    }

    fn shader_compiled(&self, _shader: &u32) -> bool {
        self.compile_error.borrow().is_none()
    }

    fn shader_info_log(&self, _shader: &u32) -> Option<String> {
        self.compile_error.borrow().clone()
    }

    fn delete_shader(&self, shader: &u32) {
        self.record(format!("deleteShader({})", shader));
    }

    fn create_program(&self) -> Option<u32> {
        self.object("Program")
    }

    fn attach_shader(&self, program: &u32, shader: &u32) {
        self.record(format!("attachShader({}, {})", program, shader));
    }

    fn detach_shader(&self, program: &u32, shader: &u32) {
        self.record(format!("detachShader({}, {})", program, shader));
    }

    fn link_program(&self, program: &u32) {
        self.record(format!("linkProgram({})", program));
    }

    fn program_linked(&self, _program: &u32) -> bool {
        self.link_error.borrow().is_none()
    }

    fn program_info_log(&self, _program: &u32) -> Option<String> {
        self.link_error.borrow().clone()
    }

    fn program_parameter(&self, _program: &u32, pname: u32) -> f64 {
        match pname {
            // LINK_STATUS
            0x8b82 => 1.0,
            // ACTIVE_UNIFORMS
            0x8b86 => self.uniforms.borrow().len() as f64,
            _ => 0.0,
        }
    }

    fn use_program(&self, program: &u32) {
        self.record(format!("useProgram({})", program));
    }

    fn delete_program(&self, program: &u32) {
        self.record(format!("deleteProgram({})", program));
    }

    fn attrib_location(&self, _program: &u32, name: &str) -> i32 {
        self.attribs.borrow().get(name).copied().unwrap_or(-1)
    }

    fn uniform_location(&self, _program: &u32, name: &str) -> Option<u32> {
        self.uniforms
            .borrow()
            .iter()
            .position(|uniform| uniform.name == name)
            .map(|index| 500 + index as u32)
    }

    fn active_uniform(&self, _program: &u32, index: u32) -> Option<ActiveUniform> {
        self.uniforms.borrow().get(index as usize).cloned()
    }

    fn uniform1f(&self, location: Option<&u32>, x: f32) {
        self.record(format!("uniform1f({:?}, {})", location, x));
    }

    fn uniform1i(&self, location: Option<&u32>, x: i32) {
        self.record(format!("uniform1i({:?}, {})", location, x));
    }

    fn uniform2fv(&self, location: Option<&u32>, values: &[f32; 2]) {
        self.record(format!("uniform2fv({:?}, {:?})", location, values));
    }

    fn uniform3fv(&self, location: Option<&u32>, values: &[f32; 3]) {
        self.record(format!("uniform3fv({:?}, {:?})", location, values));
    }

    fn uniform4fv(&self, location: Option<&u32>, values: &[f32; 4]) {
        self.record(format!("uniform4fv({:?}, {:?})", location, values));
    }

    fn uniform_matrix4fv(&self, location: Option<&u32>, transpose: bool, values: &[f32]) {
        self.record(format!(
            "uniformMatrix4fv({:?}, {}, {:?})",
            location, transpose, values
        ));
    }

    fn create_buffer(&self) -> Option<u32> {
        self.object("Buffer")
    }

    fn bind_buffer(&self, target: u32, buffer: &u32) {
        self.record(format!("bindBuffer({:#x}, {})", target, buffer));
    }

    fn buffer_data(&self, target: u32, data: &[u8], usage: u32) {
        self.record(format!(
            "bufferData({:#x}, {:?}, {:#x})",
            target, data, usage
        ));
    }

    fn delete_buffer(&self, buffer: &u32) {
        self.record(format!("deleteBuffer({})", buffer));
    }

    fn create_texture(&self) -> Option<u32> {
        self.object("Texture")
    }

    fn bind_texture(&self, target: u32, texture: &u32) {
        self.record(format!("bindTexture({:#x}, {})", target, texture));
    }

    fn delete_texture(&self, texture: &u32) {
        self.record(format!("deleteTexture({})", texture));
    }

    fn tex_image_2d(&self, image: &TexImage2D, data: Option<&[u8]>) -> Result<(), String> {
        let expected = image.width as usize * image.height as usize * 4;

        if let Some(data) = data {
            if data.len() < expected {
                return Err(format!(
                    "expected {} bytes of pixel data, got {}",
                    expected,
                    data.len()
                ));
            }
        }

        self.record(format!(
            "texImage2D({}x{}, {:?})",
            image.width,
            image.height,
            data.map(<[u8]>::len)
        ));

        Ok(())
    }

    fn tex_parameteri(&self, target: u32, pname: u32, param: i32) {
        self.record(format!(
            "texParameteri({:#x}, {:#x}, {:#x})",
            target, pname, param
        ));
    }

    fn active_texture(&self, unit: u32) {
        self.record(format!("activeTexture({:#x})", unit));
    }

    fn create_vertex_array(&self) -> Option<u32> {
        self.object("VertexArray")
    }

    fn bind_vertex_array(&self, vertex_array: &u32) {
        self.record(format!("bindVertexArray({})", vertex_array));
    }

    fn delete_vertex_array(&self, vertex_array: &u32) {
        self.record(format!("deleteVertexArray({})", vertex_array));
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        self.record(format!("enableVertexAttribArray({})", index));
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
        self.record(format!(
            "vertexAttribPointer({}, {}, {:#x}, {}, {}, {})",
            index, size, kind, normalized, stride, offset
        ));
    }

    fn draw_arrays(&self, mode: u32, first: i32, count: i32) {
        self.record(format!("drawArrays({}, {}, {})", mode, first, count));
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.record(format!("viewport({}, {}, {}, {})", x, y, width, height));
    }

    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        self.record(format!("clearColor({}, {}, {}, {})", r, g, b, a));
    }

    fn clear(&self, mask: u32) {
        self.record(format!("clear({:#x})", mask));
    }

    fn enable(&self, cap: u32) {
        self.record(format!("enable({:#x})", cap));
    }

    fn disable(&self, cap: u32) {
        self.record(format!("disable({:#x})", cap));
    }

    fn depth_func(&self, func: u32) {
        self.record(format!("depthFunc({:#x})", func));
    }

    fn blend_func(&self, src: u32, dst: u32) {
        self.record(format!("blendFunc({:#x}, {:#x})", src, dst));
    }

    fn pixel_storei(&self, pname: u32, param: i32) {
        self.record(format!("pixelStorei({:#x}, {})", pname, param));
    }

    fn get_error(&self) -> u32 {
        0
    }
}

/// A host whose task queues only advance when a test pumps them.
pub struct QueueHost {
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
    deferred: RefCell<VecDeque<Box<dyn FnOnce()>>>,
    random: Cell<f64>,
    breaks: Cell<u32>,
}

impl QueueHost {
    pub fn new() -> Self {
        let pool = LocalPool::new();
        let spawner = pool.spawner();

        QueueHost {
            pool: RefCell::new(pool),
            spawner,
            deferred: RefCell::new(VecDeque::new()),
            random: Cell::new(0.5),
            breaks: Cell::new(0),
        }
    }

    pub fn set_random(&self, value: f64) {
        self.random.set(value);
    }

    pub fn breaks(&self) -> u32 {
        self.breaks.get()
    }

    /// Polls spawned futures until none of them can make progress.
    pub fn run_spawned(&self) {
        self.pool.borrow_mut().run_until_stalled();
    }

    /// Runs deferred tasks, including those deferred while running, until the queue is empty.
    pub fn run_deferred(&self) {
        loop {
            let task = self.deferred.borrow_mut().pop_front();

            match task {
                Some(task) => task(),
                None => break,
            }
        }
    }

    pub fn run_until_stalled(&self) {
        loop {
            self.run_spawned();

            if self.deferred.borrow().is_empty() {
                break;
            }

            self.run_deferred();
        }
    }
}

impl Host for QueueHost {
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) {
        self.spawner
            .spawn_local(task)
            .expect("local pool is alive for the host's lifetime");
    }

    fn defer(&self, task: Box<dyn FnOnce()>) {
        self.deferred.borrow_mut().push_back(task);
    }

    fn random(&self) -> f64 {
        self.random.get()
    }

    fn debug_break(&self) {
        self.breaks.set(self.breaks.get() + 1);
    }
}

/// Serves images of registered sizes; any other URL fails to load.
#[derive(Debug, Default)]
pub struct FakeImages {
    sizes: RefCell<HashMap<String, (u32, u32)>>,
}

impl FakeImages {
    pub fn insert(&self, url: &str, width: u32, height: u32) {
        self.sizes
            .borrow_mut()
            .insert(url.to_string(), (width, height));
    }

    /// The RGBA bytes served for an image of the given size.
    pub fn pixels(width: u32, height: u32) -> Vec<u8> {
        (0..width * height * 4).map(|i| (i % 251) as u8).collect()
    }
}

impl ImageLoader for FakeImages {
    fn load(&self, url: &str) -> LocalBoxFuture<'static, Result<DecodedImage, FetchError>> {
        let result = match self.sizes.borrow().get(url) {
            Some(&(width, height)) => Ok(DecodedImage {
                width,
                height,
                pixels: FakeImages::pixels(width, height),
            }),
            None => Err(FetchError::Load {
                url: url.to_string(),
                reason: "404".into(),
            }),
        };

        futures::future::ready(result).boxed_local()
    }
}

pub struct TestPlatform;

impl Platform for TestPlatform {
    type Gl = FakeGl;
    type Guest = RecordingGuest;
    type Host = QueueHost;
    type Images = FakeImages;
}

/// A bridge with a guest of `memory_len` bytes attached, not yet initialized.
pub fn bridge(memory_len: usize) -> Rc<Bridge<TestPlatform>> {
    let bridge = Bridge::new(FakeGl::default(), QueueHost::new(), FakeImages::default());

    bridge
        .attach_guest(RecordingGuest::new(memory_len))
        .expect("fresh bridge has no guest");

    Rc::new(bridge)
}

/// A bridge whose guest has returned from init at 640x480.
pub fn running_bridge(memory_len: usize) -> Rc<Bridge<TestPlatform>> {
    let bridge = bridge(memory_len);

    bridge.init(640, 480).expect("init succeeds");

    bridge
}

/// Copies `text` into a fresh guest allocation and returns its string view.
pub fn write_str(bridge: &Bridge<TestPlatform>, text: &str) -> (u32, u32) {
    bridge
        .copy_to_guest(text.as_bytes())
        .expect("copy succeeds")
        .region()
        .expect("text is not empty")
}

/// Copies `values` into a fresh guest allocation and returns its pointer.
pub fn write_u32s(bridge: &Bridge<TestPlatform>, values: &[u32]) -> u32 {
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();

    bridge
        .copy_to_guest(&bytes)
        .expect("copy succeeds")
        .region()
        .expect("values are not empty")
        .0
}

/// Copies `values` into a fresh guest allocation and returns its pointer.
pub fn write_f32s(bridge: &Bridge<TestPlatform>, values: &[f32]) -> u32 {
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();

    bridge
        .copy_to_guest(&bytes)
        .expect("copy succeeds")
        .region()
        .expect("values are not empty")
        .0
}

/// Reserves `len` zeroed bytes in the guest and returns their address.
pub fn reserve(bridge: &Bridge<TestPlatform>, len: u32) -> u32 {
    bridge
        .guest()
        .and_then(|guest| Ok(guest.alloc(len)?))
        .expect("allocation succeeds")
}
