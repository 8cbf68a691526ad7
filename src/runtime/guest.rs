//! The guest seams over an instantiated `WebAssembly.Instance`.

use js_sys::{Array, ArrayBuffer, Function, Object, Reflect, Uint8Array, WebAssembly};
use wasm_bindgen::{JsCast, JsValue};

use crate::error::GuestError;
use crate::guest::{EntryPoint, Guest};
use crate::memory::LinearMemory;
use crate::runtime::js_message;

const ALLOC_EXPORT: &str = "_wasm_alloc";
const MEMORY_EXPORT: &str = "memory";

/// The guest's exported `WebAssembly.Memory`.
///
/// The memory's `ArrayBuffer` is detached and replaced whenever the memory grows, so it is looked
/// up again on every access.
pub struct JsMemory {
    memory: WebAssembly::Memory,
}

impl JsMemory {
    pub fn new(memory: WebAssembly::Memory) -> Self {
        JsMemory { memory }
    }

    /// A view of `len` bytes at `offset`. Callers have already checked the range against
    /// [byte_len](LinearMemory::byte_len), so neither value exceeds the 4 GiB address space.
    fn bytes(&self, offset: usize, len: usize) -> Uint8Array {
        Uint8Array::new_with_byte_offset_and_length(
            &self.memory.buffer(),
            offset as u32,
            len as u32,
        )
    }
}

impl LinearMemory for JsMemory {
    fn byte_len(&self) -> usize {
        self.memory
            .buffer()
            .unchecked_into::<ArrayBuffer>()
            .byte_length() as usize
    }

    fn read(&self, offset: usize, dst: &mut [u8]) {
        self.bytes(offset, dst.len()).copy_to(dst);
    }

    fn write(&self, offset: usize, src: &[u8]) {
        self.bytes(offset, src.len()).copy_from(src);
    }
}

pub struct JsGuest {
    exports: Object,
    memory: JsMemory,
    alloc: Function,
}

impl JsGuest {
    /// Binds to the exports of `instance`, which must provide the guest's memory and allocator.
    pub fn new(instance: &WebAssembly::Instance) -> Result<Self, GuestError> {
        let exports = instance.exports();
        let memory = export(&exports, MEMORY_EXPORT)?
            .dyn_into::<WebAssembly::Memory>()
            .map_err(|_| GuestError::MissingExport(MEMORY_EXPORT))?;
        let alloc = function(&exports, ALLOC_EXPORT)?;

        Ok(JsGuest {
            exports,
            memory: JsMemory::new(memory),
            alloc,
        })
    }
}

impl Guest for JsGuest {
    type Memory = JsMemory;

    fn memory(&self) -> &JsMemory {
        &self.memory
    }

    fn alloc(&self, len: u32) -> Result<u32, GuestError> {
        let ptr = self
            .alloc
            .call1(&JsValue::NULL, &JsValue::from(len))
            .map_err(|err| GuestError::Trap {
                export: ALLOC_EXPORT,
                message: js_message(&err),
            })?;

        // The allocator is declared to return an `i32`, which JS sees as a signed number.
        ptr.as_f64()
            .map(|ptr| ptr as i32 as u32)
            .ok_or_else(|| GuestError::BadAllocation(js_message(&ptr)))
    }

    fn call(&self, entry: EntryPoint) -> Result<(), GuestError> {
        let export = entry.export_name();
        let function = function(&self.exports, export)?;
        let args: Array = entry.args().into_iter().map(JsValue::from).collect();

        function
            .apply(&JsValue::NULL, &args)
            .map(|_| ())
            .map_err(|err| GuestError::Trap {
                export,
                message: js_message(&err),
            })
    }
}

fn export(exports: &Object, name: &'static str) -> Result<JsValue, GuestError> {
    Reflect::get(exports, &JsValue::from_str(name))
        .ok()
        .filter(|value| !value.is_undefined())
        .ok_or(GuestError::MissingExport(name))
}

fn function(exports: &Object, name: &'static str) -> Result<Function, GuestError> {
    export(exports, name)?
        .dyn_into::<Function>()
        .map_err(|_| GuestError::MissingExport(name))
}
