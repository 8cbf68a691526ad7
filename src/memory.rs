//! Marshaling between host values and the guest's linear memory.
//!
//! The guest's memory may grow (and the underlying buffer may be replaced) during any call into
//! the guest. Nothing in this module caches a view across such a call: every access goes through
//! a [View] that is checked against the memory's size at the moment of access.

use std::convert::TryFrom;
use std::ops::Range;

use crate::error::{BridgeError, MemoryError};
use crate::guest::Guest;

/// Byte-level access to a guest's linear memory.
///
/// Implementations must reflect the memory's current size and contents on every call; callers
/// guarantee that the ranges they pass are in bounds.
pub trait LinearMemory {
    /// The current size of the memory in bytes.
    fn byte_len(&self) -> usize;

    /// Copies `dst.len()` bytes starting at `offset` into `dst`.
    fn read(&self, offset: usize, dst: &mut [u8]);

    /// Copies `src` into the memory starting at `offset`.
    fn write(&self, offset: usize, src: &[u8]);
}

/// The element interpretation of a [View].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Element {
    U8,
    I32,
    U32,
    F32,
}

impl Element {
    /// The size of a single element in bytes.
    pub fn size(self) -> usize {
        match self {
            Element::U8 => 1,
            Element::I32 | Element::U32 | Element::F32 => 4,
        }
    }
}

/// A typed `(pointer, count)` region of guest memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct View {
    element: Element,
    ptr: u32,
    count: u32,
}

impl View {
    pub fn new(element: Element, ptr: u32, count: u32) -> Self {
        View {
            element,
            ptr,
            count,
        }
    }

    pub fn bytes(ptr: u32, len: u32) -> Self {
        View::new(Element::U8, ptr, len)
    }

    pub fn element(&self) -> Element {
        self.element
    }

    pub fn ptr(&self) -> u32 {
        self.ptr
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Resolves this view to a byte range inside a memory of `memory_len` bytes.
    pub fn byte_range(&self, memory_len: usize) -> Result<Range<usize>, MemoryError> {
        let size = self.element.size();
        let start = self.ptr as usize;

        if start % size != 0 {
            return Err(MemoryError::Misaligned {
                ptr: self.ptr,
                element: self.element,
            });
        }

        let out_of_bounds = |len| MemoryError::OutOfBounds {
            ptr: self.ptr,
            len,
            memory_len,
        };

        let len = (self.count as usize)
            .checked_mul(size)
            .ok_or_else(|| out_of_bounds(usize::MAX))?;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= memory_len)
            .ok_or_else(|| out_of_bounds(len))?;

        Ok(start..end)
    }
}

/// A single scalar or byte-string store, part of a batch written by [Marshaler::write_batch].
#[derive(Clone, Copy, Debug)]
pub enum Write<'a> {
    U32 { ptr: u32, value: u32 },
    I32 { ptr: u32, value: i32 },
    Bytes { ptr: u32, bytes: &'a [u8] },
}

impl<'a> Write<'a> {
    fn view(&self) -> Result<View, MemoryError> {
        let view = match *self {
            Write::U32 { ptr, .. } => View::new(Element::U32, ptr, 1),
            Write::I32 { ptr, .. } => View::new(Element::I32, ptr, 1),
            Write::Bytes { ptr, bytes } => {
                let len = u32::try_from(bytes.len())
                    .map_err(|_| MemoryError::TooLarge(bytes.len()))?;

                View::bytes(ptr, len)
            }
        };

        Ok(view)
    }
}

/// Typed reads and writes over a guest's linear memory.
pub struct Marshaler<'a, M>
where
    M: ?Sized,
{
    memory: &'a M,
}

impl<'a, M> Marshaler<'a, M>
where
    M: LinearMemory + ?Sized,
{
    pub fn new(memory: &'a M) -> Self {
        Marshaler { memory }
    }

    /// Checks that `view` lies within the memory's current bounds and is properly aligned.
    pub fn check(&self, view: View) -> Result<Range<usize>, MemoryError> {
        view.byte_range(self.memory.byte_len())
    }

    /// Returns a copy of the raw bytes covered by `view`.
    pub fn read_view(&self, view: View) -> Result<Vec<u8>, MemoryError> {
        let range = self.check(view)?;
        let mut bytes = vec![0; range.len()];

        self.memory.read(range.start, &mut bytes);

        Ok(bytes)
    }

    pub fn read_bytes(&self, ptr: u32, len: u32) -> Result<Vec<u8>, MemoryError> {
        self.read_view(View::bytes(ptr, len))
    }

    /// Decodes `len` bytes at `ptr` into a string, expanding every byte into the code point of the
    /// same value.
    ///
    /// Multi-byte UTF-8 sequences are not reassembled: each of their bytes becomes a separate
    /// character. Text crossing this boundary is expected to be ASCII.
    pub fn read_string(&self, ptr: u32, len: u32) -> Result<String, MemoryError> {
        let bytes = self.read_bytes(ptr, len)?;

        Ok(bytes.into_iter().map(char::from).collect())
    }

    pub fn read_f32s(&self, ptr: u32, count: u32) -> Result<Vec<f32>, MemoryError> {
        let bytes = self.read_view(View::new(Element::F32, ptr, count))?;

        Ok(bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }

    pub fn read_u32s(&self, ptr: u32, count: u32) -> Result<Vec<u32>, MemoryError> {
        let bytes = self.read_view(View::new(Element::U32, ptr, count))?;

        Ok(bytes
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }

    pub fn write_bytes(&self, ptr: u32, bytes: &[u8]) -> Result<(), MemoryError> {
        self.write_batch(&[Write::Bytes { ptr, bytes }])
    }

    pub fn write_u32s(&self, ptr: u32, values: &[u32]) -> Result<(), MemoryError> {
        let count = u32::try_from(values.len()).map_err(|_| MemoryError::TooLarge(values.len()))?;
        let range = self.check(View::new(Element::U32, ptr, count))?;
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();

        self.memory.write(range.start, &bytes);

        Ok(())
    }

    /// Performs all `writes`, or none of them if any one is out of bounds or misaligned.
    pub fn write_batch(&self, writes: &[Write]) -> Result<(), MemoryError> {
        let mut offsets = Vec::with_capacity(writes.len());

        for write in writes {
            offsets.push(self.check(write.view()?)?.start);
        }

        for (write, offset) in writes.iter().zip(offsets) {
            match *write {
                Write::U32 { value, .. } => self.memory.write(offset, &value.to_le_bytes()),
                Write::I32 { value, .. } => self.memory.write(offset, &value.to_le_bytes()),
                Write::Bytes { bytes, .. } => self.memory.write(offset, bytes),
            }
        }

        Ok(())
    }
}

/// Outcome of [copy_to_guest].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CopyResult {
    /// The bytes now live in a guest allocation of `len` bytes at `ptr`.
    Copied { ptr: u32, len: u32 },

    /// The source was empty; nothing was allocated.
    Empty,
}

impl CopyResult {
    pub fn success(&self) -> bool {
        matches!(self, CopyResult::Copied { .. })
    }

    pub fn region(&self) -> Option<(u32, u32)> {
        match *self {
            CopyResult::Copied { ptr, len } => Some((ptr, len)),
            CopyResult::Empty => None,
        }
    }
}

/// Copies `bytes` into a fresh allocation obtained from the guest's allocator export.
///
/// An empty `bytes` reports [CopyResult::Empty] without calling the allocator. The memory is
/// looked up again after the allocator returns, as the allocation may have grown it.
pub fn copy_to_guest<G>(guest: &G, bytes: &[u8]) -> Result<CopyResult, BridgeError>
where
    G: Guest + ?Sized,
{
    if bytes.is_empty() {
        return Ok(CopyResult::Empty);
    }

    let len = u32::try_from(bytes.len()).map_err(|_| MemoryError::TooLarge(bytes.len()))?;
    let ptr = guest.alloc(len)?;

    Marshaler::new(guest.memory()).write_bytes(ptr, bytes)?;

    Ok(CopyResult::Copied { ptr, len })
}
