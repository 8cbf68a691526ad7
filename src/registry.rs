//! Tables translating guest-visible integer handles into host graphics objects.
//!
//! Every resource class has its own [HandleTable]. A handle is the index of a slot in its table;
//! deleting an object empties its slot but never frees the index, so a handle can never come to
//! name a different object than the one it was issued for.

use std::fmt;

use crate::error::RegistryError;
use crate::graphics::GraphicsApi;

/// An opaque index into a single [HandleTable].
pub type Handle = u32;

/// The class of host object a handle refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceClass {
    Shader,
    Program,
    Buffer,
    Texture,
    VertexArray,
    UniformLocation,
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ResourceClass::Shader => "shader",
            ResourceClass::Program => "program",
            ResourceClass::Buffer => "buffer",
            ResourceClass::Texture => "texture",
            ResourceClass::VertexArray => "vertex array",
            ResourceClass::UniformLocation => "uniform location",
        };

        f.write_str(name)
    }
}

/// An append-only sequence of optional object slots.
#[derive(Debug)]
pub struct HandleTable<T> {
    class: ResourceClass,
    slots: Vec<Option<T>>,
}

impl<T> HandleTable<T> {
    pub fn new(class: ResourceClass) -> Self {
        HandleTable {
            class,
            slots: Vec::new(),
        }
    }

    pub fn class(&self) -> ResourceClass {
        self.class
    }

    /// Stores `object` in a new slot and returns the slot's handle.
    pub fn create(&mut self, object: T) -> Handle {
        let handle = self.slots.len() as Handle;

        self.slots.push(Some(object));

        handle
    }

    /// Stores every object in order, returning their handles in the same order.
    pub fn create_many<I>(&mut self, objects: I) -> Vec<Handle>
    where
        I: IntoIterator<Item = T>,
    {
        objects.into_iter().map(|object| self.create(object)).collect()
    }

    pub fn get(&self, handle: Handle) -> Result<&T, RegistryError> {
        match self.slots.get(handle as usize) {
            Some(Some(object)) => Ok(object),
            Some(None) => Err(RegistryError::Deleted {
                class: self.class,
                handle,
            }),
            None => Err(RegistryError::OutOfRange {
                class: self.class,
                handle,
            }),
        }
    }

    /// Empties the slot for `handle` and hands back the object it held.
    pub fn delete(&mut self, handle: Handle) -> Result<T, RegistryError> {
        let class = self.class;

        match self.slots.get_mut(handle as usize) {
            Some(slot) => slot
                .take()
                .ok_or(RegistryError::Deleted { class, handle }),
            None => Err(RegistryError::OutOfRange { class, handle }),
        }
    }

    /// The number of handles ever issued by this table.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The number of slots that currently hold an object.
    pub fn live(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

/// One [HandleTable] per resource class of a graphics backend.
///
/// Uniform location slots hold an `Option` because the native lookup legitimately yields no
/// location for a name the program does not use; such a handle is valid and setting it does
/// nothing.
pub struct Registry<G>
where
    G: GraphicsApi,
{
    pub shaders: HandleTable<G::Shader>,
    pub programs: HandleTable<G::Program>,
    pub buffers: HandleTable<G::Buffer>,
    pub textures: HandleTable<G::Texture>,
    pub vertex_arrays: HandleTable<G::VertexArray>,
    pub uniform_locations: HandleTable<Option<G::UniformLocation>>,
}

impl<G> Registry<G>
where
    G: GraphicsApi,
{
    pub fn new() -> Self {
        Registry {
            shaders: HandleTable::new(ResourceClass::Shader),
            programs: HandleTable::new(ResourceClass::Program),
            buffers: HandleTable::new(ResourceClass::Buffer),
            textures: HandleTable::new(ResourceClass::Texture),
            vertex_arrays: HandleTable::new(ResourceClass::VertexArray),
            uniform_locations: HandleTable::new(ResourceClass::UniformLocation),
        }
    }
}

impl<G> Default for Registry<G>
where
    G: GraphicsApi,
{
    fn default() -> Self {
        Registry::new()
    }
}
