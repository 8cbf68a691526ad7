use thiserror::Error;

use crate::memory::Element;
use crate::registry::{Handle, ResourceClass};

/// Error returned when an access into the guest's linear memory cannot be performed.
///
/// Memory errors are always fatal for the bridge call that triggered them.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// Variant returned when the accessed range does not lie within the current bounds of the
    /// guest's memory.
    #[error("range of {len} bytes at {ptr:#x} exceeds guest memory of {memory_len} bytes")]
    OutOfBounds {
        ptr: u32,
        len: usize,
        memory_len: usize,
    },

    /// Variant returned when a typed view does not start on a multiple of its element size.
    #[error("{element:?} view at {ptr:#x} is not aligned to its element size")]
    Misaligned { ptr: u32, element: Element },

    /// Variant returned when a host buffer is too large to be addressed by the guest.
    #[error("buffer of {0} bytes cannot be addressed by the guest")]
    TooLarge(usize),
}

/// Error returned when a guest-supplied handle does not resolve to a live host object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("{class} handle {handle} is out of range")]
    OutOfRange { class: ResourceClass, handle: Handle },

    #[error("{class} handle {handle} refers to a deleted object")]
    Deleted { class: ResourceClass, handle: Handle },
}

/// Error returned by calls into the guest module.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum GuestError {
    #[error("guest module does not export `{0}`")]
    MissingExport(&'static str),

    #[error("guest call `{export}` failed: {message}")]
    Trap {
        export: &'static str,
        message: String,
    },

    #[error("guest allocator returned an invalid pointer: {0}")]
    BadAllocation(String),
}

/// Error produced by an out-of-band resource fetch.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum FetchError {
    #[error("failed to load image `{url}`: {reason}")]
    Load { url: String, reason: String },

    #[error("failed to decode image `{url}`: {reason}")]
    Decode { url: String, reason: String },
}

/// Error returned by bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Guest(#[from] GuestError),

    #[error("error compiling shader: {0}")]
    ShaderCompilation(String),

    #[error("error linking program: {0}")]
    ShaderLinking(String),

    #[error("native graphics call `{call}` failed: {message}")]
    Native { call: &'static str, message: String },

    #[error("fetching `{0}` is not implemented")]
    Unimplemented(String),

    #[error("malformed equation result: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no guest module is attached to the bridge")]
    NoGuest,

    #[error("a guest module is already attached to the bridge")]
    GuestAlreadyAttached,

    #[error("the bridge is not running")]
    NotRunning,

    #[error("the bridge is already running")]
    AlreadyRunning,
}

impl BridgeError {
    pub(crate) fn native<M>(call: &'static str, message: M) -> Self
    where
        M: Into<String>,
    {
        BridgeError::Native {
            call,
            message: message.into(),
        }
    }

    /// Returns `false` only for handle misuse, which is reported to the guest as a value rather
    /// than aborting the triggering call.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, BridgeError::Registry(_))
    }
}

/// Error returned when the bridge could not be brought up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("no window is available")]
    NoWindow,

    #[error("no element with id `{0}`")]
    MissingElement(String),

    #[error("element `{0}` is not a canvas")]
    NotACanvas(String),

    #[error("could not create a WebGL2 context: {0}")]
    Context(String),

    #[error("could not instantiate guest module `{url}`: {reason}")]
    Instantiate { url: String, reason: String },

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}
