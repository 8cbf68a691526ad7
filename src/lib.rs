//! Host-side bridge between a sandboxed WebAssembly guest and the browser.
//!
//! The guest has no native API access of its own. It imports a capability surface (graphics
//! calls, logging, randomness and an asynchronous image fetch) implemented here as methods on a
//! single [Bridge], and exports entry points the bridge calls to deliver animation frames, input
//! events, typed equations and fetch completions.
//!
//! The bridge itself is written against the seams in [graphics], [guest], [memory] and [bridge]
//! so it can run against in-process fakes; [runtime] binds those seams to WebGL2, the
//! `WebAssembly` JS API and the page.

mod capability;

pub mod bridge;
pub use self::bridge::{Bridge, Host, InputEvent, LoopState, Platform};

pub mod error;
pub use self::error::{
    BridgeError, FetchError, GuestError, MemoryError, RegistryError, StartupError,
};

pub mod fetch;
pub use self::fetch::{is_image_url, DecodedImage, ImageLoader, PendingFetch};

pub mod graphics;
pub use self::graphics::{ActiveUniform, GraphicsApi, TexImage2D};

pub mod guest;
pub use self::guest::{EntryPoint, Guest};

pub mod logging;
pub use self::logging::{init_logging, LoggingConfig};

pub mod memory;
pub use self::memory::{copy_to_guest, CopyResult, Element, LinearMemory, Marshaler, View};

pub mod registry;
pub use self::registry::{Handle, HandleTable, Registry, ResourceClass};

pub mod runtime;

#[cfg(test)]
mod testing;
