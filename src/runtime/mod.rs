//! Browser bindings for the bridge's platform seams, and the page-level driver.

mod animation_loop;
mod host;
mod images;
mod imports;
mod input;
mod webgl;

pub mod bridge_options;
pub use self::bridge_options::{BridgeOptions, BridgeOptionsBuilder};

pub mod context_options;
pub use self::context_options::{ContextOptions, ContextOptionsBuilder, PowerPreference};

pub mod guest;
pub use self::guest::{JsGuest, JsMemory};

mod startup;
pub use self::startup::{start, start_with, BridgeHandle};

pub use self::host::WebHost;
pub use self::images::WebImageLoader;
pub use self::imports::Imports;

use wasm_bindgen::JsValue;
use web_sys::WebGl2RenderingContext;

use crate::bridge::{Bridge, Platform};

/// The platform of a bridge running in a browser page.
pub struct WebPlatform;

impl Platform for WebPlatform {
    type Gl = WebGl2RenderingContext;
    type Guest = JsGuest;
    type Host = WebHost;
    type Images = WebImageLoader;
}

pub type WebBridge = Bridge<WebPlatform>;

/// A readable message for a thrown JS value.
pub(crate) fn js_message(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}
