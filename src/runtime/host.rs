use futures::future::LocalBoxFuture;
use js_sys::Function;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::Window;

use crate::bridge::Host;
use crate::runtime::js_message;

pub struct WebHost {
    window: Window,
    debugger: Function,
}

impl WebHost {
    pub fn new(window: Window) -> Self {
        WebHost {
            window,
            debugger: Function::new_no_args("debugger;"),
        }
    }
}

impl Host for WebHost {
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) {
        wasm_bindgen_futures::spawn_local(task);
    }

    fn defer(&self, task: Box<dyn FnOnce()>) {
        let callback = Closure::once_into_js(move || task());

        if let Err(err) = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), 0)
        {
            log::error!("could not schedule deferred task: {}", js_message(&err));
        }
    }

    fn random(&self) -> f64 {
        js_sys::Math::random()
    }

    fn debug_break(&self) {
        if let Err(err) = self.debugger.call0(&JsValue::NULL) {
            log::warn!("debugBreak failed: {}", js_message(&err));
        }
    }
}
