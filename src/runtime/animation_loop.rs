use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::Window;

use crate::runtime::WebBridge;

type FrameCallback = Closure<dyn FnMut(f64)>;

/// Delivers every `requestAnimationFrame` callback to the guest until stopped or dropped.
pub(crate) struct AnimationLoop {
    window: Window,
    handle: Rc<Cell<i32>>,
    // Keeps the callback alive while a frame is requested.
    #[allow(dead_code)]
    closure_container: Rc<RefCell<Option<FrameCallback>>>,
    cancelled: Rc<Cell<bool>>,
}

impl AnimationLoop {
    pub(crate) fn start(bridge: Rc<WebBridge>, window: Window) -> Result<Self, JsValue> {
        let handle = Rc::new(Cell::new(0));
        let cancelled = Rc::new(Cell::new(false));
        let closure_container = Rc::new(RefCell::new(None));

        let step = FrameStep {
            bridge,
            window: window.clone(),
            closure: Rc::downgrade(&closure_container),
            handle: handle.clone(),
            cancelled: cancelled.clone(),
        };

        let closure = Closure::wrap(
            Box::new(move |timestamp: f64| step.run(timestamp)) as Box<dyn FnMut(f64)>
        );
        let handle_id = window.request_animation_frame(closure.as_ref().unchecked_ref())?;

        *closure_container.borrow_mut() = Some(closure);
        handle.set(handle_id);

        Ok(AnimationLoop {
            window,
            handle,
            closure_container,
            cancelled,
        })
    }

    pub(crate) fn cancelled(&self) -> bool {
        self.cancelled.get()
    }

    /// Stops the loop; returns `false` if it was already stopped.
    pub(crate) fn cancel(&mut self) -> bool {
        if self.cancelled.get() {
            return false;
        }

        if let Err(err) = self.window.cancel_animation_frame(self.handle.get()) {
            log::warn!("could not cancel animation frame: {:?}", err);
        }

        self.cancelled.set(true);

        true
    }
}

impl Drop for AnimationLoop {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct FrameStep {
    bridge: Rc<WebBridge>,
    window: Window,
    closure: Weak<RefCell<Option<FrameCallback>>>,
    handle: Rc<Cell<i32>>,
    cancelled: Rc<Cell<bool>>,
}

impl FrameStep {
    fn run(&self, timestamp: f64) {
        if self.cancelled.get() {
            return;
        }

        if let Err(err) = self.bridge.animation_frame(timestamp) {
            log::error!("onAnimationFrame failed: {}", err);
        }

        // Fails once the loop has been dropped, in which case no further frame is requested.
        if let Some(container) = self.closure.upgrade() {
            let container = container.borrow();
            let closure = match container.as_ref() {
                Some(closure) => closure,
                None => return,
            };

            match self
                .window
                .request_animation_frame(closure.as_ref().unchecked_ref())
            {
                Ok(handle_id) => self.handle.set(handle_id),
                Err(err) => {
                    log::error!("could not request animation frame: {:?}", err);

                    self.cancelled.set(true);
                }
            }
        }
    }
}
