//! Forwards page events to the guest's input entry points.

use std::rc::Rc;

use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    Document, Event, EventTarget, HtmlCanvasElement, HtmlInputElement, KeyboardEvent,
    MouseEvent, Window,
};

use crate::bridge::InputEvent;
use crate::error::BridgeError;
use crate::runtime::WebBridge;

type Listener = Closure<dyn FnMut(Event)>;

/// Event listeners installed on the page; they are removed again when this is dropped.
pub(crate) struct InputListeners {
    listeners: Vec<(EventTarget, &'static str, Listener)>,
}

impl InputListeners {
    pub(crate) fn install(
        bridge: &Rc<WebBridge>,
        window: &Window,
        document: &Document,
        canvas: &HtmlCanvasElement,
        equation_input: Option<HtmlInputElement>,
    ) -> Result<Self, JsValue> {
        let mut listeners = InputListeners {
            listeners: Vec::new(),
        };
        let document: &EventTarget = document.as_ref();

        let b = bridge.clone();
        listeners.listen(document, "keydown", move |event| {
            if let Some(event) = event.dyn_ref::<KeyboardEvent>() {
                dispatch(
                    &b,
                    InputEvent::KeyDown {
                        code: event.key_code(),
                        repeat: event.repeat(),
                    },
                );
            }
        })?;

        let b = bridge.clone();
        listeners.listen(document, "keyup", move |event| {
            if let Some(event) = event.dyn_ref::<KeyboardEvent>() {
                dispatch(
                    &b,
                    InputEvent::KeyUp {
                        code: event.key_code(),
                    },
                );
            }
        })?;

        let b = bridge.clone();
        listeners.listen(document, "mousedown", move |event| {
            if let Some(event) = event.dyn_ref::<MouseEvent>() {
                dispatch(
                    &b,
                    InputEvent::MouseDown {
                        button: i32::from(event.button()),
                        x: event.client_x(),
                        y: event.client_y(),
                    },
                );
            }
        })?;

        let b = bridge.clone();
        listeners.listen(document, "mouseup", move |event| {
            if let Some(event) = event.dyn_ref::<MouseEvent>() {
                dispatch(
                    &b,
                    InputEvent::MouseUp {
                        button: i32::from(event.button()),
                        x: event.client_x(),
                        y: event.client_y(),
                    },
                );
            }
        })?;

        let b = bridge.clone();
        listeners.listen(document, "mousemove", move |event| {
            if let Some(event) = event.dyn_ref::<MouseEvent>() {
                dispatch(
                    &b,
                    InputEvent::MouseMove {
                        x: event.client_x(),
                        y: event.client_y(),
                    },
                );
            }
        })?;

        let b = bridge.clone();
        let resized_window = window.clone();
        let resized_canvas = canvas.clone();
        listeners.listen(window.as_ref(), "resize", move |_| {
            let (width, height) = inner_size(&resized_window);

            resized_canvas.set_width(width);
            resized_canvas.set_height(height);

            dispatch(&b, InputEvent::Resize { width, height });
        })?;

        if let Some(input) = equation_input {
            let b = bridge.clone();
            let target: EventTarget = input.clone().into();

            listeners.listen(&target, "keyup", move |event| {
                let enter = event
                    .dyn_ref::<KeyboardEvent>()
                    .map_or(false, |event| event.key() == "Enter");

                if enter {
                    if let Err(err) = b.submit_equation(&input.value()) {
                        report("onEquation", err);
                    }
                }
            })?;
        }

        Ok(listeners)
    }

    fn listen<F>(
        &mut self,
        target: &EventTarget,
        event_type: &'static str,
        listener: F,
    ) -> Result<(), JsValue>
    where
        F: FnMut(Event) + 'static,
    {
        let closure = Closure::wrap(Box::new(listener) as Box<dyn FnMut(Event)>);

        target.add_event_listener_with_callback(event_type, closure.as_ref().unchecked_ref())?;
        self.listeners.push((target.clone(), event_type, closure));

        Ok(())
    }
}

impl Drop for InputListeners {
    fn drop(&mut self) {
        for (target, event_type, closure) in self.listeners.drain(..) {
            let _ = target
                .remove_event_listener_with_callback(event_type, closure.as_ref().unchecked_ref());
        }
    }
}

/// The window's inner size in CSS pixels.
pub(crate) fn inner_size(window: &Window) -> (u32, u32) {
    let dimension = |value: Result<JsValue, JsValue>| {
        value
            .ok()
            .and_then(|value| value.as_f64())
            .map_or(0, |value| value as u32)
    };

    (
        dimension(window.inner_width()),
        dimension(window.inner_height()),
    )
}

fn dispatch(bridge: &WebBridge, event: InputEvent) {
    if let Err(err) = bridge.dispatch_input(event) {
        report(event.entry_point().export_name(), err);
    }
}

fn report(export: &str, err: BridgeError) {
    log::error!("{} failed: {}", export, err);
}
