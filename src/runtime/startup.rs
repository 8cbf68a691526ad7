use std::rc::Rc;

use js_sys::{ArrayBuffer, Reflect, Uint8Array, WebAssembly};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    Document, HtmlCanvasElement, HtmlInputElement, Response, WebGl2RenderingContext, Window,
};

use crate::bridge::Bridge;
use crate::error::{BridgeError, StartupError};
use crate::logging::init_logging;
use crate::memory::CopyResult;
use crate::runtime::animation_loop::AnimationLoop;
use crate::runtime::bridge_options::BridgeOptions;
use crate::runtime::guest::JsGuest;
use crate::runtime::host::WebHost;
use crate::runtime::images::WebImageLoader;
use crate::runtime::imports::Imports;
use crate::runtime::input::{inner_size, InputListeners};
use crate::runtime::{js_message, WebBridge};

/// Brings up the bridge with the default page layout.
#[wasm_bindgen]
pub async fn start() -> Result<BridgeHandle, JsValue> {
    start_with(BridgeOptions::default())
        .await
        .map_err(|err| JsValue::from_str(&err.to_string()))
}

/// Creates the WebGL2 context, instantiates the guest against the bridge's imports, calls its
/// init entry point and starts forwarding frames and input to it.
pub async fn start_with(options: BridgeOptions) -> Result<BridgeHandle, StartupError> {
    init_logging(options.logging());

    let result = bring_up(&options).await;

    if let Err(err) = &result {
        log::error!("startup failed: {}", err);
    }

    result
}

async fn bring_up(options: &BridgeOptions) -> Result<BridgeHandle, StartupError> {
    let window = web_sys::window().ok_or(StartupError::NoWindow)?;
    let document = window.document().ok_or(StartupError::NoWindow)?;
    let canvas = canvas(&document, options.canvas_id())?;
    let (width, height) = inner_size(&window);

    canvas.set_width(width);
    canvas.set_height(height);

    let gl = context(&canvas, options)?;
    let bridge: Rc<WebBridge> = Rc::new(Bridge::new(
        gl,
        WebHost::new(window.clone()),
        WebImageLoader::new(document.clone()),
    ));
    let imports = Imports::new(&bridge).map_err(|err| StartupError::Instantiate {
        url: options.module_url().to_string(),
        reason: js_message(&err),
    })?;
    let instance = instantiate(&window, options.module_url(), &imports).await?;
    let guest = JsGuest::new(&instance).map_err(BridgeError::from)?;

    bridge.attach_guest(guest)?;
    bridge.init(width, height)?;

    let equation_input = match options.equation_input_id() {
        Some(id) => Some(equation_input(&document, id)?),
        None => None,
    };
    let to_startup = |err: JsValue| StartupError::Context(js_message(&err));
    let listeners =
        InputListeners::install(&bridge, &window, &document, &canvas, equation_input)
            .map_err(to_startup)?;
    let animation = AnimationLoop::start(bridge.clone(), window).map_err(to_startup)?;

    log::info!("running `{}` at {}x{}", options.module_url(), width, height);

    Ok(BridgeHandle {
        bridge,
        animation: Some(animation),
        listeners: Some(listeners),
        imports: Some(imports),
    })
}

fn canvas(document: &Document, id: &str) -> Result<HtmlCanvasElement, StartupError> {
    document
        .get_element_by_id(id)
        .ok_or_else(|| StartupError::MissingElement(id.to_string()))?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| StartupError::NotACanvas(id.to_string()))
}

fn equation_input(document: &Document, id: &str) -> Result<HtmlInputElement, StartupError> {
    document
        .get_element_by_id(id)
        .ok_or_else(|| StartupError::MissingElement(id.to_string()))?
        .dyn_into::<HtmlInputElement>()
        .map_err(|_| StartupError::MissingElement(id.to_string()))
}

fn context(
    canvas: &HtmlCanvasElement,
    options: &BridgeOptions,
) -> Result<WebGl2RenderingContext, StartupError> {
    let attributes = options
        .context()
        .to_js()
        .map_err(|err| StartupError::Context(err.to_string()))?;

    canvas
        .get_context_with_context_options("webgl2", &attributes)
        .map_err(|err| StartupError::Context(js_message(&err)))?
        .ok_or_else(|| StartupError::Context("WebGL2 is not supported".to_string()))?
        .dyn_into::<WebGl2RenderingContext>()
        .map_err(|_| StartupError::Context("unexpected context type".to_string()))
}

async fn instantiate(
    window: &Window,
    url: &str,
    imports: &Imports,
) -> Result<WebAssembly::Instance, StartupError> {
    let failed = |err: JsValue| StartupError::Instantiate {
        url: url.to_string(),
        reason: js_message(&err),
    };

    let response: Response = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(failed)?
        .dyn_into()
        .map_err(failed)?;

    if !response.ok() {
        return Err(StartupError::Instantiate {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes: ArrayBuffer = JsFuture::from(response.array_buffer().map_err(failed)?)
        .await
        .map_err(failed)?
        .dyn_into()
        .map_err(failed)?;
    let source = Uint8Array::new(&bytes).to_vec();
    let result = JsFuture::from(WebAssembly::instantiate_buffer(&source, imports.object()))
        .await
        .map_err(failed)?;

    Reflect::get(&result, &JsValue::from_str("instance"))
        .map_err(failed)?
        .dyn_into()
        .map_err(failed)
}

/// The running bridge, as held by the page.
///
/// Dropping the handle (or calling `shutdown`) stops the frame loop and input forwarding and
/// cancels pending fetches.
#[wasm_bindgen]
pub struct BridgeHandle {
    bridge: Rc<WebBridge>,
    animation: Option<AnimationLoop>,
    listeners: Option<InputListeners>,
    // Released last: the guest may call imports until the loop and listeners are gone.
    imports: Option<Imports>,
}

#[wasm_bindgen]
impl BridgeHandle {
    /// Copies `text` into the guest and calls its equation entry point. Returns `false` if
    /// the text was empty and the guest was not called.
    #[wasm_bindgen(js_name = submitEquation)]
    pub fn submit_equation(&self, text: &str) -> Result<bool, JsValue> {
        self.bridge
            .submit_equation(text)
            .map(|copy| copy != CopyResult::Empty)
            .map_err(|err| JsValue::from_str(&err.to_string()))
    }

    #[wasm_bindgen(getter)]
    pub fn running(&self) -> bool {
        self.animation
            .as_ref()
            .map_or(false, |animation| !animation.cancelled())
    }

    pub fn shutdown(&mut self) {
        if let Some(mut animation) = self.animation.take() {
            animation.cancel();
        }

        self.listeners = None;
        self.bridge.shutdown();
    }
}

impl Drop for BridgeHandle {
    fn drop(&mut self) {
        self.shutdown();
        self.imports = None;
    }
}
