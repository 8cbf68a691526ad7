use futures::future::{FutureExt, LocalBoxFuture};
use js_sys::Promise;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{CanvasRenderingContext2d, Document, HtmlCanvasElement, HtmlImageElement};

use crate::error::FetchError;
use crate::fetch::{DecodedImage, ImageLoader};
use crate::runtime::js_message;

/// Loads images through an `<img>` element and decodes them by drawing onto a scratch canvas.
pub struct WebImageLoader {
    document: Document,
}

impl WebImageLoader {
    pub fn new(document: Document) -> Self {
        WebImageLoader { document }
    }
}

impl ImageLoader for WebImageLoader {
    fn load(&self, url: &str) -> LocalBoxFuture<'static, Result<DecodedImage, FetchError>> {
        let document = self.document.clone();
        let url = url.to_string();

        async move {
            let image = load_image(&url).await.map_err(|reason| FetchError::Load {
                url: url.clone(),
                reason,
            })?;

            decode(&document, &image).map_err(|reason| FetchError::Decode { url, reason })
        }
        .boxed_local()
    }
}

async fn load_image(url: &str) -> Result<HtmlImageElement, String> {
    let image = HtmlImageElement::new().map_err(|err| js_message(&err))?;

    image.set_cross_origin(Some("anonymous"));

    let loaded = Promise::new(&mut |resolve, reject| {
        image.set_onload(Some(&resolve));
        image.set_onerror(Some(&reject));
    });

    image.set_src(url);

    let result = JsFuture::from(loaded).await;

    image.set_onload(None);
    image.set_onerror(None);

    result.map_err(|_| "the image could not be loaded".to_string())?;

    Ok(image)
}

/// Reads the image's pixels back as row-major RGBA8.
fn decode(document: &Document, image: &HtmlImageElement) -> Result<DecodedImage, String> {
    let width = image.natural_width();
    let height = image.natural_height();

    if width == 0 || height == 0 {
        return Ok(DecodedImage {
            width,
            height,
            pixels: Vec::new(),
        });
    }

    let canvas = document
        .create_element("canvas")
        .map_err(|err| js_message(&err))?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| "scratch element is not a canvas".to_string())?;

    canvas.set_width(width);
    canvas.set_height(height);

    let context = canvas
        .get_context("2d")
        .map_err(|err| js_message(&err))?
        .ok_or_else(|| "2d context unavailable".to_string())?
        .dyn_into::<CanvasRenderingContext2d>()
        .map_err(|_| "unexpected 2d context type".to_string())?;

    context
        .draw_image_with_html_image_element(image, 0.0, 0.0)
        .map_err(|err| js_message(&err))?;

    let data = context
        .get_image_data(0.0, 0.0, f64::from(width), f64::from(height))
        .map_err(|err| js_message(&err))?;

    Ok(DecodedImage {
        width: data.width(),
        height: data.height(),
        pixels: data.data().0,
    })
}
