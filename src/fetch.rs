//! The asynchronous resource fetch protocol.
//!
//! The guest requests a resource with a URL and a token of its choosing. The host loads and
//! decodes the resource out of band, copies the decoded bytes into a guest allocation, and on a
//! later tick of the host's task queue calls the guest's fetch completion entry point with the
//! same token. The completion never runs while the requesting guest call is still on the stack.

use std::cell::Cell;
use std::rc::Rc;

use futures::future::LocalBoxFuture;

use crate::bridge::{Bridge, Host, Platform};
use crate::error::{BridgeError, FetchError};
use crate::guest::EntryPoint;
use crate::memory::CopyResult;

const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "webp", "bmp"];

/// A decoded image: `width * height` pixels of interleaved 8-bit RGBA, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Loads and decodes images out of band.
pub trait ImageLoader {
    fn load(&self, url: &str) -> LocalBoxFuture<'static, Result<DecodedImage, FetchError>>;
}

/// Whether `url` names an image resource, judged by the extension of its path.
///
/// Accepted extensions are `png`, `jpg`, `jpeg`, `gif`, `webp` and `bmp`, in any case. Any query
/// string or fragment is ignored, so cache-busting URLs such as `atlas.png?v=3` still qualify.
/// Fetching anything else fails with [BridgeError::Unimplemented].
pub fn is_image_url(url: &str) -> bool {
    let path = url.split(|c: char| c == '?' || c == '#').next().unwrap_or("");
    let file = path.rsplit('/').next().unwrap_or(path);

    match file.rsplit_once('.') {
        Some((_, extension)) => IMAGE_EXTENSIONS
            .iter()
            .any(|known| extension.eq_ignore_ascii_case(known)),
        None => false,
    }
}

/// A fetch that has been accepted but whose completion has not yet reached the guest.
#[derive(Debug)]
pub struct PendingFetch {
    token: u32,
    url: String,
    cancelled: Cell<bool>,
}

impl PendingFetch {
    fn new(token: u32, url: String) -> Self {
        PendingFetch {
            token,
            url,
            cancelled: Cell::new(false),
        }
    }

    pub fn token(&self) -> u32 {
        self.token
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }

    /// Prevents the completion from being delivered. Cancelling twice has no further effect.
    pub fn cancel(&self) {
        self.cancelled.set(true);
    }
}

impl<P> Bridge<P>
where
    P: Platform,
{
    /// Starts fetching the resource named by the string view `(url_ptr, url_len)`.
    ///
    /// Only image resources are supported; any other URL is reported as unimplemented and nothing
    /// is fetched.
    pub fn fetch_bytes(
        self: &Rc<Self>,
        url_ptr: u32,
        url_len: u32,
        token: u32,
    ) -> Result<Rc<PendingFetch>, BridgeError> {
        let url = self.marshaler()?.read_string(url_ptr, url_len)?;

        if !is_image_url(&url) {
            return Err(BridgeError::Unimplemented(url));
        }

        log::debug!("fetching `{}` for token {}", url, token);

        let request = Rc::new(PendingFetch::new(token, url));
        let load = self.images.load(request.url());
        let bridge = Rc::downgrade(self);
        let pending = request.clone();

        self.pending.borrow_mut().push(request.clone());
        self.host.spawn_local(Box::pin(async move {
            let result = load.await;

            // Once the bridge is gone there is no guest left to complete into.
            if let Some(bridge) = bridge.upgrade() {
                bridge.complete_fetch(pending, result);
            }
        }));

        Ok(request)
    }

    /// The number of fetches accepted but not yet completed, failed or cancelled.
    pub fn pending_fetches(&self) -> usize {
        self.pending.borrow().len()
    }

    fn complete_fetch(
        self: &Rc<Self>,
        request: Rc<PendingFetch>,
        result: Result<DecodedImage, FetchError>,
    ) {
        self.pending
            .borrow_mut()
            .retain(|pending| !Rc::ptr_eq(pending, &request));

        if request.is_cancelled() {
            log::debug!("dropping cancelled fetch of `{}`", request.url());

            return;
        }

        let image = match result {
            Ok(image) => image,
            Err(err) => {
                log::error!("{}", err);

                return;
            }
        };

        let (ptr, len) = match self.copy_to_guest(&image.pixels) {
            Ok(CopyResult::Copied { ptr, len }) => (ptr, len),
            Ok(CopyResult::Empty) => {
                log::error!("copy to guest failed: `{}` decoded to no bytes", request.url());

                return;
            }
            Err(err) => {
                log::error!("copy to guest failed for `{}`: {}", request.url(), err);

                return;
            }
        };

        let entry = EntryPoint::Fetch {
            width: image.width,
            height: image.height,
            ptr,
            len,
            token: request.token(),
        };
        let bridge = Rc::downgrade(self);

        self.host.defer(Box::new(move || {
            let bridge = match bridge.upgrade() {
                Some(bridge) => bridge,
                None => return,
            };

            if request.is_cancelled() {
                return;
            }

            if let Err(err) = bridge.call_guest(entry) {
                log::error!("fetch completion for `{}` failed: {}", request.url(), err);
            }
        }));
    }
}
