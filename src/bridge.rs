//! The host context shared by every capability and entry point.

use std::cell::{Cell, OnceCell, Ref, RefCell};
use std::rc::Rc;

use futures::future::LocalBoxFuture;

use crate::error::BridgeError;
use crate::fetch::{ImageLoader, PendingFetch};
use crate::graphics::GraphicsApi;
use crate::guest::{EntryPoint, Guest};
use crate::memory::{copy_to_guest, CopyResult, Marshaler};
use crate::registry::Registry;

/// Services provided by the host environment.
pub trait Host {
    /// Runs `task` on the host's event loop, never inline.
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>);

    /// Runs `task` on a later tick of the host's task queue, never inline.
    fn defer(&self, task: Box<dyn FnOnce()>);

    /// A uniformly distributed number in `[0, 1)`.
    fn random(&self) -> f64;

    /// Pauses in the host's debugger, if one is attached.
    fn debug_break(&self);
}

/// Binds together the concrete implementations of every seam the bridge talks through.
pub trait Platform: 'static {
    type Gl: GraphicsApi;
    type Guest: Guest;
    type Host: Host;
    type Images: ImageLoader;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    /// The guest has not yet returned from its init entry point.
    Idle,
    Running,
}

/// An input event forwarded to the guest.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    KeyDown { code: u32, repeat: bool },
    KeyUp { code: u32 },
    MouseDown { button: i32, x: i32, y: i32 },
    MouseUp { button: i32, x: i32, y: i32 },
    MouseMove { x: i32, y: i32 },
    Resize { width: u32, height: u32 },
}

impl InputEvent {
    pub fn entry_point(self) -> EntryPoint {
        match self {
            InputEvent::KeyDown { code, repeat } => EntryPoint::KeyDown {
                code,
                down: true,
                repeat,
            },
            InputEvent::KeyUp { code } => EntryPoint::KeyUp { code, down: false },
            InputEvent::MouseDown { button, x, y } => EntryPoint::MouseDown { button, x, y },
            InputEvent::MouseUp { button, x, y } => EntryPoint::MouseUp { button, x, y },
            InputEvent::MouseMove { x, y } => EntryPoint::MouseMove { x, y },
            InputEvent::Resize { width, height } => EntryPoint::Resize { width, height },
        }
    }
}

/// The single owner of all bridge state for the lifetime of a guest module.
///
/// The bridge is only ever touched from the host's one execution thread and the guest is only
/// entered through [Bridge::call_guest], one call at a time. Capabilities the guest invokes while
/// it is running re-enter the bridge through a shared reference, so all mutable state sits
/// behind cells whose borrows never span a guest call.
pub struct Bridge<P>
where
    P: Platform,
{
    pub(crate) gl: P::Gl,
    pub(crate) host: P::Host,
    pub(crate) images: P::Images,
    pub(crate) registry: RefCell<Registry<P::Gl>>,
    pub(crate) pending: RefCell<Vec<Rc<PendingFetch>>>,
    guest: OnceCell<P::Guest>,
    state: Cell<LoopState>,
    last_frame: Cell<Option<f64>>,
}

impl<P> Bridge<P>
where
    P: Platform,
{
    pub fn new(gl: P::Gl, host: P::Host, images: P::Images) -> Self {
        Bridge {
            gl,
            host,
            images,
            registry: RefCell::new(Registry::new()),
            pending: RefCell::new(Vec::new()),
            guest: OnceCell::new(),
            state: Cell::new(LoopState::Idle),
            last_frame: Cell::new(None),
        }
    }

    pub fn gl(&self) -> &P::Gl {
        &self.gl
    }

    pub fn host(&self) -> &P::Host {
        &self.host
    }

    pub fn registry(&self) -> Ref<'_, Registry<P::Gl>> {
        self.registry.borrow()
    }

    pub fn state(&self) -> LoopState {
        self.state.get()
    }

    /// Attaches the instantiated guest. A bridge serves exactly one guest.
    pub fn attach_guest(&self, guest: P::Guest) -> Result<(), BridgeError> {
        self.guest
            .set(guest)
            .map_err(|_| BridgeError::GuestAlreadyAttached)
    }

    pub fn guest(&self) -> Result<&P::Guest, BridgeError> {
        self.guest.get().ok_or(BridgeError::NoGuest)
    }

    pub(crate) fn marshaler(
        &self,
    ) -> Result<Marshaler<'_, <P::Guest as Guest>::Memory>, BridgeError> {
        Ok(Marshaler::new(self.guest()?.memory()))
    }

    /// Copies `bytes` into a fresh guest allocation.
    pub fn copy_to_guest(&self, bytes: &[u8]) -> Result<CopyResult, BridgeError> {
        copy_to_guest(self.guest()?, bytes)
    }

    /// Enters the guest. Every entry point but init requires the bridge to be running.
    pub fn call_guest(&self, entry: EntryPoint) -> Result<(), BridgeError> {
        if self.state.get() != LoopState::Running && !matches!(entry, EntryPoint::Init { .. }) {
            return Err(BridgeError::NotRunning);
        }

        self.guest()?.call(entry)?;

        Ok(())
    }

    /// Calls the guest's init entry point and, once it has returned successfully, starts running.
    pub fn init(&self, width: u32, height: u32) -> Result<(), BridgeError> {
        if self.state.get() == LoopState::Running {
            return Err(BridgeError::AlreadyRunning);
        }

        self.call_guest(EntryPoint::Init { width, height })?;
        self.state.set(LoopState::Running);

        log::debug!("guest initialized at {}x{}", width, height);

        Ok(())
    }

    /// Delivers an animation frame.
    ///
    /// Returns `false` without entering the guest if `timestamp` does not advance past the
    /// previously delivered frame.
    pub fn animation_frame(&self, timestamp: f64) -> Result<bool, BridgeError> {
        if self.state.get() != LoopState::Running {
            return Err(BridgeError::NotRunning);
        }

        if let Some(last) = self.last_frame.get() {
            if timestamp <= last {
                log::warn!("dropping frame at {} (previous frame at {})", timestamp, last);

                return Ok(false);
            }
        }

        self.last_frame.set(Some(timestamp));
        self.call_guest(EntryPoint::AnimationFrame { timestamp })?;

        Ok(true)
    }

    pub fn dispatch_input(&self, event: InputEvent) -> Result<(), BridgeError> {
        self.call_guest(event.entry_point())
    }

    /// Hands `text` to the guest's equation entry point.
    ///
    /// Empty text cannot be copied into the guest; it is reported and the guest is not called.
    pub fn submit_equation(&self, text: &str) -> Result<CopyResult, BridgeError> {
        if self.state.get() != LoopState::Running {
            return Err(BridgeError::NotRunning);
        }

        let copy = self.copy_to_guest(text.as_bytes())?;

        match copy {
            CopyResult::Copied { ptr, len } => self.call_guest(EntryPoint::Equation { ptr, len })?,
            CopyResult::Empty => log::error!("error copying equation to the guest: empty input"),
        }

        Ok(copy)
    }

    /// Cancels every fetch still in flight; none of them will reach the guest.
    pub fn shutdown(&self) {
        for request in self.pending.borrow_mut().drain(..) {
            request.cancel();
        }

        log::debug!("bridge shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{bridge, running_bridge};

    #[test]
    fn entry_points_are_refused_until_init() {
        let bridge = bridge(64);

        assert_eq!(bridge.state(), LoopState::Idle);
        assert!(matches!(
            bridge.animation_frame(1.0),
            Err(BridgeError::NotRunning)
        ));
        assert!(matches!(
            bridge.dispatch_input(InputEvent::MouseMove { x: 1, y: 1 }),
            Err(BridgeError::NotRunning)
        ));

        bridge.init(640, 480).unwrap();

        assert_eq!(bridge.state(), LoopState::Running);
        assert!(matches!(
            bridge.init(640, 480),
            Err(BridgeError::AlreadyRunning)
        ));
        assert_eq!(
            bridge.guest().unwrap().calls(),
            vec![EntryPoint::Init {
                width: 640,
                height: 480
            }]
        );
    }

    #[test]
    fn failed_init_stays_idle() {
        let bridge = bridge(64);

        bridge.guest().unwrap().fail_on("onInit");

        assert!(bridge.init(1, 1).is_err());
        assert_eq!(bridge.state(), LoopState::Idle);
    }

    #[test]
    fn frames_are_delivered_in_increasing_order() {
        let bridge = running_bridge(64);

        for frame in 1..=5 {
            assert!(bridge.animation_frame(frame as f64 * 16.5).unwrap());
        }

        let timestamps: Vec<f64> = bridge
            .guest()
            .unwrap()
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                EntryPoint::AnimationFrame { timestamp } => Some(timestamp),
                _ => None,
            })
            .collect();

        assert_eq!(timestamps.len(), 5);
        assert!(timestamps.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn stale_frames_are_dropped() {
        let bridge = running_bridge(64);

        assert!(bridge.animation_frame(10.0).unwrap());
        assert!(!bridge.animation_frame(10.0).unwrap());
        assert!(!bridge.animation_frame(5.0).unwrap());
        assert!(bridge.animation_frame(11.0).unwrap());

        let frames = bridge
            .guest()
            .unwrap()
            .calls()
            .into_iter()
            .filter(|call| matches!(call, EntryPoint::AnimationFrame { .. }))
            .count();

        assert_eq!(frames, 2);
    }

    #[test]
    fn input_is_forwarded_in_arrival_order() {
        let bridge = running_bridge(64);

        bridge
            .dispatch_input(InputEvent::KeyDown {
                code: 80,
                repeat: true,
            })
            .unwrap();
        bridge.dispatch_input(InputEvent::KeyUp { code: 80 }).unwrap();
        bridge
            .dispatch_input(InputEvent::MouseDown {
                button: 0,
                x: 3,
                y: 4,
            })
            .unwrap();
        bridge
            .dispatch_input(InputEvent::Resize {
                width: 800,
                height: 600,
            })
            .unwrap();

        assert_eq!(
            bridge.guest().unwrap().calls()[1..].to_vec(),
            vec![
                EntryPoint::KeyDown {
                    code: 80,
                    down: true,
                    repeat: true
                },
                EntryPoint::KeyUp {
                    code: 80,
                    down: false
                },
                EntryPoint::MouseDown {
                    button: 0,
                    x: 3,
                    y: 4
                },
                EntryPoint::Resize {
                    width: 800,
                    height: 600
                },
            ]
        );
    }

    #[test]
    fn equation_text_is_copied_then_delivered() {
        let bridge = running_bridge(64);

        let copy = bridge.submit_equation("sin(x * time)").unwrap();
        let (ptr, len) = copy.region().unwrap();
        let guest = bridge.guest().unwrap();

        assert_eq!(guest.allocations(), vec![13]);
        assert_eq!(
            guest.calls().last(),
            Some(&EntryPoint::Equation { ptr, len })
        );
        assert_eq!(
            bridge.marshaler().unwrap().read_string(ptr, len).unwrap(),
            "sin(x * time)"
        );
    }

    #[test]
    fn empty_equation_is_not_delivered() {
        let bridge = running_bridge(64);

        assert_eq!(bridge.submit_equation("").unwrap(), CopyResult::Empty);
        assert_eq!(bridge.guest().unwrap().calls().len(), 1);
    }

    #[test]
    fn guest_traps_surface_as_errors() {
        let bridge = running_bridge(64);

        bridge.guest().unwrap().fail_on("onMouseMove");

        let err = bridge
            .dispatch_input(InputEvent::MouseMove { x: 0, y: 0 })
            .unwrap_err();

        assert!(matches!(err, BridgeError::Guest(_)));
        assert_eq!(bridge.state(), LoopState::Running);
    }

    #[test]
    fn a_bridge_serves_one_guest() {
        let bridge = bridge(16);

        assert!(matches!(
            bridge.attach_guest(crate::testing::RecordingGuest::new(16)),
            Err(BridgeError::GuestAlreadyAttached)
        ));
    }
}
