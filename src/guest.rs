use crate::error::GuestError;
use crate::memory::LinearMemory;

/// A call into one of the guest's exported entry points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EntryPoint {
    Init { width: u32, height: u32 },
    KeyDown { code: u32, down: bool, repeat: bool },
    KeyUp { code: u32, down: bool },
    MouseDown { button: i32, x: i32, y: i32 },
    MouseUp { button: i32, x: i32, y: i32 },
    MouseMove { x: i32, y: i32 },
    Resize { width: u32, height: u32 },
    AnimationFrame { timestamp: f64 },
    Equation { ptr: u32, len: u32 },
    Fetch {
        width: u32,
        height: u32,
        ptr: u32,
        len: u32,
        token: u32,
    },
}

impl EntryPoint {
    /// The name under which the guest exports this entry point.
    pub fn export_name(&self) -> &'static str {
        match self {
            EntryPoint::Init { .. } => "onInit",
            EntryPoint::KeyDown { .. } => "onKeyDown",
            EntryPoint::KeyUp { .. } => "onKeyUp",
            EntryPoint::MouseDown { .. } => "onMouseDown",
            EntryPoint::MouseUp { .. } => "onMouseUp",
            EntryPoint::MouseMove { .. } => "onMouseMove",
            EntryPoint::Resize { .. } => "onResize",
            EntryPoint::AnimationFrame { .. } => "onAnimationFrame",
            EntryPoint::Equation { .. } => "onEquation",
            EntryPoint::Fetch { .. } => "onFetch",
        }
    }

    /// The numeric arguments of the call, in parameter order.
    ///
    /// Unsigned 32-bit values are reinterpreted as the signed `i32` the guest declares.
    pub fn args(&self) -> Vec<f64> {
        let int = |v: u32| f64::from(v as i32);
        let flag = |v: bool| if v { 1.0 } else { 0.0 };

        match *self {
            EntryPoint::Init { width, height } | EntryPoint::Resize { width, height } => {
                vec![int(width), int(height)]
            }
            EntryPoint::KeyDown { code, down, repeat } => {
                vec![int(code), flag(down), flag(repeat)]
            }
            EntryPoint::KeyUp { code, down } => vec![int(code), flag(down)],
            EntryPoint::MouseDown { button, x, y } | EntryPoint::MouseUp { button, x, y } => {
                vec![f64::from(button), f64::from(x), f64::from(y)]
            }
            EntryPoint::MouseMove { x, y } => vec![f64::from(x), f64::from(y)],
            EntryPoint::AnimationFrame { timestamp } => vec![timestamp],
            EntryPoint::Equation { ptr, len } => vec![int(ptr), int(len)],
            EntryPoint::Fetch {
                width,
                height,
                ptr,
                len,
                token,
            } => vec![int(width), int(height), int(ptr), int(len), int(token)],
        }
    }
}

/// The exports of an instantiated guest module.
///
/// Calls are run to completion: an implementation returns only once the guest has returned.
pub trait Guest {
    type Memory: LinearMemory;

    fn memory(&self) -> &Self::Memory;

    /// Asks the guest's allocator export for `len` bytes and returns the region's address.
    fn alloc(&self, len: u32) -> Result<u32, GuestError>;

    fn call(&self, entry: EntryPoint) -> Result<(), GuestError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_follow_the_export_signature() {
        let fetch = EntryPoint::Fetch {
            width: 2,
            height: 3,
            ptr: 1024,
            len: 24,
            token: u32::MAX,
        };

        assert_eq!(fetch.export_name(), "onFetch");
        assert_eq!(fetch.args(), vec![2.0, 3.0, 1024.0, 24.0, -1.0]);

        let key = EntryPoint::KeyDown {
            code: 65,
            down: true,
            repeat: false,
        };

        assert_eq!(key.args(), vec![65.0, 1.0, 0.0]);
    }
}
