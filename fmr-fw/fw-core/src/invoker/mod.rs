//! Calls into loaded code.
//!
//! Dispatch resolves a user invocation to a device address only after the
//! module index, function index and null checks pass. Crossing into the
//! function at that address is the job of an [`Invoker`].

pub mod fake;
pub mod native;

pub use fake::FakeInvoker;
pub use native::NativeInvoker;

use fmr_model::{ArgType, Args, ErrorKind};

pub trait Invoker {
    /// Call the function at `address` with `args`, returning its raw result.
    fn invoke(&mut self, address: u32, ret: ArgType, args: &Args) -> Result<u32, ErrorKind>;
}
