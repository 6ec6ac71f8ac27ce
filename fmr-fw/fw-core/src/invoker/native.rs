//! Native calls through a raw function address.
//!
//! Only 32-bit targets can call loaded code: device addresses are 32 bits
//! wide and arguments are passed as C `u32` words. Elsewhere every call
//! fails with [`ErrorKind::Unimplemented`].

use super::Invoker;
use fmr_model::{ArgType, Args, ErrorKind, MAX_ARGC};

/// Most words a native call accepts: the argument bound plus the two
/// trailing push/pull arguments.
pub const MAX_NATIVE_WORDS: usize = MAX_ARGC + 2;

#[derive(Debug, Default, Clone, Copy)]
pub struct NativeInvoker;

impl Invoker for NativeInvoker {
    fn invoke(&mut self, address: u32, _ret: ArgType, args: &Args) -> Result<u32, ErrorKind> {
        if address == 0 {
            return Err(ErrorKind::UnresolvedFunction);
        }
        if args.len() > MAX_NATIVE_WORDS {
            return Err(ErrorKind::OutOfBounds);
        }
        let mut words = [0u32; MAX_NATIVE_WORDS];
        for (word, arg) in words.iter_mut().zip(args.iter()) {
            *word = arg.value();
        }
        call(address, &words[..args.len()])
    }
}

#[cfg(target_pointer_width = "32")]
macro_rules! call_with {
    ($address:expr $(, $arg:ident)*) => {{
        // SAFETY: the address came from a relocated, bounds-checked and
        // non-null module table entry of an image the device accepted.
        let function: extern "C" fn($(call_with!(@word $arg)),*) -> u32 =
            unsafe { core::mem::transmute::<usize, _>($address as usize) };
        function($(*$arg),*)
    }};
    (@word $arg:ident) => { u32 };
}

#[cfg(target_pointer_width = "32")]
fn call(address: u32, words: &[u32]) -> Result<u32, ErrorKind> {
    let value = match words {
        [] => call_with!(address),
        [a] => call_with!(address, a),
        [a, b] => call_with!(address, a, b),
        [a, b, c] => call_with!(address, a, b, c),
        [a, b, c, d] => call_with!(address, a, b, c, d),
        [a, b, c, d, e] => call_with!(address, a, b, c, d, e),
        [a, b, c, d, e, f] => call_with!(address, a, b, c, d, e, f),
        [a, b, c, d, e, f, g] => call_with!(address, a, b, c, d, e, f, g),
        [a, b, c, d, e, f, g, h] => call_with!(address, a, b, c, d, e, f, g, h),
        [a, b, c, d, e, f, g, h, i] => call_with!(address, a, b, c, d, e, f, g, h, i),
        [a, b, c, d, e, f, g, h, i, j] => call_with!(address, a, b, c, d, e, f, g, h, i, j),
        _ => return Err(ErrorKind::OutOfBounds),
    };
    Ok(value)
}

#[cfg(not(target_pointer_width = "32"))]
fn call(address: u32, _words: &[u32]) -> Result<u32, ErrorKind> {
    log::warn!("native call to 0x{address:08x} unsupported on this target");
    Err(ErrorKind::Unimplemented)
}

#[cfg(all(test, not(target_pointer_width = "32")))]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_off_target() {
        let mut invoker = NativeInvoker;
        assert_eq!(
            invoker.invoke(0x2000_0000, ArgType::Int32, &Args::new()),
            Err(ErrorKind::Unimplemented)
        );
        assert_eq!(
            invoker.invoke(0, ArgType::Int32, &Args::new()),
            Err(ErrorKind::UnresolvedFunction)
        );
    }
}
