//! Typed arguments and the packed 2-bit type descriptor.
//!
//! Arguments travel as a tightly packed little-endian byte run. The width of
//! each slot comes only from its type tag; there is no alignment padding.
//! Tags are stored two bits per argument, first argument in the lowest bits.

extern crate alloc;

use crate::error::WireError;
use crate::packet::MAX_ARGC;
use alloc::vec::Vec;
use core::fmt;

/// Argument and return type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ArgType {
    Int8 = 0,
    Int16 = 1,
    Int32 = 2,
    /// A device address (32-bit ABI word)
    Pointer = 3,
}

impl ArgType {
    /// Width of a slot of this type on the wire.
    pub const fn width(self) -> usize {
        match self {
            ArgType::Int8 => 1,
            ArgType::Int16 => 2,
            ArgType::Int32 | ArgType::Pointer => 4,
        }
    }

    /// Decode a 2-bit tag (or a full return-type byte).
    pub fn from_tag(tag: u8) -> Result<Self, WireError> {
        match tag {
            0 => Ok(ArgType::Int8),
            1 => Ok(ArgType::Int16),
            2 => Ok(ArgType::Int32),
            3 => Ok(ArgType::Pointer),
            other => Err(WireError::BadType(other)),
        }
    }

    /// Truncate a raw 32-bit value to this type's width.
    pub fn truncate(self, value: u32) -> u32 {
        match self {
            ArgType::Int8 => value & 0xFF,
            ArgType::Int16 => value & 0xFFFF,
            ArgType::Int32 | ArgType::Pointer => value,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ArgType::Int8 => "int8",
            ArgType::Int16 => "int16",
            ArgType::Int32 => "int32",
            ArgType::Pointer => "ptr",
        }
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single typed argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg {
    Int8(u8),
    Int16(u16),
    Int32(u32),
    Pointer(u32),
}

impl Arg {
    pub fn arg_type(&self) -> ArgType {
        match self {
            Arg::Int8(_) => ArgType::Int8,
            Arg::Int16(_) => ArgType::Int16,
            Arg::Int32(_) => ArgType::Int32,
            Arg::Pointer(_) => ArgType::Pointer,
        }
    }

    /// Value widened to a 32-bit word (zero extended).
    pub fn value(&self) -> u32 {
        match *self {
            Arg::Int8(v) => v as u32,
            Arg::Int16(v) => v as u32,
            Arg::Int32(v) | Arg::Pointer(v) => v,
        }
    }

    fn from_word(ty: ArgType, word: u32) -> Self {
        match ty {
            ArgType::Int8 => Arg::Int8(word as u8),
            ArgType::Int16 => Arg::Int16(word as u16),
            ArgType::Int32 => Arg::Int32(word),
            ArgType::Pointer => Arg::Pointer(word),
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:0x{:x}", self.arg_type(), self.value())
    }
}

impl From<u8> for Arg {
    fn from(v: u8) -> Self {
        Arg::Int8(v)
    }
}

impl From<i8> for Arg {
    fn from(v: i8) -> Self {
        Arg::Int8(v as u8)
    }
}

impl From<bool> for Arg {
    fn from(v: bool) -> Self {
        Arg::Int8(v as u8)
    }
}

impl From<u16> for Arg {
    fn from(v: u16) -> Self {
        Arg::Int16(v)
    }
}

impl From<i16> for Arg {
    fn from(v: i16) -> Self {
        Arg::Int16(v as u16)
    }
}

impl From<u32> for Arg {
    fn from(v: u32) -> Self {
        Arg::Int32(v)
    }
}

impl From<i32> for Arg {
    fn from(v: i32) -> Self {
        Arg::Int32(v as u32)
    }
}

/// Ordered argument list.
///
/// # Example
///
/// ```
/// use fmr_model::{Arg, Args};
///
/// let args = Args::new().append(0x10u8).append(1u16).append(Arg::Pointer(0x2000_0000));
/// assert_eq!(args.len(), 3);
/// ```
///
/// The builder does not limit the count; the bound of [`MAX_ARGC`] is
/// enforced when the list is packed into an invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    args: Vec<Arg>,
}

impl Args {
    pub fn new() -> Self {
        Self { args: Vec::new() }
    }

    /// Append an argument (builder style).
    pub fn append(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append an argument in place.
    pub fn push(&mut self, arg: impl Into<Arg>) {
        self.args.push(arg.into());
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn as_slice(&self) -> &[Arg] {
        &self.args
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arg> {
        self.args.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Arg> {
        self.args.get(index)
    }

    /// Number of parameter bytes the packed form occupies.
    pub fn packed_len(&self) -> usize {
        self.args.iter().map(|a| a.arg_type().width()).sum()
    }

    /// Packed 2-bit type descriptor.
    pub fn descriptor(&self) -> Result<u16, WireError> {
        if self.args.len() > MAX_ARGC {
            return Err(WireError::TooManyArguments(self.args.len()));
        }
        Ok(self
            .args
            .iter()
            .enumerate()
            .fold(0u16, |types, (i, arg)| {
                types | ((arg.arg_type() as u16) << (2 * i))
            }))
    }

    /// Write the packed parameter bytes into `out`, returning the count.
    pub fn pack(&self, out: &mut [u8]) -> Result<usize, WireError> {
        if self.args.len() > MAX_ARGC {
            return Err(WireError::TooManyArguments(self.args.len()));
        }
        let needed = self.packed_len();
        if out.len() < needed {
            return Err(WireError::Truncated {
                expected: needed,
                actual: out.len(),
            });
        }
        let mut offset = 0;
        for arg in &self.args {
            let width = arg.arg_type().width();
            let bytes = arg.value().to_le_bytes();
            out[offset..offset + width].copy_from_slice(&bytes[..width]);
            offset += width;
        }
        Ok(offset)
    }

    /// Rebuild an argument list from a descriptor, a count and packed bytes.
    pub fn unpack(types: u16, argc: u8, parameters: &[u8]) -> Result<Self, WireError> {
        let argc = argc as usize;
        if argc > MAX_ARGC {
            return Err(WireError::TooManyArguments(argc));
        }
        let mut args = Vec::with_capacity(argc);
        let mut types = types;
        let mut offset = 0;
        for _ in 0..argc {
            let ty = ArgType::from_tag((types & 0x3) as u8)?;
            let width = ty.width();
            let slot = parameters
                .get(offset..offset + width)
                .ok_or(WireError::Truncated {
                    expected: offset + width,
                    actual: parameters.len(),
                })?;
            let mut word = [0u8; 4];
            word[..width].copy_from_slice(slot);
            args.push(Arg::from_word(ty, u32::from_le_bytes(word)));
            offset += width;
            types >>= 2;
        }
        Ok(Self { args })
    }
}

impl From<Vec<Arg>> for Args {
    fn from(args: Vec<Arg>) -> Self {
        Self { args }
    }
}

impl fmt::Display for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_descriptor_first_argument_in_low_bits() {
        let args = Args::new().append(1u8).append(2u16).append(3u32);
        // int8 = 0, int16 = 1, int32 = 2
        assert_eq!(args.descriptor().unwrap(), 0b10_01_00);
    }

    #[test]
    fn test_pack_is_tightly_packed() {
        let args = Args::new()
            .append(0xAAu8)
            .append(0xBBCCu16)
            .append(Arg::Pointer(0x1122_3344));
        let mut out = [0u8; 16];
        let len = args.pack(&mut out).unwrap();
        assert_eq!(len, 7);
        assert_eq!(&out[..7], &[0xAA, 0xCC, 0xBB, 0x44, 0x33, 0x22, 0x11]);
    }

    #[test]
    fn test_unpack_uses_tag_widths() {
        let bytes = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        // int8, int32, int16
        let types = 0b01_10_00;
        let args = Args::unpack(types, 3, &bytes).unwrap();
        assert_eq!(
            args.as_slice(),
            &[Arg::Int8(0x01), Arg::Int32(0x0504_0302), Arg::Int16(0x0706)]
        );
    }

    #[test]
    fn test_unpack_truncated() {
        let result = Args::unpack(0b10, 1, &[0x01, 0x02]);
        assert!(matches!(result, Err(WireError::Truncated { .. })));
    }

    #[test]
    fn test_too_many_arguments() {
        let args: Args = vec![Arg::Int8(0); MAX_ARGC + 1].into();
        assert_eq!(
            args.descriptor(),
            Err(WireError::TooManyArguments(MAX_ARGC + 1))
        );
        assert!(Args::unpack(0, (MAX_ARGC + 1) as u8, &[0; 64]).is_err());
    }

    #[test]
    fn test_truncate_return_value() {
        assert_eq!(ArgType::Int8.truncate(0x1234), 0x34);
        assert_eq!(ArgType::Int16.truncate(0x1234_5678), 0x5678);
        assert_eq!(ArgType::Pointer.truncate(0x1234_5678), 0x1234_5678);
    }

    #[test]
    fn test_signed_conversions() {
        assert_eq!(Arg::from(-1i8), Arg::Int8(0xFF));
        assert_eq!(Arg::from(-2i16), Arg::Int16(0xFFFE));
        assert_eq!(Arg::from(-1i32), Arg::Int32(u32::MAX));
        assert_eq!(Arg::from(true), Arg::Int8(1));
    }
}
