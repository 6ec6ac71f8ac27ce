//! Error codes carried in call results, and wire decoding errors.

use core::fmt;
use serde::{Deserialize, Serialize};

/// Error kinds shared by host and device.
///
/// Every kind has a stable numeric code so it can travel in the `error`
/// field of a [`CallResult`](crate::CallResult). Code `0` means success and
/// has no variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// A required argument or object was missing
    Null,
    /// Memory for an object could not be allocated
    Allocation,
    /// No device is attached or selected
    NoDevice,
    /// The device configuration could not be obtained or did not match
    Configuration,
    /// `bind` found no module with the requested identifier on the device
    NoCounterpartModule,
    /// The dispatch target resolved to a null function
    UnresolvedFunction,
    /// The module registry has no free slot
    RegistryExhausted,
    /// An endpoint moved a different number of bytes than requested
    Transfer,
    /// A transfer was attempted on an endpoint that was never configured
    EndpointUnconfigured,
    /// Bad magic, checksum, class or length
    MalformedPacket,
    /// A module, function or memory index was out of range
    OutOfBounds,
    /// An image header described sections outside the image
    InvalidImage,
    /// A task could not be created for an application
    Task,
    /// The requested operation is not supported by this device
    Unimplemented,
    /// A code this side does not know about
    Unknown(u32),
}

impl ErrorKind {
    /// Numeric code used on the wire.
    pub fn code(self) -> u32 {
        match self {
            ErrorKind::Null => 1,
            ErrorKind::Allocation => 2,
            ErrorKind::NoDevice => 3,
            ErrorKind::Configuration => 4,
            ErrorKind::NoCounterpartModule => 5,
            ErrorKind::UnresolvedFunction => 6,
            ErrorKind::RegistryExhausted => 7,
            ErrorKind::Transfer => 8,
            ErrorKind::EndpointUnconfigured => 9,
            ErrorKind::MalformedPacket => 10,
            ErrorKind::OutOfBounds => 11,
            ErrorKind::InvalidImage => 12,
            ErrorKind::Task => 13,
            ErrorKind::Unimplemented => 14,
            ErrorKind::Unknown(code) => code,
        }
    }

    /// Decode a wire code. `0` is success and yields `None`.
    pub fn from_code(code: u32) -> Option<Self> {
        let kind = match code {
            0 => return None,
            1 => ErrorKind::Null,
            2 => ErrorKind::Allocation,
            3 => ErrorKind::NoDevice,
            4 => ErrorKind::Configuration,
            5 => ErrorKind::NoCounterpartModule,
            6 => ErrorKind::UnresolvedFunction,
            7 => ErrorKind::RegistryExhausted,
            8 => ErrorKind::Transfer,
            9 => ErrorKind::EndpointUnconfigured,
            10 => ErrorKind::MalformedPacket,
            11 => ErrorKind::OutOfBounds,
            12 => ErrorKind::InvalidImage,
            13 => ErrorKind::Task,
            14 => ErrorKind::Unimplemented,
            other => ErrorKind::Unknown(other),
        };
        Some(kind)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Null => write!(f, "null argument"),
            ErrorKind::Allocation => write!(f, "allocation failure"),
            ErrorKind::NoDevice => write!(f, "no device attached"),
            ErrorKind::Configuration => write!(f, "configuration mismatch"),
            ErrorKind::NoCounterpartModule => write!(f, "no counterpart module"),
            ErrorKind::UnresolvedFunction => write!(f, "unresolved function"),
            ErrorKind::RegistryExhausted => write!(f, "module registry exhausted"),
            ErrorKind::Transfer => write!(f, "transfer failure"),
            ErrorKind::EndpointUnconfigured => write!(f, "endpoint not configured"),
            ErrorKind::MalformedPacket => write!(f, "malformed packet"),
            ErrorKind::OutOfBounds => write!(f, "index out of bounds"),
            ErrorKind::InvalidImage => write!(f, "invalid image"),
            ErrorKind::Task => write!(f, "task creation failed"),
            ErrorKind::Unimplemented => write!(f, "unimplemented"),
            ErrorKind::Unknown(code) => write!(f, "unknown error code 0x{code:x}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ErrorKind {}

/// Errors raised while encoding or decoding wire structures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Buffer shorter than the structure being decoded
    Truncated { expected: usize, actual: usize },
    /// Magic byte did not match
    BadMagic(u8),
    /// Stored checksum does not match the computed one
    BadChecksum { stored: u16, computed: u16 },
    /// Header length outside `HEADER_SIZE..=PACKET_SIZE`
    BadLength(u16),
    /// Unknown packet class tag
    BadClass(u8),
    /// Unknown argument or return type tag
    BadType(u8),
    /// More arguments than a packet can carry
    TooManyArguments(usize),
    /// Device name longer than the configuration record allows
    NameTooLong(usize),
    /// Device name is not valid UTF-8
    BadName,
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::Truncated { expected, actual } => {
                write!(f, "truncated: expected {expected} bytes, got {actual}")
            }
            WireError::BadMagic(magic) => write!(f, "invalid magic number 0x{magic:02x}"),
            WireError::BadChecksum { stored, computed } => write!(
                f,
                "checksum mismatch: stored 0x{stored:04x}, computed 0x{computed:04x}"
            ),
            WireError::BadLength(length) => write!(f, "invalid packet length {length}"),
            WireError::BadClass(class) => write!(f, "invalid packet class {class}"),
            WireError::BadType(tag) => write!(f, "invalid type tag {tag}"),
            WireError::TooManyArguments(count) => write!(f, "too many arguments: {count}"),
            WireError::NameTooLong(len) => write!(f, "device name too long: {len} bytes"),
            WireError::BadName => write!(f, "device name is not valid UTF-8"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for WireError {}

impl From<WireError> for ErrorKind {
    fn from(_: WireError) -> Self {
        ErrorKind::MalformedPacket
    }
}
