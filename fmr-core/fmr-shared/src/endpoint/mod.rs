//! The endpoint contract.
//!
//! An endpoint moves raw bytes. Transfers are exact: `push` and `pull`
//! either move the full buffer or fail with [`EndpointError::Short`].
//! No transfer may be attempted before a successful `configure`.

pub mod fake;

pub use fake::FakeEndpoint;

use alloc::string::String;
use core::fmt;
use fmr_model::ErrorKind;

/// Transport errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointError {
    /// Transfer attempted before `configure`
    Unconfigured,
    /// Fewer bytes moved than requested
    Short { expected: usize, actual: usize },
    /// Underlying transport failure
    Io(String),
    /// Transport has been destroyed or the peer went away
    Closed,
}

impl fmt::Display for EndpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointError::Unconfigured => write!(f, "endpoint not configured"),
            EndpointError::Short { expected, actual } => {
                write!(f, "short transfer: expected {expected} bytes, moved {actual}")
            }
            EndpointError::Io(msg) => write!(f, "transport error: {msg}"),
            EndpointError::Closed => write!(f, "endpoint closed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EndpointError {}

impl From<EndpointError> for ErrorKind {
    fn from(err: EndpointError) -> Self {
        match err {
            EndpointError::Unconfigured => ErrorKind::EndpointUnconfigured,
            _ => ErrorKind::Transfer,
        }
    }
}

/// Byte transport between a host and a device.
///
/// The same trait is implemented on both sides of a link: on the host it
/// talks to the device, on the device it talks to the host.
pub trait Endpoint {
    /// Acquire transport resources. Calling it again on a configured
    /// endpoint is a no-op.
    fn configure(&mut self) -> Result<(), EndpointError>;

    /// Transport specific readiness byte; non-zero when input is waiting.
    fn ready(&mut self) -> u8;

    /// Send a single byte
    fn put(&mut self, byte: u8) -> Result<(), EndpointError>;

    /// Receive a single byte
    fn get(&mut self) -> Result<u8, EndpointError>;

    /// Send exactly `data.len()` bytes.
    fn push(&mut self, data: &[u8]) -> Result<(), EndpointError>;

    /// Receive exactly `buf.len()` bytes.
    fn pull(&mut self, buf: &mut [u8]) -> Result<(), EndpointError>;

    /// Release transport resources.
    fn destroy(&mut self) -> Result<(), EndpointError>;
}

impl<E: Endpoint + ?Sized> Endpoint for alloc::boxed::Box<E> {
    fn configure(&mut self) -> Result<(), EndpointError> {
        (**self).configure()
    }

    fn ready(&mut self) -> u8 {
        (**self).ready()
    }

    fn put(&mut self, byte: u8) -> Result<(), EndpointError> {
        (**self).put(byte)
    }

    fn get(&mut self) -> Result<u8, EndpointError> {
        (**self).get()
    }

    fn push(&mut self, data: &[u8]) -> Result<(), EndpointError> {
        (**self).push(data)
    }

    fn pull(&mut self, buf: &mut [u8]) -> Result<(), EndpointError> {
        (**self).pull(buf)
    }

    fn destroy(&mut self) -> Result<(), EndpointError> {
        (**self).destroy()
    }
}
