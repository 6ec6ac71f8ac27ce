use fmr_model::{ErrorKind, WireError};
use fmr_shared::EndpointError;
use std::fmt;

/// Errors returned by host operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The endpoint failed or moved the wrong number of bytes
    Endpoint(EndpointError),
    /// A packet or reply could not be encoded or decoded
    Wire(WireError),
    /// The device answered with a non-zero error code
    Remote(ErrorKind),
    /// No device is attached or the handle's device is gone
    NoDevice,
    /// `bind` found no loaded module with this name
    NoCounterpartModule(String),
    /// The device's configuration record was unusable
    Configuration(String),
}

impl ClientError {
    /// Error kind stored in the device's last-error slot.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Endpoint(err) => err.clone().into(),
            ClientError::Wire(_) => ErrorKind::MalformedPacket,
            ClientError::Remote(kind) => *kind,
            ClientError::NoDevice => ErrorKind::NoDevice,
            ClientError::NoCounterpartModule(_) => ErrorKind::NoCounterpartModule,
            ClientError::Configuration(_) => ErrorKind::Configuration,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Endpoint(err) => write!(f, "endpoint error: {err}"),
            ClientError::Wire(err) => write!(f, "wire error: {err}"),
            ClientError::Remote(kind) => write!(f, "device error: {kind}"),
            ClientError::NoDevice => write!(f, "no device attached"),
            ClientError::NoCounterpartModule(name) => {
                write!(f, "no counterpart module '{name}' on device")
            }
            ClientError::Configuration(msg) => write!(f, "bad device configuration: {msg}"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<EndpointError> for ClientError {
    fn from(err: EndpointError) -> Self {
        ClientError::Endpoint(err)
    }
}

impl From<WireError> for ClientError {
    fn from(err: WireError) -> Self {
        ClientError::Wire(err)
    }
}
