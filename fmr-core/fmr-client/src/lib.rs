//! Host library for the FMR message runtime.
//!
//! A [`Host`] owns attached [`Device`]s, each talking to its target through
//! a boxed [`Endpoint`](fmr_shared::Endpoint). Calls are blocking
//! request/response exchanges: one packet out, optional bulk data, one
//! result back.

pub mod device;
pub mod error;
pub mod event;
pub mod host;
#[cfg(feature = "serial")]
pub mod serial;

pub use device::{Device, DeviceId};
pub use error::ClientError;
pub use event::{Event, EventRegistry};
pub use host::{Host, ModuleHandle};
#[cfg(feature = "serial")]
pub use serial::SerialEndpoint;
