//! Virtual device.
//!
//! [`VirtualEndpoint`] is a host-side endpoint with a complete firmware
//! runtime behind it. Bytes pushed by the host queue up for the device;
//! when the host pulls more than the device has produced, the runtime
//! serves the next queued packet.

mod pipe;
mod virtual_endpoint;

pub use virtual_endpoint::VirtualEndpoint;
