//! Shared plumbing for FMR hosts and devices.
//!
//! Every transport, whether a USB link, an in-process virtual device or a
//! serial port, implements [`Endpoint`]. The host library and the firmware
//! core only ever talk through that trait.

#![no_std]

extern crate alloc;
#[cfg(any(feature = "std", test))]
extern crate std;

pub mod endpoint;

pub use endpoint::{Endpoint, EndpointError, FakeEndpoint};
