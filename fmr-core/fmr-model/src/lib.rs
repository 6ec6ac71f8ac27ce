//! Wire model for the FMR message runtime.
//!
//! This crate defines everything that crosses the host/device boundary:
//! - Packet framing, classes and the checksum that guards them
//! - Invocations and their packed argument descriptors
//! - Call results and error codes
//! - The self-reported device configuration
//! - The ABI header of loadable images
//! - The numbering of the standard modules
//!
//! It is `no_std` + `alloc` so the same definitions are used by the host
//! library and by the firmware core.

#![no_std]

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod abi;
pub mod args;
pub mod checksum;
pub mod configuration;
pub mod error;
pub mod packet;
pub mod result;
pub mod standard;

pub use abi::{ABI_HEADER_SIZE, ABI_WORD, AbiError, AbiHeader, ImageBuilder, Section};
pub use args::{Arg, ArgType, Args};
pub use checksum::{Crc, crc16, module_identifier};
pub use configuration::{
    Attributes, CONFIGURATION_SIZE, DeviceConfiguration, Endianness, NAME_CAPACITY,
    PROTOCOL_VERSION, WordWidth,
};
pub use error::{ErrorKind, WireError};
pub use packet::{
    HEADER_SIZE, INVOCATION_SIZE, Invocation, MAGIC, MAX_ARGC, PACKET_SIZE, PARAMETER_CAPACITY,
    Packet, PacketClass, USER_INVOCATION_BIT,
};
pub use result::{CallResult, RESULT_SIZE};
