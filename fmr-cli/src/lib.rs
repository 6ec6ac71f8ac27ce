//! FMR command line library.
//!
//! Exposes the pieces of the `fmr` binary for use in tests:
//! - Typed argument parsing (`u8:5`, `ptr:0x20000000`)
//! - Call target resolution (`sys.ping`, `gpio.1`)
//! - Endpoint selection (virtual device or serial port)
//! - The subcommand implementations

pub mod commands;
pub mod connect;
pub mod target;
pub mod typed_arg;

pub use connect::Connection;
pub use target::Target;
