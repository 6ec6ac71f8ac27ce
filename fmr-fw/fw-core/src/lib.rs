//! Firmware core library.
//!
//! The device half of the FMR message runtime: packet dispatch, the
//! built-in modules, the image loader and the module registry. Transports,
//! the task scheduler and calls into loaded code are reached through the
//! [`Endpoint`](fmr_shared::Endpoint), [`Scheduler`] and [`Invoker`] traits.

#![no_std]

extern crate alloc;
#[cfg(any(feature = "std", test))]
extern crate std;

pub mod application;
pub mod config;
pub mod heap;
pub mod image;
pub mod invoker;
pub mod loader;
pub mod registry;
pub mod runtime;
pub mod scheduler;
mod standard;

pub use config::{Placement, RuntimeConfig};
pub use image::{LoadError, RawImage, RelocatedImage};
pub use invoker::{FakeInvoker, Invoker, NativeInvoker};
pub use loader::LoadOutcome;
pub use registry::{MAX_USER_MODULES, Module, ModuleRegistry};
pub use runtime::{Runtime, Served};
pub use scheduler::{ExitHook, FakeScheduler, Scheduler, TaskId};
