//! Host-facing endpoint backed by an in-process runtime.

use crate::pipe::{Pipe, drain_exact};
use fmr_model::{PACKET_SIZE, WireError};
use fmr_shared::{Endpoint, EndpointError};
use fw_core::{FakeInvoker, FakeScheduler, Invoker, Runtime, RuntimeConfig, Scheduler, Served};

/// Endpoint whose far side is a [`Runtime`] running in this process.
///
/// The default runtime uses [`FakeScheduler`] and [`FakeInvoker`]: images
/// load, relocate and register exactly as on hardware, but loaded code is
/// never executed.
pub struct VirtualEndpoint<S: Scheduler = FakeScheduler, I: Invoker = FakeInvoker> {
    runtime: Runtime<S, I>,
    pipe: Pipe,
    configured: bool,
}

impl VirtualEndpoint {
    /// Virtual device with the default `fvm` identity.
    pub fn new() -> Result<Self, WireError> {
        Self::with_config(RuntimeConfig::virtual_machine()?)
    }

    pub fn with_config(config: RuntimeConfig) -> Result<Self, WireError> {
        let runtime = Runtime::new(config, FakeScheduler::new(), FakeInvoker::new())?;
        Ok(Self::with_runtime(runtime))
    }
}

impl<S: Scheduler, I: Invoker> VirtualEndpoint<S, I> {
    pub fn with_runtime(runtime: Runtime<S, I>) -> Self {
        Self {
            runtime,
            pipe: Pipe::default(),
            configured: false,
        }
    }

    pub fn runtime(&self) -> &Runtime<S, I> {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut Runtime<S, I> {
        &mut self.runtime
    }

    fn check(&self) -> Result<(), EndpointError> {
        if self.configured {
            Ok(())
        } else {
            Err(EndpointError::Unconfigured)
        }
    }

    /// Let the device serve queued packets until `wanted` bytes are
    /// waiting for the host or no whole packet is left.
    fn fill(&mut self, wanted: usize) -> Result<(), EndpointError> {
        while self.pipe.to_host.len() < wanted && self.pipe.to_device.len() >= PACKET_SIZE {
            if self.runtime.serve_one(&mut self.pipe)? == Served::Dropped {
                log::debug!("virtual device dropped a packet");
            }
        }
        Ok(())
    }
}

impl<S: Scheduler, I: Invoker> Endpoint for VirtualEndpoint<S, I> {
    fn configure(&mut self) -> Result<(), EndpointError> {
        if !self.configured {
            log::debug!("virtual device '{}' attached", self.runtime.config().device.name);
        }
        self.configured = true;
        Ok(())
    }

    fn ready(&mut self) -> u8 {
        u8::from(!self.pipe.to_host.is_empty())
    }

    fn put(&mut self, byte: u8) -> Result<(), EndpointError> {
        self.check()?;
        self.pipe.to_device.push_back(byte);
        Ok(())
    }

    fn get(&mut self) -> Result<u8, EndpointError> {
        self.check()?;
        self.fill(1)?;
        let mut byte = [0u8; 1];
        drain_exact(&mut self.pipe.to_host, &mut byte)?;
        Ok(byte[0])
    }

    fn push(&mut self, data: &[u8]) -> Result<(), EndpointError> {
        self.check()?;
        self.pipe.to_device.extend(data.iter().copied());
        Ok(())
    }

    fn pull(&mut self, buf: &mut [u8]) -> Result<(), EndpointError> {
        self.check()?;
        self.fill(buf.len())?;
        drain_exact(&mut self.pipe.to_host, buf)
    }

    fn destroy(&mut self) -> Result<(), EndpointError> {
        self.configured = false;
        self.pipe.clear();
        Ok(())
    }
}
