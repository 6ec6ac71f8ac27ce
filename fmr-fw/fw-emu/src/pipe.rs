//! Device side of the virtual link.

use fmr_shared::{Endpoint, EndpointError};
use std::collections::VecDeque;

/// Byte queues between the host and the runtime. Implements the device's
/// view of the link: it pulls what the host pushed and pushes what the host
/// will pull.
#[derive(Debug, Default)]
pub(crate) struct Pipe {
    pub(crate) to_device: VecDeque<u8>,
    pub(crate) to_host: VecDeque<u8>,
}

impl Pipe {
    pub(crate) fn clear(&mut self) {
        self.to_device.clear();
        self.to_host.clear();
    }
}

/// Move exactly `buf.len()` bytes out of `queue`.
pub(crate) fn drain_exact(queue: &mut VecDeque<u8>, buf: &mut [u8]) -> Result<(), EndpointError> {
    if queue.len() < buf.len() {
        return Err(EndpointError::Short {
            expected: buf.len(),
            actual: queue.len(),
        });
    }
    let n = buf.len();
    for (slot, byte) in buf.iter_mut().zip(queue.drain(..n)) {
        *slot = byte;
    }
    Ok(())
}

impl Endpoint for Pipe {
    fn configure(&mut self) -> Result<(), EndpointError> {
        Ok(())
    }

    fn ready(&mut self) -> u8 {
        u8::from(!self.to_device.is_empty())
    }

    fn put(&mut self, byte: u8) -> Result<(), EndpointError> {
        self.to_host.push_back(byte);
        Ok(())
    }

    fn get(&mut self) -> Result<u8, EndpointError> {
        self.to_device.pop_front().ok_or(EndpointError::Short {
            expected: 1,
            actual: 0,
        })
    }

    fn push(&mut self, data: &[u8]) -> Result<(), EndpointError> {
        self.to_host.extend(data.iter().copied());
        Ok(())
    }

    fn pull(&mut self, buf: &mut [u8]) -> Result<(), EndpointError> {
        drain_exact(&mut self.to_device, buf)
    }

    fn destroy(&mut self) -> Result<(), EndpointError> {
        self.clear();
        Ok(())
    }
}
