//! Fake endpoint for testing
//!
//! Records everything pushed to it and serves pulls from a queue of
//! scripted bytes. Pulling more than is queued fails with a short transfer,
//! which is how a device that never answers looks to the caller.

use super::{Endpoint, EndpointError};
use alloc::collections::VecDeque;
use alloc::vec::Vec;

/// Scripted endpoint
///
/// - `push()` appends to [`FakeEndpoint::sent`]
/// - `pull()` drains queued bytes
/// - transfers fail with `Unconfigured` until `configure()` is called
#[derive(Debug, Default)]
pub struct FakeEndpoint {
    configured: bool,
    incoming: VecDeque<u8>,
    sent: Vec<u8>,
    /// Number of successful `configure` calls
    pub configure_count: usize,
    /// Number of `destroy` calls
    pub destroy_count: usize,
}

impl FakeEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes to be returned by `pull()`/`get()`
    pub fn queue(&mut self, bytes: &[u8]) {
        self.incoming.extend(bytes.iter().copied());
    }

    /// Everything pushed so far
    pub fn sent(&self) -> &[u8] {
        &self.sent
    }

    pub fn take_sent(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.sent)
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    fn check(&self) -> Result<(), EndpointError> {
        if self.configured {
            Ok(())
        } else {
            Err(EndpointError::Unconfigured)
        }
    }
}

impl Endpoint for FakeEndpoint {
    fn configure(&mut self) -> Result<(), EndpointError> {
        self.configured = true;
        self.configure_count += 1;
        Ok(())
    }

    fn ready(&mut self) -> u8 {
        u8::from(!self.incoming.is_empty())
    }

    fn put(&mut self, byte: u8) -> Result<(), EndpointError> {
        self.check()?;
        self.sent.push(byte);
        Ok(())
    }

    fn get(&mut self) -> Result<u8, EndpointError> {
        self.check()?;
        self.incoming.pop_front().ok_or(EndpointError::Short {
            expected: 1,
            actual: 0,
        })
    }

    fn push(&mut self, data: &[u8]) -> Result<(), EndpointError> {
        self.check()?;
        self.sent.extend_from_slice(data);
        Ok(())
    }

    fn pull(&mut self, buf: &mut [u8]) -> Result<(), EndpointError> {
        self.check()?;
        if self.incoming.len() < buf.len() {
            let actual = self.incoming.len();
            self.incoming.clear();
            return Err(EndpointError::Short {
                expected: buf.len(),
                actual,
            });
        }
        let n = buf.len();
        for (slot, byte) in buf.iter_mut().zip(self.incoming.drain(..n)) {
            *slot = byte;
        }
        Ok(())
    }

    fn destroy(&mut self) -> Result<(), EndpointError> {
        self.configured = false;
        self.destroy_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfers_require_configure() {
        let mut endpoint = FakeEndpoint::new();
        assert_eq!(endpoint.push(&[1]), Err(EndpointError::Unconfigured));
        endpoint.configure().unwrap();
        endpoint.push(&[1, 2]).unwrap();
        assert_eq!(endpoint.sent(), &[1, 2]);
    }

    #[test]
    fn test_short_pull() {
        let mut endpoint = FakeEndpoint::new();
        endpoint.configure().unwrap();
        endpoint.queue(&[1, 2, 3]);
        let mut buf = [0u8; 4];
        assert_eq!(
            endpoint.pull(&mut buf),
            Err(EndpointError::Short {
                expected: 4,
                actual: 3
            })
        );
    }

    #[test]
    fn test_pull_exact() {
        let mut endpoint = FakeEndpoint::new();
        endpoint.configure().unwrap();
        endpoint.queue(&[9, 8, 7]);
        assert_eq!(endpoint.ready(), 1);
        let mut buf = [0u8; 2];
        endpoint.pull(&mut buf).unwrap();
        assert_eq!(buf, [9, 8]);
        assert_eq!(endpoint.get().unwrap(), 7);
        assert_eq!(endpoint.ready(), 0);
    }

    #[test]
    fn test_error_kinds() {
        use fmr_model::ErrorKind;
        assert_eq!(
            ErrorKind::from(EndpointError::Unconfigured),
            ErrorKind::EndpointUnconfigured
        );
        assert_eq!(ErrorKind::from(EndpointError::Closed), ErrorKind::Transfer);
    }
}
