//! Serial port endpoint.
//!
//! Packets, bulk data and results travel as raw bytes over the port. Reads
//! give up after the port timeout and report a short transfer.

use fmr_shared::{Endpoint, EndpointError};
use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;

/// Default read timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

pub struct SerialEndpoint {
    port_name: String,
    baud_rate: u32,
    timeout: Duration,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialEndpoint {
    /// Endpoint for `port_name`; the port is opened by `configure`.
    ///
    /// # Arguments
    /// * `port_name` - e.g. `/dev/ttyACM0`
    /// * `baud_rate` - line speed
    pub fn new(port_name: &str, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.to_string(),
            baud_rate,
            timeout: DEFAULT_TIMEOUT,
            port: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Names of the serial ports present on this machine.
    pub fn available() -> Result<Vec<String>, EndpointError> {
        let ports = serialport::available_ports()
            .map_err(|e| EndpointError::Io(format!("failed to list serial ports: {e}")))?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>, EndpointError> {
        self.port.as_mut().ok_or(EndpointError::Unconfigured)
    }
}

fn io_error(err: io::Error) -> EndpointError {
    EndpointError::Io(err.to_string())
}

impl Endpoint for SerialEndpoint {
    fn configure(&mut self) -> Result<(), EndpointError> {
        if self.port.is_some() {
            return Ok(());
        }
        let port = serialport::new(&self.port_name, self.baud_rate)
            .timeout(self.timeout)
            .open()
            .map_err(|e| EndpointError::Io(format!("failed to open {}: {e}", self.port_name)))?;
        log::debug!("opened {} @ {} baud", self.port_name, self.baud_rate);
        self.port = Some(port);
        Ok(())
    }

    fn ready(&mut self) -> u8 {
        match self.port.as_ref().map(|p| p.bytes_to_read()) {
            Some(Ok(waiting)) => u8::from(waiting > 0),
            _ => 0,
        }
    }

    fn put(&mut self, byte: u8) -> Result<(), EndpointError> {
        self.push(&[byte])
    }

    fn get(&mut self) -> Result<u8, EndpointError> {
        let mut byte = [0u8; 1];
        self.pull(&mut byte)?;
        Ok(byte[0])
    }

    fn push(&mut self, data: &[u8]) -> Result<(), EndpointError> {
        let port = self.port()?;
        port.write_all(data).map_err(io_error)?;
        port.flush().map_err(io_error)
    }

    fn pull(&mut self, buf: &mut [u8]) -> Result<(), EndpointError> {
        let port = self.port()?;
        let mut filled = 0;
        while filled < buf.len() {
            match port.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(e) => return Err(io_error(e)),
            }
        }
        if filled < buf.len() {
            return Err(EndpointError::Short {
                expected: buf.len(),
                actual: filled,
            });
        }
        Ok(())
    }

    fn destroy(&mut self) -> Result<(), EndpointError> {
        if self.port.take().is_some() {
            log::debug!("closed {}", self.port_name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfers_before_configure() {
        let mut endpoint = SerialEndpoint::new("/dev/null-fmr", 115_200);
        assert_eq!(endpoint.push(&[1]), Err(EndpointError::Unconfigured));
        assert_eq!(endpoint.ready(), 0);
        assert!(endpoint.destroy().is_ok());
    }
}
