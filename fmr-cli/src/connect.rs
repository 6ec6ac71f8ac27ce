//! Choosing and attaching the device a command talks to.

use anyhow::{Context, Result};
use fmr_client::{DeviceId, Host, SerialEndpoint};
use fmr_shared::Endpoint;
use fw_core::RuntimeConfig;
use fw_emu::VirtualEndpoint;
use std::path::Path;

/// Where the device lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connection {
    /// In-process virtual device, optionally configured from a JSON file
    Virtual { config: Option<std::path::PathBuf> },
    /// Hardware on a serial port
    Serial { port: String, baud_rate: u32 },
}

/// Load a virtual device configuration from JSON.
pub fn read_runtime_config(path: &Path) -> Result<RuntimeConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid configuration in {}", path.display()))
}

fn endpoint(connection: &Connection) -> Result<Box<dyn Endpoint>> {
    match connection {
        Connection::Virtual { config } => {
            let config = match config {
                Some(path) => read_runtime_config(path)?,
                None => RuntimeConfig::virtual_machine()
                    .map_err(|e| anyhow::anyhow!("virtual device: {e}"))?,
            };
            let endpoint = VirtualEndpoint::with_config(config)
                .map_err(|e| anyhow::anyhow!("virtual device: {e}"))?;
            Ok(Box::new(endpoint))
        }
        Connection::Serial { port, baud_rate } => {
            Ok(Box::new(SerialEndpoint::new(port, *baud_rate)))
        }
    }
}

/// Attach the device described by `connection` to `host`.
pub fn connect(host: &mut Host, connection: &Connection) -> Result<DeviceId> {
    let endpoint = endpoint(connection)?;
    let id = host
        .attach(endpoint)
        .with_context(|| format!("failed to attach {connection:?}"))?;
    let configuration = host.current()?.configuration().clone();
    log::info!(
        "attached {id}: '{}' (0x{:04x}) protocol {}",
        configuration.name,
        configuration.identifier,
        configuration.version
    );
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test_log::test]
    fn test_connect_virtual_default() {
        let mut host = Host::new();
        connect(&mut host, &Connection::Virtual { config: None }).unwrap();
        assert_eq!(host.current().unwrap().configuration().name, "fvm");
    }

    #[test_log::test]
    fn test_connect_virtual_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"device":{{"name":"bench","identifier":7,"version":1,"attributes":{{"wordWidth":"bits32","endianness":"little"}}}}}}"#
        )
        .unwrap();
        let connection = Connection::Virtual {
            config: Some(file.path().to_path_buf()),
        };
        let mut host = Host::new();
        connect(&mut host, &connection).unwrap();
        let configuration = host.current().unwrap().configuration().clone();
        assert_eq!(configuration.name, "bench");
        assert_eq!(configuration.identifier, 7);
    }

    #[test]
    fn test_bad_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(read_runtime_config(file.path()).is_err());
    }
}
