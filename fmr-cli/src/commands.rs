//! Subcommand implementations.
//!
//! Each command runs against the current device of a [`Host`] and returns a
//! serializable report; the binary prints it as JSON.

use crate::target::Target;
use anyhow::{Context, Result};
use fmr_client::{Host, ModuleHandle};
use fmr_model::{AbiHeader, ArgType, Args, DeviceConfiguration};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoReport {
    pub configuration: DeviceConfiguration,
    pub protocol: u16,
    pub module_count: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallReport {
    pub value: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    pub name: String,
    pub application: bool,
    /// Task id for an application, registry slot for a module
    pub result: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<ModuleHandle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call: Option<CallReport>,
}

/// Device identity and standard module status.
pub fn info(host: &mut Host) -> Result<InfoReport> {
    let device = host.current()?;
    let configuration = device.configuration().clone();
    let protocol = device.version()?;
    let module_count = device.module_count()?;
    Ok(InfoReport {
        configuration,
        protocol,
        module_count,
    })
}

pub fn ping(host: &mut Host) -> Result<CallReport> {
    let value = host.current()?.ping()?;
    Ok(CallReport { value })
}

/// Call `target` with `args`.
pub fn invoke(host: &mut Host, target: &Target, ret: ArgType, args: Args) -> Result<CallReport> {
    let value = match target {
        Target::Standard { module, function } => {
            host.current()?.invoke(*module, *function, ret, args)?
        }
        Target::User { name, function } => {
            let module = host.bind(name)?;
            host.invoke(&module, *function, ret, args)?
        }
    };
    Ok(CallReport { value })
}

/// A function to call on a module right after loading it.
#[derive(Debug, Clone)]
pub struct FollowUp {
    pub function: u8,
    pub ret: ArgType,
    pub args: Args,
}

/// Install the image at `path` and optionally call into it.
pub fn load(host: &mut Host, path: &Path, follow_up: Option<FollowUp>) -> Result<LoadReport> {
    let image =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let header = AbiHeader::parse(&image)
        .map_err(|e| anyhow::anyhow!("{} is not a loadable image: {e}", path.display()))?;
    let name = header
        .name(&image)
        .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?
        .to_string();
    let application = header.is_application();

    let result = host.current()?.install(&image)?;
    log::info!("installed '{name}' -> {result}");

    let mut report = LoadReport {
        name,
        application,
        result,
        module: None,
        call: None,
    };
    if application {
        return Ok(report);
    }

    let module = host.bind(&report.name)?;
    if let Some(follow_up) = follow_up {
        let value = host.invoke(&module, follow_up.function, follow_up.ret, follow_up.args)?;
        report.call = Some(CallReport { value });
    }
    report.module = Some(module);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connect::{Connection, connect};
    use fmr_model::{ErrorKind, ImageBuilder, module_identifier};
    use std::io::Write;

    fn host() -> Host {
        let mut host = Host::new();
        connect(&mut host, &Connection::Virtual { config: None }).unwrap();
        host
    }

    fn image_file(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file
    }

    #[test_log::test]
    fn test_info() {
        let report = info(&mut host()).unwrap();
        assert_eq!(report.configuration.name, "fvm");
        assert_eq!(report.module_count, 0);
    }

    #[test_log::test]
    fn test_ping_returns_identifier() {
        assert_eq!(ping(&mut host()).unwrap().value, module_identifier("fvm") as u32);
    }

    #[test_log::test]
    fn test_invoke_standard_by_name() {
        let target = Target::parse("sys.version").unwrap();
        let report = invoke(&mut host(), &target, ArgType::Int16, Args::new()).unwrap();
        assert_eq!(report.value, fmr_model::PROTOCOL_VERSION as u32);
    }

    #[test_log::test]
    fn test_invoke_unloaded_module() {
        let target = Target::parse("gpio.0").unwrap();
        let err = invoke(&mut host(), &target, ArgType::Int32, Args::new()).unwrap_err();
        let err = err.downcast::<fmr_client::ClientError>().unwrap();
        assert_eq!(err.kind(), ErrorKind::NoCounterpartModule);
    }

    #[test_log::test]
    fn test_load_module_then_call() {
        let image = ImageBuilder::new("gpio")
            .function(0)
            .function(4)
            .code(&[0; 8])
            .build();
        let file = image_file(&image);
        let mut host = host();
        let report = load(
            &mut host,
            file.path(),
            Some(FollowUp {
                function: 1,
                ret: ArgType::Int32,
                args: Args::new().append(5u8),
            }),
        )
        .unwrap();
        assert_eq!(report.name, "gpio");
        assert!(!report.application);
        assert_eq!(report.result, 0);
        assert!(report.call.is_some());
        assert_eq!(info(&mut host).unwrap().module_count, 1);
    }

    #[test_log::test]
    fn test_load_rejects_garbage() {
        let file = image_file(&[0u8; 8]);
        assert!(load(&mut host(), file.path(), None).is_err());
    }
}
