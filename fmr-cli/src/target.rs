//! Call targets named on the command line.

use anyhow::{Result, bail};
use fmr_model::standard;

/// What an `invoke` addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Built-in module, by index
    Standard { module: u16, function: u8 },
    /// Loaded module, bound by name
    User { name: String, function: u8 },
}

impl Target {
    /// Parse `module.function`.
    ///
    /// Standard modules accept function names (`sys.ping`) or indices
    /// (`0.0`); any other module name is bound on the device and takes a
    /// function index (`gpio.1`).
    pub fn parse(text: &str) -> Result<Self> {
        let Some((module, function)) = text.split_once('.') else {
            bail!("target '{text}' is not of the form module.function");
        };
        if let Some((module, function)) = standard::resolve(module, function) {
            return Ok(Target::Standard { module, function });
        }
        let Ok(function) = function.parse::<u8>() else {
            bail!("unknown function '{function}' in '{text}'");
        };
        if let Ok(module) = module.parse::<u16>() {
            return Ok(Target::Standard { module, function });
        }
        Ok(Target::User {
            name: module.to_string(),
            function,
        })
    }
}
