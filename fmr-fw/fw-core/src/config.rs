//! Runtime configuration.

use fmr_model::{
    Attributes, DeviceConfiguration, Endianness, PROTOCOL_VERSION, WireError, WordWidth,
};
use serde::{Deserialize, Serialize};

/// Default stack handed to application tasks.
pub const DEFAULT_STACK_SIZE: usize = 4096;
/// Default base of the virtual address space.
pub const DEFAULT_HEAP_BASE: u32 = 0x2000_0000;
/// Default limit on bytes held by staged buffers.
pub const DEFAULT_HEAP_LIMIT: usize = 256 * 1024;

/// How device addresses are assigned to heap arenas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Placement {
    /// Addresses are handed out from a private address space starting at
    /// `base`. Loaded code is never executed natively.
    Virtual { base: u32 },
    /// Addresses are the arenas' real memory addresses. Only meaningful on
    /// targets with 32-bit pointers.
    Native,
}

impl Default for Placement {
    fn default() -> Self {
        Placement::Virtual {
            base: DEFAULT_HEAP_BASE,
        }
    }
}

/// Everything a [`Runtime`](crate::Runtime) needs to know at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Identity reported in reply to configuration packets
    pub device: DeviceConfiguration,
    #[serde(default)]
    pub placement: Placement,
    /// Upper bound on bytes held by staged buffers
    #[serde(default = "default_heap_limit")]
    pub heap_limit: usize,
    /// Stack size requested for application tasks
    #[serde(default = "default_stack_size")]
    pub stack_size: usize,
}

fn default_heap_limit() -> usize {
    DEFAULT_HEAP_LIMIT
}

fn default_stack_size() -> usize {
    DEFAULT_STACK_SIZE
}

impl RuntimeConfig {
    /// Configuration with default placement and limits.
    pub fn new(device: DeviceConfiguration) -> Self {
        Self {
            device,
            placement: Placement::default(),
            heap_limit: DEFAULT_HEAP_LIMIT,
            stack_size: DEFAULT_STACK_SIZE,
        }
    }

    /// The in-process virtual device: 32-bit little-endian, named `fvm`.
    pub fn virtual_machine() -> Result<Self, WireError> {
        let device = DeviceConfiguration::new(
            "fvm",
            fmr_model::module_identifier("fvm"),
            PROTOCOL_VERSION,
            Attributes {
                word_width: WordWidth::Bits32,
                endianness: Endianness::Little,
            },
        )?;
        Ok(Self::new(device))
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    pub fn with_heap_limit(mut self, heap_limit: usize) -> Self {
        self.heap_limit = heap_limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let json = r#"{
            "device": {
                "name": "board",
                "identifier": 7,
                "version": 1,
                "attributes": { "wordWidth": "bits32", "endianness": "little" }
            }
        }"#;
        let config: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.device.name, "board");
        assert_eq!(config.placement, Placement::default());
        assert_eq!(config.heap_limit, DEFAULT_HEAP_LIMIT);
        assert_eq!(config.stack_size, DEFAULT_STACK_SIZE);
    }

    #[test]
    fn test_virtual_machine_identity() {
        let config = RuntimeConfig::virtual_machine().unwrap();
        assert_eq!(config.device.name, "fvm");
        assert_eq!(config.device.attributes.word_width, WordWidth::Bits32);
    }
}
