//! Self-reported device configuration.
//!
//! Wire layout (21 bytes):
//!
//! ```text
//! | name [u8; 16] NUL padded | identifier u16 | version u16 | attributes u8 |
//! ```

extern crate alloc;

use crate::error::WireError;
use alloc::string::{String, ToString};
use serde::{Deserialize, Serialize};

/// Bytes reserved for the device name, terminator included.
pub const NAME_CAPACITY: usize = 16;
/// Size of an encoded configuration record.
pub const CONFIGURATION_SIZE: usize = NAME_CAPACITY + 5;
/// Message runtime protocol version spoken by this crate.
pub const PROTOCOL_VERSION: u16 = 0x0001;

const ATTR_32BIT: u8 = 1 << 0;
const ATTR_BIG_ENDIAN: u8 = 1 << 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WordWidth {
    Bits16,
    Bits32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Endianness {
    Little,
    Big,
}

/// Attribute bitfield of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attributes {
    pub word_width: WordWidth,
    pub endianness: Endianness,
}

impl Attributes {
    pub fn bits(&self) -> u8 {
        let mut bits = 0;
        if self.word_width == WordWidth::Bits32 {
            bits |= ATTR_32BIT;
        }
        if self.endianness == Endianness::Big {
            bits |= ATTR_BIG_ENDIAN;
        }
        bits
    }

    pub fn from_bits(bits: u8) -> Self {
        Self {
            word_width: if bits & ATTR_32BIT != 0 {
                WordWidth::Bits32
            } else {
                WordWidth::Bits16
            },
            endianness: if bits & ATTR_BIG_ENDIAN != 0 {
                Endianness::Big
            } else {
                Endianness::Little
            },
        }
    }
}

/// Configuration a device reports about itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfiguration {
    pub name: String,
    pub identifier: u16,
    pub version: u16,
    pub attributes: Attributes,
}

impl DeviceConfiguration {
    /// Create a configuration, checking that the name fits with its terminator.
    pub fn new(
        name: &str,
        identifier: u16,
        version: u16,
        attributes: Attributes,
    ) -> Result<Self, WireError> {
        if name.len() >= NAME_CAPACITY {
            return Err(WireError::NameTooLong(name.len()));
        }
        Ok(Self {
            name: name.to_string(),
            identifier,
            version,
            attributes,
        })
    }

    pub fn encode(&self) -> Result<[u8; CONFIGURATION_SIZE], WireError> {
        let name = self.name.as_bytes();
        if name.len() >= NAME_CAPACITY {
            return Err(WireError::NameTooLong(name.len()));
        }
        let mut buf = [0u8; CONFIGURATION_SIZE];
        buf[..name.len()].copy_from_slice(name);
        buf[NAME_CAPACITY..NAME_CAPACITY + 2].copy_from_slice(&self.identifier.to_le_bytes());
        buf[NAME_CAPACITY + 2..NAME_CAPACITY + 4].copy_from_slice(&self.version.to_le_bytes());
        buf[NAME_CAPACITY + 4] = self.attributes.bits();
        Ok(buf)
    }

    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < CONFIGURATION_SIZE {
            return Err(WireError::Truncated {
                expected: CONFIGURATION_SIZE,
                actual: buf.len(),
            });
        }
        let raw = &buf[..NAME_CAPACITY];
        let end = raw.iter().position(|&b| b == 0).unwrap_or(NAME_CAPACITY);
        let name = core::str::from_utf8(&raw[..end]).map_err(|_| WireError::BadName)?;
        Ok(Self {
            name: name.to_string(),
            identifier: u16::from_le_bytes([buf[NAME_CAPACITY], buf[NAME_CAPACITY + 1]]),
            version: u16::from_le_bytes([buf[NAME_CAPACITY + 2], buf[NAME_CAPACITY + 3]]),
            attributes: Attributes::from_bits(buf[NAME_CAPACITY + 4]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fvm() -> DeviceConfiguration {
        DeviceConfiguration::new(
            "fvm",
            0x363f,
            PROTOCOL_VERSION,
            Attributes {
                word_width: WordWidth::Bits32,
                endianness: Endianness::Little,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_wire_layout() {
        let buf = fvm().encode().unwrap();
        assert_eq!(&buf[..4], b"fvm\0");
        assert_eq!(&buf[16..21], &[0x3f, 0x36, 0x01, 0x00, 0x01]);
        assert_eq!(DeviceConfiguration::decode(&buf).unwrap(), fvm());
    }

    #[test]
    fn test_name_bound() {
        let attributes = Attributes::from_bits(0);
        assert!(DeviceConfiguration::new("0123456789abcde", 1, 1, attributes).is_ok());
        assert_eq!(
            DeviceConfiguration::new("0123456789abcdef", 1, 1, attributes),
            Err(WireError::NameTooLong(16))
        );
    }

    #[test]
    fn test_attribute_bits() {
        for bits in 0..4u8 {
            assert_eq!(Attributes::from_bits(bits).bits(), bits);
        }
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_string(&fvm()).unwrap();
        assert!(json.contains("\"wordWidth\":\"bits32\""));
        assert!(json.contains("\"identifier\":13887"));
    }
}
