//! CRC-16/CCITT-FALSE.
//!
//! Used both as the packet integrity check and as the content-derived
//! identifier of a module (the CRC of its name, terminator included).

/// Checksum / identifier width on the wire.
pub type Crc = u16;

const POLYNOMIAL: u16 = 0x1021;
const INITIAL: u16 = 0xFFFF;

/// Compute the CRC of a byte range.
pub fn crc16(data: &[u8]) -> Crc {
    crc16_update(INITIAL, data)
}

/// Continue a CRC computation over more bytes.
///
/// `crc16_update(crc16(a), b) == crc16(a ++ b)`.
pub fn crc16_update(mut crc: Crc, data: &[u8]) -> Crc {
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ POLYNOMIAL;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Identifier of a module with the given name.
///
/// The NUL terminator is part of the hashed range, so this matches the CRC
/// the device computes over the name stored in an image header.
pub fn module_identifier(name: &str) -> Crc {
    crc16_update(crc16(name.as_bytes()), &[0])
}
