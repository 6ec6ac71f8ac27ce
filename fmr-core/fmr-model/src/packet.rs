//! Packet framing.
//!
//! Every packet is exactly [`PACKET_SIZE`] bytes on the wire. The header
//! records how many of those bytes are meaningful:
//!
//! ```text
//! +-------+----------+--------+-------+-----------------------------+
//! | magic | checksum | length | class | body (class specific)       |
//! |  u8   |  u16 le  | u16 le |  u8   |                             |
//! +-------+----------+--------+-------+-----------------------------+
//! ```
//!
//! The checksum is a CRC-16 over the first `length` bytes with the two
//! checksum bytes skipped.
//!
//! Invocation body:
//!
//! ```text
//! | module u16 | function u8 | ret u8 | types u16 | argc u8 | params [u8; 32] |
//! ```
//!
//! Push/pull bodies carry a `u32` bulk length followed by an invocation body.

use crate::args::{ArgType, Args};
use crate::checksum::{crc16, crc16_update};
use crate::error::WireError;
use core::fmt;

/// Magic byte opening every packet.
pub const MAGIC: u8 = 0xFE;
/// Fixed size of a packet on the wire.
pub const PACKET_SIZE: usize = 64;
/// Size of the packet header.
pub const HEADER_SIZE: usize = 6;
/// Maximum number of arguments of a single invocation.
pub const MAX_ARGC: usize = 8;
/// Bytes reserved for packed arguments (`MAX_ARGC` × widest type).
pub const PARAMETER_CAPACITY: usize = MAX_ARGC * 4;
/// Size of an encoded invocation body.
pub const INVOCATION_SIZE: usize = 7 + PARAMETER_CAPACITY;
/// Module-index bit marking a dynamically loaded (user) module.
pub const USER_INVOCATION_BIT: u16 = 0x8000;

const PUSH_PULL_SIZE: usize = 4 + INVOCATION_SIZE;
const EVENT_SIZE: usize = 6;

const _: () = assert!(HEADER_SIZE + PUSH_PULL_SIZE <= PACKET_SIZE);

/// Packet class tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketClass {
    Configuration = 0,
    StandardInvocation = 1,
    UserInvocation = 2,
    Push = 3,
    Pull = 4,
    Event = 5,
}

impl PacketClass {
    pub fn from_tag(tag: u8) -> Result<Self, WireError> {
        match tag {
            0 => Ok(PacketClass::Configuration),
            1 => Ok(PacketClass::StandardInvocation),
            2 => Ok(PacketClass::UserInvocation),
            3 => Ok(PacketClass::Push),
            4 => Ok(PacketClass::Pull),
            5 => Ok(PacketClass::Event),
            other => Err(WireError::BadClass(other)),
        }
    }

    fn name(self) -> &'static str {
        match self {
            PacketClass::Configuration => "configuration",
            PacketClass::StandardInvocation => "std_call",
            PacketClass::UserInvocation => "user_call",
            PacketClass::Push => "push",
            PacketClass::Pull => "pull",
            PacketClass::Event => "event",
        }
    }
}

impl fmt::Display for PacketClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single remote function call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Module index; [`USER_INVOCATION_BIT`] set for loaded modules
    pub module: u16,
    /// Function index inside the module
    pub function: u8,
    /// Type the caller expects back
    pub ret: ArgType,
    /// Arguments, at most [`MAX_ARGC`]
    pub args: Args,
}

impl Invocation {
    /// Create an invocation, checking the argument bound.
    pub fn new(module: u16, function: u8, ret: ArgType, args: Args) -> Result<Self, WireError> {
        if args.len() > MAX_ARGC {
            return Err(WireError::TooManyArguments(args.len()));
        }
        Ok(Self {
            module,
            function,
            ret,
            args,
        })
    }

    /// Whether the target is a dynamically loaded module.
    pub fn is_user(&self) -> bool {
        self.module & USER_INVOCATION_BIT != 0
    }

    /// Module index with the user marker removed.
    pub fn module_index(&self) -> u16 {
        self.module & !USER_INVOCATION_BIT
    }

    fn encode_into(&self, out: &mut [u8]) -> Result<(), WireError> {
        out[0..2].copy_from_slice(&self.module.to_le_bytes());
        out[2] = self.function;
        out[3] = self.ret as u8;
        out[4..6].copy_from_slice(&self.args.descriptor()?.to_le_bytes());
        out[6] = self.args.len() as u8;
        self.args.pack(&mut out[7..7 + PARAMETER_CAPACITY])?;
        Ok(())
    }

    fn decode(body: &[u8]) -> Result<Self, WireError> {
        if body.len() < INVOCATION_SIZE {
            return Err(WireError::Truncated {
                expected: INVOCATION_SIZE,
                actual: body.len(),
            });
        }
        let module = u16::from_le_bytes([body[0], body[1]]);
        let function = body[2];
        let ret = ArgType::from_tag(body[3])?;
        let types = u16::from_le_bytes([body[4], body[5]]);
        let argc = body[6];
        let args = Args::unpack(types, argc, &body[7..7 + PARAMETER_CAPACITY])?;
        Ok(Self {
            module,
            function,
            ret,
            args,
        })
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}0x{:x}.{} {} -> {}",
            if self.is_user() { "user:" } else { "" },
            self.module_index(),
            self.function,
            self.args,
            self.ret
        )
    }
}

/// A decoded packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Ask the device for its configuration
    Configuration,
    /// Call a built-in function
    Standard(Invocation),
    /// Call a function of a loaded module
    User(Invocation),
    /// Bulk host → device transfer of `length` bytes, then call
    Push { length: u32, call: Invocation },
    /// Call, then bulk device → host transfer of `length` bytes
    Pull { length: u32, call: Invocation },
    /// Unsolicited notification
    Event { identifier: u16, value: u32 },
}

impl Packet {
    /// Wrap an invocation in the class selected by its module index.
    pub fn call(invocation: Invocation) -> Self {
        if invocation.is_user() {
            Packet::User(invocation)
        } else {
            Packet::Standard(invocation)
        }
    }

    pub fn class(&self) -> PacketClass {
        match self {
            Packet::Configuration => PacketClass::Configuration,
            Packet::Standard(_) => PacketClass::StandardInvocation,
            Packet::User(_) => PacketClass::UserInvocation,
            Packet::Push { .. } => PacketClass::Push,
            Packet::Pull { .. } => PacketClass::Pull,
            Packet::Event { .. } => PacketClass::Event,
        }
    }

    fn body_len(&self) -> usize {
        match self {
            Packet::Configuration => 0,
            Packet::Standard(_) | Packet::User(_) => INVOCATION_SIZE,
            Packet::Push { .. } | Packet::Pull { .. } => PUSH_PULL_SIZE,
            Packet::Event { .. } => EVENT_SIZE,
        }
    }

    /// Encode into a full wire packet with length and checksum filled in.
    pub fn encode(&self) -> Result<[u8; PACKET_SIZE], WireError> {
        let mut buf = [0u8; PACKET_SIZE];
        let length = HEADER_SIZE + self.body_len();
        buf[0] = MAGIC;
        buf[3..5].copy_from_slice(&(length as u16).to_le_bytes());
        buf[5] = self.class() as u8;

        let body = &mut buf[HEADER_SIZE..];
        match self {
            Packet::Configuration => {}
            Packet::Standard(call) | Packet::User(call) => call.encode_into(body)?,
            Packet::Push { length, call } | Packet::Pull { length, call } => {
                body[0..4].copy_from_slice(&length.to_le_bytes());
                call.encode_into(&mut body[4..])?;
            }
            Packet::Event { identifier, value } => {
                body[0..2].copy_from_slice(&identifier.to_le_bytes());
                body[2..6].copy_from_slice(&value.to_le_bytes());
            }
        }

        let checksum = checksum(&buf[..length]);
        buf[1..3].copy_from_slice(&checksum.to_le_bytes());
        Ok(buf)
    }

    /// Validate and decode a wire packet.
    ///
    /// Magic and checksum are checked before any other field is read.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < HEADER_SIZE {
            return Err(WireError::Truncated {
                expected: HEADER_SIZE,
                actual: buf.len(),
            });
        }
        if buf[0] != MAGIC {
            return Err(WireError::BadMagic(buf[0]));
        }
        let length = u16::from_le_bytes([buf[3], buf[4]]);
        let len = length as usize;
        if !(HEADER_SIZE..=PACKET_SIZE).contains(&len) || len > buf.len() {
            return Err(WireError::BadLength(length));
        }
        let stored = u16::from_le_bytes([buf[1], buf[2]]);
        let computed = checksum(&buf[..len]);
        if stored != computed {
            return Err(WireError::BadChecksum { stored, computed });
        }

        let class = PacketClass::from_tag(buf[5])?;
        let body = &buf[HEADER_SIZE..len];
        let packet = match class {
            PacketClass::Configuration => Packet::Configuration,
            PacketClass::StandardInvocation => Packet::Standard(Invocation::decode(body)?),
            PacketClass::UserInvocation => Packet::User(Invocation::decode(body)?),
            PacketClass::Push | PacketClass::Pull => {
                if body.len() < PUSH_PULL_SIZE {
                    return Err(WireError::Truncated {
                        expected: PUSH_PULL_SIZE,
                        actual: body.len(),
                    });
                }
                let length = u32::from_le_bytes([body[0], body[1], body[2], body[3]]);
                let call = Invocation::decode(&body[4..])?;
                if class == PacketClass::Push {
                    Packet::Push { length, call }
                } else {
                    Packet::Pull { length, call }
                }
            }
            PacketClass::Event => {
                if body.len() < EVENT_SIZE {
                    return Err(WireError::Truncated {
                        expected: EVENT_SIZE,
                        actual: body.len(),
                    });
                }
                Packet::Event {
                    identifier: u16::from_le_bytes([body[0], body[1]]),
                    value: u32::from_le_bytes([body[2], body[3], body[4], body[5]]),
                }
            }
        };
        Ok(packet)
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Packet::Configuration => write!(f, "[configuration]"),
            Packet::Standard(call) | Packet::User(call) => write!(f, "[{}] {call}", self.class()),
            Packet::Push { length, call } | Packet::Pull { length, call } => {
                write!(f, "[{} {length} bytes] {call}", self.class())
            }
            Packet::Event { identifier, value } => {
                write!(f, "[event 0x{identifier:04x}] 0x{value:x}")
            }
        }
    }
}

/// Checksum of the meaningful bytes of a packet, skipping the checksum field.
pub fn checksum(packet: &[u8]) -> u16 {
    let crc = crc16(&packet[..1]);
    crc16_update(crc, &packet[3..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::Arg;

    fn sample_call() -> Invocation {
        Invocation::new(
            3,
            1,
            ArgType::Int32,
            Args::new().append(7u8).append(0x1234u16),
        )
        .unwrap()
    }

    #[test]
    fn test_encode_sets_header() {
        let buf = Packet::Configuration.encode().unwrap();
        assert_eq!(buf[0], MAGIC);
        assert_eq!(u16::from_le_bytes([buf[3], buf[4]]) as usize, HEADER_SIZE);
        assert_eq!(buf[5], PacketClass::Configuration as u8);
    }

    #[test]
    fn test_call_selects_class_from_module_bit() {
        let standard = Packet::call(sample_call());
        assert_eq!(standard.class(), PacketClass::StandardInvocation);

        let mut user = sample_call();
        user.module |= USER_INVOCATION_BIT;
        let user = Packet::call(user);
        assert_eq!(user.class(), PacketClass::UserInvocation);
    }

    #[test]
    fn test_decode_invocation() {
        let packet = Packet::call(sample_call());
        let decoded = Packet::decode(&packet.encode().unwrap()).unwrap();
        assert_eq!(decoded, packet);
        if let Packet::Standard(call) = decoded {
            assert_eq!(call.args.as_slice(), &[Arg::Int8(7), Arg::Int16(0x1234)]);
        }
    }

    #[test]
    fn test_decode_push_keeps_length() {
        let packet = Packet::Push {
            length: 4096,
            call: sample_call(),
        };
        let decoded = Packet::decode(&packet.encode().unwrap()).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_any_covered_byte_mutation_is_rejected() {
        let buf = Packet::call(sample_call()).encode().unwrap();
        let length = u16::from_le_bytes([buf[3], buf[4]]) as usize;
        for i in (0..length).filter(|i| !(1..3).contains(i)) {
            let mut mutated = buf;
            mutated[i] ^= 0x01;
            assert!(Packet::decode(&mutated).is_err(), "byte {i} not covered");
        }
    }

    #[test]
    fn test_bad_magic_rejected_first() {
        let mut buf = Packet::Configuration.encode().unwrap();
        buf[0] = 0x00;
        assert_eq!(Packet::decode(&buf), Err(WireError::BadMagic(0x00)));
    }

    #[test]
    fn test_bad_checksum() {
        let mut buf = Packet::Configuration.encode().unwrap();
        buf[1] ^= 0xFF;
        assert!(matches!(
            Packet::decode(&buf),
            Err(WireError::BadChecksum { .. })
        ));
    }

    #[test]
    fn test_bytes_past_length_are_ignored() {
        let mut buf = Packet::Configuration.encode().unwrap();
        buf[PACKET_SIZE - 1] = 0x55;
        assert_eq!(Packet::decode(&buf).unwrap(), Packet::Configuration);
    }

    #[test]
    fn test_too_many_arguments_rejected_at_construction() {
        let mut args = Args::new();
        for i in 0..=MAX_ARGC {
            args.push(i as u8);
        }
        assert!(Invocation::new(0, 0, ArgType::Int8, args).is_err());
    }

    #[test]
    fn test_widest_invocation_fits() {
        let mut args = Args::new();
        for i in 0..MAX_ARGC {
            args.push(i as u32);
        }
        let call = Invocation::new(0, 0, ArgType::Int32, args).unwrap();
        let packet = Packet::Pull { length: 1, call };
        assert_eq!(Packet::decode(&packet.encode().unwrap()).unwrap(), packet);
    }
}
