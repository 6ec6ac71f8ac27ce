//! Loadable image ABI.
//!
//! A loadable image starts with a fixed header of eleven little-endian
//! 32-bit words. Every offset is relative to the image base until the
//! loader relocates the image:
//!
//! ```text
//! 0x00  sizeof(name)      0x04  &name
//! 0x08  &main             (zero for modules)
//! 0x0c  sizeof(.module)   0x10  &.module
//! 0x14  sizeof(.data)     0x18  &.data
//! 0x1c  sizeof(.bss)      0x20  &.bss
//! 0x24  sizeof(.got)      0x28  &.got
//! ```
//!
//! The header is followed by the module function table, code, initialized
//! data and uninitialized data. [`ImageBuilder`] produces images in this
//! layout for tools and tests.

extern crate alloc;

use crate::checksum::{Crc, crc16};
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// Width of an ABI word (pointers, table entries, header fields).
pub const ABI_WORD: usize = 4;
/// Size of the image header.
pub const ABI_HEADER_SIZE: usize = 11 * ABI_WORD;

/// A (size, offset) pair describing a region of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Section {
    pub size: u32,
    pub offset: u32,
}

impl Section {
    pub fn new(size: u32, offset: u32) -> Self {
        Self { size, offset }
    }

    /// Byte range of the section, if it lies inside an image of `len` bytes.
    pub fn range(&self, len: usize) -> Option<core::ops::Range<usize>> {
        let start = self.offset as usize;
        let end = start.checked_add(self.size as usize)?;
        (end <= len).then_some(start..end)
    }

    /// Number of ABI words in the section.
    pub fn words(&self) -> usize {
        self.size as usize / ABI_WORD
    }
}

/// Parsed image header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AbiHeader {
    pub name: Section,
    /// Entry offset; zero marks a module, anything else an application
    pub entry: u32,
    pub module: Section,
    pub data: Section,
    pub bss: Section,
    pub got: Section,
}

/// Errors from parsing or validating an image header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiError {
    /// Image shorter than the header
    Truncated { len: usize },
    /// A section reaches past the end of the image
    SectionOutOfBounds {
        section: &'static str,
        offset: u32,
        size: u32,
        len: usize,
    },
    /// A pointer table whose size is not a whole number of words
    Misaligned { section: &'static str, size: u32 },
    /// Entry point outside the image
    EntryOutOfBounds { entry: u32, len: usize },
    /// Empty name region
    MissingName,
    /// Name is not valid UTF-8
    BadName,
}

impl fmt::Display for AbiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbiError::Truncated { len } => {
                write!(f, "image of {len} bytes is shorter than its header")
            }
            AbiError::SectionOutOfBounds {
                section,
                offset,
                size,
                len,
            } => write!(
                f,
                "section {section} (offset 0x{offset:x}, size {size}) exceeds image of {len} bytes"
            ),
            AbiError::Misaligned { section, size } => {
                write!(f, "section {section} size {size} is not a multiple of {ABI_WORD}")
            }
            AbiError::EntryOutOfBounds { entry, len } => {
                write!(f, "entry 0x{entry:x} outside image of {len} bytes")
            }
            AbiError::MissingName => write!(f, "image has no name"),
            AbiError::BadName => write!(f, "image name is not valid UTF-8"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AbiError {}

fn read_word(bytes: &[u8], index: usize) -> u32 {
    let at = index * ABI_WORD;
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

impl AbiHeader {
    /// Read the header at the start of `image`.
    pub fn parse(image: &[u8]) -> Result<Self, AbiError> {
        if image.len() < ABI_HEADER_SIZE {
            return Err(AbiError::Truncated { len: image.len() });
        }
        let w = |i| read_word(image, i);
        Ok(Self {
            name: Section::new(w(0), w(1)),
            entry: w(2),
            module: Section::new(w(3), w(4)),
            data: Section::new(w(5), w(6)),
            bss: Section::new(w(7), w(8)),
            got: Section::new(w(9), w(10)),
        })
    }

    pub fn encode(&self) -> [u8; ABI_HEADER_SIZE] {
        let words = [
            self.name.size,
            self.name.offset,
            self.entry,
            self.module.size,
            self.module.offset,
            self.data.size,
            self.data.offset,
            self.bss.size,
            self.bss.offset,
            self.got.size,
            self.got.offset,
        ];
        let mut buf = [0u8; ABI_HEADER_SIZE];
        for (i, word) in words.iter().enumerate() {
            buf[i * ABI_WORD..(i + 1) * ABI_WORD].copy_from_slice(&word.to_le_bytes());
        }
        buf
    }

    /// Whether the image is an application (has an entry point).
    pub fn is_application(&self) -> bool {
        self.entry != 0
    }

    /// Check every section against an image of `len` bytes.
    pub fn validate(&self, len: usize) -> Result<(), AbiError> {
        let sections = [
            ("name", self.name),
            ("module", self.module),
            ("data", self.data),
            ("bss", self.bss),
            ("got", self.got),
        ];
        for (section, s) in sections {
            if s.range(len).is_none() {
                return Err(AbiError::SectionOutOfBounds {
                    section,
                    offset: s.offset,
                    size: s.size,
                    len,
                });
            }
        }
        for (section, s) in [("module", self.module), ("got", self.got)] {
            if s.size as usize % ABI_WORD != 0 {
                return Err(AbiError::Misaligned {
                    section,
                    size: s.size,
                });
            }
        }
        if self.entry as usize >= len {
            return Err(AbiError::EntryOutOfBounds {
                entry: self.entry,
                len,
            });
        }
        if self.name.size == 0 {
            return Err(AbiError::MissingName);
        }
        Ok(())
    }

    /// Raw name region, terminator included.
    pub fn name_bytes<'a>(&self, image: &'a [u8]) -> Result<&'a [u8], AbiError> {
        let range = self
            .name
            .range(image.len())
            .ok_or(AbiError::SectionOutOfBounds {
                section: "name",
                offset: self.name.offset,
                size: self.name.size,
                len: image.len(),
            })?;
        Ok(&image[range])
    }

    /// Image name, up to the first NUL.
    pub fn name<'a>(&self, image: &'a [u8]) -> Result<&'a str, AbiError> {
        let raw = self.name_bytes(image)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        core::str::from_utf8(&raw[..end]).map_err(|_| AbiError::BadName)
    }

    /// Content identifier: CRC of the name region including its terminator.
    pub fn identifier(&self, image: &[u8]) -> Result<Crc, AbiError> {
        Ok(crc16(self.name_bytes(image)?))
    }
}

/// Builds images in the ABI layout.
///
/// Function and entry offsets are given relative to the start of the code
/// section; GOT entries relative to the start of the data section.
///
/// # Example
///
/// ```
/// use fmr_model::{AbiHeader, ImageBuilder};
///
/// let image = ImageBuilder::new("gpio")
///     .code(&[0u8; 16])
///     .function(0)
///     .function(8)
///     .build();
/// let header = AbiHeader::parse(&image).unwrap();
/// assert_eq!(header.module.words(), 2);
/// assert!(!header.is_application());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ImageBuilder {
    name: String,
    entry: Option<u32>,
    functions: Vec<Option<u32>>,
    code: Vec<u8>,
    got: Vec<u32>,
    data: Vec<u8>,
    bss: u32,
}

/// Byte written into the bss region of built images so zeroing is observable.
pub const BSS_FILL: u8 = 0xA5;

fn align_word(len: usize) -> usize {
    len.div_ceil(ABI_WORD) * ABI_WORD
}

impl ImageBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: String::from(name),
            ..Self::default()
        }
    }

    /// Entry point, making the image an application.
    pub fn entry(mut self, code_offset: u32) -> Self {
        self.entry = Some(code_offset);
        self
    }

    /// Add a function table entry.
    pub fn function(mut self, code_offset: u32) -> Self {
        self.functions.push(Some(code_offset));
        self
    }

    /// Add an unresolved (null) function table entry.
    pub fn null_function(mut self) -> Self {
        self.functions.push(None);
        self
    }

    pub fn code(mut self, code: &[u8]) -> Self {
        self.code = code.to_vec();
        self
    }

    /// Add a GOT entry pointing into the data section.
    pub fn got_data(mut self, data_offset: u32) -> Self {
        self.got.push(data_offset);
        self
    }

    pub fn data(mut self, data: &[u8]) -> Self {
        self.data = data.to_vec();
        self
    }

    pub fn bss(mut self, size: u32) -> Self {
        self.bss = size;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let module_offset = ABI_HEADER_SIZE;
        let module_size = self.functions.len() * ABI_WORD;
        let name_offset = module_offset + module_size;
        let name_size = self.name.len() + 1;
        let code_offset = align_word(name_offset + name_size);
        let got_offset = align_word(code_offset + self.code.len());
        let got_size = self.got.len() * ABI_WORD;
        let data_offset = got_offset + got_size;
        let bss_offset = align_word(data_offset + self.data.len());
        let total = bss_offset + self.bss as usize;

        let header = AbiHeader {
            name: Section::new(name_size as u32, name_offset as u32),
            entry: self.entry.map_or(0, |e| code_offset as u32 + e),
            module: Section::new(module_size as u32, module_offset as u32),
            data: Section::new(self.data.len() as u32, data_offset as u32),
            bss: Section::new(self.bss, bss_offset as u32),
            got: Section::new(got_size as u32, got_offset as u32),
        };

        let mut image = Vec::with_capacity(total);
        image.extend_from_slice(&header.encode());
        for function in &self.functions {
            let word = function.map_or(0, |f| code_offset as u32 + f);
            image.extend_from_slice(&word.to_le_bytes());
        }
        image.extend_from_slice(self.name.as_bytes());
        image.push(0);
        image.resize(code_offset, 0);
        image.extend_from_slice(&self.code);
        image.resize(got_offset, 0);
        for entry in &self.got {
            image.extend_from_slice(&(data_offset as u32 + entry).to_le_bytes());
        }
        image.extend_from_slice(&self.data);
        image.resize(bss_offset, 0);
        image.resize(total, BSS_FILL);
        image
    }
}
