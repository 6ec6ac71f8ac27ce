//! Loadable images and their relocation.
//!
//! An image moves through two states. A [`RawImage`] has a validated
//! header but still holds base-relative pointers. [`RawImage::relocate`]
//! consumes it and yields a [`RelocatedImage`] whose module table and GOT
//! hold device addresses. Relocation cannot run twice on the same bytes.

use crate::heap::{Arena, slice_at};
use alloc::string::{String, ToString};
use core::fmt;
use fmr_model::{ABI_WORD, AbiError, AbiHeader, Crc, ErrorKind, Section};

/// Errors raised while loading an image
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// Header malformed or sections outside the image
    Abi(AbiError),
    /// No staged buffer at the given address
    NoImage(u32),
    /// Registry full and no slot shares the identifier
    RegistryExhausted,
    /// Scheduler refused to create a task
    Task,
    /// No device memory for the image
    Allocation,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Abi(err) => write!(f, "invalid image: {err}"),
            LoadError::NoImage(address) => write!(f, "no image staged at 0x{address:08x}"),
            LoadError::RegistryExhausted => write!(f, "module registry exhausted"),
            LoadError::Task => write!(f, "failed to create application task"),
            LoadError::Allocation => write!(f, "out of memory for image"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for LoadError {}

impl From<AbiError> for LoadError {
    fn from(err: AbiError) -> Self {
        LoadError::Abi(err)
    }
}

impl From<LoadError> for ErrorKind {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::Abi(_) => ErrorKind::InvalidImage,
            LoadError::NoImage(_) => ErrorKind::Null,
            LoadError::RegistryExhausted => ErrorKind::RegistryExhausted,
            LoadError::Task => ErrorKind::Task,
            LoadError::Allocation => ErrorKind::Allocation,
        }
    }
}

fn read_word(arena: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([arena[at], arena[at + 1], arena[at + 2], arena[at + 3]])
}

fn write_word(arena: &mut [u8], at: usize, word: u32) {
    arena[at..at + ABI_WORD].copy_from_slice(&word.to_le_bytes());
}

/// Image with a validated header and base-relative pointers.
#[derive(Debug)]
pub struct RawImage {
    arena: Arena,
    header: AbiHeader,
    name: String,
    identifier: Crc,
}

impl RawImage {
    /// Parse and bounds-check the header. On error the arena is dropped.
    pub fn parse(arena: Arena) -> Result<Self, LoadError> {
        let header = AbiHeader::parse(&arena)?;
        header.validate(arena.len())?;
        let name = header.name(&arena)?.to_string();
        let identifier = header.identifier(&arena)?;
        Ok(Self {
            arena,
            header,
            name,
            identifier,
        })
    }

    pub fn header(&self) -> &AbiHeader {
        &self.header
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add `base` to every module table and GOT entry and zero bss.
    ///
    /// Null module table entries stay null so they keep reading as
    /// unresolved functions.
    pub fn relocate(self, base: u32) -> RelocatedImage {
        let RawImage {
            mut arena,
            header,
            name,
            identifier,
        } = self;

        for at in word_offsets(header.module) {
            let entry = read_word(&arena, at);
            if entry != 0 {
                write_word(&mut arena, at, entry.wrapping_add(base));
            }
        }
        for at in word_offsets(header.got) {
            let entry = read_word(&arena, at);
            write_word(&mut arena, at, entry.wrapping_add(base));
        }
        if let Some(bss) = header.bss.range(arena.len()) {
            arena[bss].fill(0);
        }

        log::debug!(
            "image '{name}' relocated to 0x{base:08x}: {} functions, {} got entries, {} bss bytes",
            header.module.words(),
            header.got.words(),
            header.bss.size
        );

        RelocatedImage {
            arena,
            header,
            name,
            identifier,
            base,
        }
    }
}

fn word_offsets(section: Section) -> impl Iterator<Item = usize> {
    (0..section.words()).map(move |i| section.offset as usize + i * ABI_WORD)
}

/// Image whose pointers are device addresses.
#[derive(Debug, PartialEq)]
pub struct RelocatedImage {
    arena: Arena,
    header: AbiHeader,
    name: String,
    identifier: Crc,
    base: u32,
}

impl RelocatedImage {
    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// CRC of the name, terminator included.
    pub fn identifier(&self) -> Crc {
        self.identifier
    }

    pub fn header(&self) -> &AbiHeader {
        &self.header
    }

    pub fn bytes(&self) -> &[u8] {
        &self.arena
    }

    /// Absolute entry point, for applications.
    pub fn entry(&self) -> Option<u32> {
        self.header
            .is_application()
            .then(|| self.base.wrapping_add(self.header.entry))
    }

    pub fn function_count(&self) -> usize {
        self.header.module.words()
    }

    /// Resolve a function table entry to a device address.
    pub fn function(&self, index: usize) -> Result<u32, ErrorKind> {
        if index >= self.function_count() {
            return Err(ErrorKind::OutOfBounds);
        }
        let at = self.header.module.offset as usize + index * ABI_WORD;
        match read_word(&self.arena, at) {
            0 => Err(ErrorKind::UnresolvedFunction),
            address => Ok(address),
        }
    }

    /// Bytes at `[address, address + len)` if they lie inside the image.
    pub fn slice(&self, address: u32, len: usize) -> Option<&[u8]> {
        slice_at(self.base, &self.arena, address, len)
    }
}
