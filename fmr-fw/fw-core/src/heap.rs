//! Device heap: owned byte arenas addressed by device address.
//!
//! Staged buffers (images on their way to the loader, push/pull swap
//! buffers, data kept by `ram.load`) live here until they are freed or
//! handed to the loader. An arena handed to the loader with [`Heap::claim`]
//! keeps its address range and its bytes counted against the limit until
//! [`Heap::retire`] is called, so resident images are never overlapped by
//! later allocations.

use crate::config::Placement;
use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;
use fmr_model::{ABI_WORD, ErrorKind};
use hashbrown::HashMap;

/// Arena of device memory with a known length.
pub type Arena = Vec<u8>;

pub struct Heap {
    placement: Placement,
    limit: usize,
    used: usize,
    /// Arenas still owned by the heap
    arenas: HashMap<u32, Arena>,
    /// Every reserved range, owned or claimed: address to length
    reserved: BTreeMap<u32, usize>,
}

/// Address space a virtual arena of `len` bytes occupies, trailing gap included.
fn span(len: usize) -> Option<u32> {
    let span = len.div_ceil(ABI_WORD).checked_mul(ABI_WORD)?.checked_add(ABI_WORD)?;
    u32::try_from(span).ok()
}

impl Heap {
    pub fn new(placement: Placement, limit: usize) -> Self {
        Self {
            placement,
            limit,
            used: 0,
            arenas: HashMap::new(),
            reserved: BTreeMap::new(),
        }
    }

    /// Allocate a zeroed arena of `len` bytes.
    pub fn alloc(&mut self, len: usize) -> Result<u32, ErrorKind> {
        self.check_limit(len)?;
        self.insert(vec![0u8; len])
    }

    /// Adopt an existing arena, returning its device address.
    pub fn insert(&mut self, mut arena: Arena) -> Result<u32, ErrorKind> {
        self.check_limit(arena.len())?;
        if arena.capacity() == 0 {
            // empty vectors share a dangling pointer
            arena.reserve(1);
        }
        let address = self.address_for(&arena)?;
        self.used += arena.len();
        self.reserved.insert(address, arena.len());
        self.arenas.insert(address, arena);
        log::trace!("heap: 0x{address:08x} reserved, {} bytes in use", self.used);
        Ok(address)
    }

    fn check_limit(&self, len: usize) -> Result<(), ErrorKind> {
        if self.used.saturating_add(len) > self.limit {
            log::warn!(
                "heap: allocation of {len} bytes refused ({} of {} in use)",
                self.used,
                self.limit
            );
            return Err(ErrorKind::Allocation);
        }
        Ok(())
    }

    fn address_for(&self, arena: &Arena) -> Result<u32, ErrorKind> {
        match self.placement {
            Placement::Virtual { base } => {
                // first fit between reserved ranges
                let wanted = span(arena.len()).ok_or(ErrorKind::Allocation)?;
                let mut start = base;
                for (&address, &len) in self.reserved.range(base..) {
                    let end = start.checked_add(wanted).ok_or(ErrorKind::Allocation)?;
                    if end <= address {
                        return Ok(start);
                    }
                    let occupied = span(len).ok_or(ErrorKind::Allocation)?;
                    start = start.max(address.checked_add(occupied).ok_or(ErrorKind::Allocation)?);
                }
                start.checked_add(wanted).ok_or(ErrorKind::Allocation)?;
                Ok(start)
            }
            Placement::Native => {
                u32::try_from(arena.as_ptr() as usize).map_err(|_| ErrorKind::Unimplemented)
            }
        }
    }

    pub fn get(&self, address: u32) -> Option<&Arena> {
        self.arenas.get(&address)
    }

    pub fn get_mut(&mut self, address: u32) -> Option<&mut Arena> {
        self.arenas.get_mut(&address)
    }

    /// Remove an arena and release its range.
    pub fn take(&mut self, address: u32) -> Option<Arena> {
        let arena = self.arenas.remove(&address)?;
        self.unreserve(address);
        Some(arena)
    }

    /// Move an arena out while keeping its range reserved and its bytes
    /// counted. The range stays taken until [`Heap::retire`].
    pub fn claim(&mut self, address: u32) -> Option<Arena> {
        self.arenas.remove(&address)
    }

    /// Release the range of an arena moved out by [`Heap::claim`].
    pub fn retire(&mut self, address: u32) {
        if self.arenas.contains_key(&address) {
            return;
        }
        if self.unreserve(address) {
            log::trace!("heap: 0x{address:08x} retired, {} bytes in use", self.used);
        }
    }

    fn unreserve(&mut self, address: u32) -> bool {
        match self.reserved.remove(&address) {
            Some(len) => {
                self.used -= len;
                true
            }
            None => false,
        }
    }

    /// Free the arena at `address`.
    pub fn free(&mut self, address: u32) -> Result<(), ErrorKind> {
        self.take(address).map(drop).ok_or(ErrorKind::Null)
    }

    /// Find the arena containing `[address, address + len)`.
    pub fn find(&self, address: u32, len: usize) -> Option<&[u8]> {
        self.arenas
            .iter()
            .find_map(|(&base, arena)| slice_at(base, arena, address, len))
    }

    /// Bytes currently reserved, claimed arenas included.
    pub fn used(&self) -> usize {
        self.used
    }

    /// Number of arenas owned by the heap.
    pub fn len(&self) -> usize {
        self.arenas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arenas.is_empty()
    }
}

/// Sub-slice of an arena based at `base`, if it covers the requested range.
pub(crate) fn slice_at(base: u32, arena: &[u8], address: u32, len: usize) -> Option<&[u8]> {
    let start = address.checked_sub(base)? as usize;
    let end = start.checked_add(len)?;
    arena.get(start..end)
}
