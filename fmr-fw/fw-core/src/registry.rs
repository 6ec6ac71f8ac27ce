//! Bounded table of loaded modules.
//!
//! Slot indices are stable: a module never moves once registered, and a
//! reload of the same identifier overwrites its slot in place. The count is
//! a high-water mark over used slots; releasing a module empties its slot
//! but never lowers the count, so an index at or past it is always refused.

use crate::image::{LoadError, RelocatedImage};
use alloc::vec::Vec;
use fmr_model::{Crc, ErrorKind};

/// Capacity of the module registry.
pub const MAX_USER_MODULES: usize = 16;

/// A registered module. Owns its image.
#[derive(Debug, PartialEq)]
pub struct Module {
    image: RelocatedImage,
}

impl Module {
    pub fn identifier(&self) -> Crc {
        self.image.identifier()
    }

    pub fn name(&self) -> &str {
        self.image.name()
    }

    pub fn base(&self) -> u32 {
        self.image.base()
    }

    pub fn function_count(&self) -> usize {
        self.image.function_count()
    }

    /// Device address of function `index`.
    pub fn function(&self, index: usize) -> Result<u32, ErrorKind> {
        self.image.function(index)
    }

    pub fn image(&self) -> &RelocatedImage {
        &self.image
    }
}

pub struct ModuleRegistry {
    slots: Vec<Option<Module>>,
    count: usize,
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleRegistry {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(MAX_USER_MODULES);
        slots.resize_with(MAX_USER_MODULES, || None);
        Self { slots, count: 0 }
    }

    /// Register a module image, replacing any module with the same identifier.
    ///
    /// # Returns
    /// * `Ok(index)` - the slot the module now occupies
    /// * `Err(LoadError::RegistryExhausted)` - no free or matching slot; the
    ///   image is dropped
    pub fn register(&mut self, image: RelocatedImage) -> Result<u16, LoadError> {
        let identifier = image.identifier();
        let index = match self.index_of(identifier) {
            Some(index) => {
                log::info!(
                    "registry: replacing module '{}' in slot {index}",
                    image.name()
                );
                // old image freed before the slot is overwritten
                self.slots[index as usize] = None;
                index
            }
            None => self.free_slot()?,
        };
        log::debug!(
            "registry: module '{}' (0x{identifier:04x}) in slot {index}",
            image.name()
        );
        self.slots[index as usize] = Some(Module { image });
        Ok(index)
    }

    /// First released slot below the count, else the next unused one.
    fn free_slot(&mut self) -> Result<u16, LoadError> {
        if let Some(index) = self.slots[..self.count].iter().position(Option::is_none) {
            return Ok(index as u16);
        }
        if self.count >= MAX_USER_MODULES {
            return Err(LoadError::RegistryExhausted);
        }
        self.count += 1;
        Ok((self.count - 1) as u16)
    }

    /// Slot holding the module with `identifier`.
    pub fn index_of(&self, identifier: Crc) -> Option<u16> {
        self.slots[..self.count]
            .iter()
            .position(|slot| matches!(slot, Some(m) if m.identifier() == identifier))
            .map(|index| index as u16)
    }

    /// Module in slot `index`.
    ///
    /// # Returns
    /// * `Err(ErrorKind::OutOfBounds)` - `index` is at or past the count
    /// * `Err(ErrorKind::UnresolvedFunction)` - the slot was released
    pub fn get(&self, index: u16) -> Result<&Module, ErrorKind> {
        let index = index as usize;
        if index >= self.count {
            return Err(ErrorKind::OutOfBounds);
        }
        self.slots[index]
            .as_ref()
            .ok_or(ErrorKind::UnresolvedFunction)
    }

    /// Clear slot `index`, handing back the module it held.
    pub fn release(&mut self, index: u16) -> Result<Module, ErrorKind> {
        let slot = self.slots[..self.count]
            .get_mut(index as usize)
            .ok_or(ErrorKind::OutOfBounds)?;
        let module = slot.take().ok_or(ErrorKind::Null)?;
        log::info!("registry: released module '{}' from slot {index}", module.name());
        Ok(module)
    }

    /// Number of slots ever used; valid indices are below it.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of slots holding a module.
    pub fn loaded(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &Module)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|m| (i as u16, m)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::RawImage;
    use fmr_model::{ImageBuilder, module_identifier};

    fn module(name: &str, functions: usize, base: u32) -> RelocatedImage {
        let mut builder = ImageBuilder::new(name).code(&[0; 32]);
        for i in 0..functions {
            builder = builder.function(i as u32 * 4);
        }
        RawImage::parse(builder.build()).unwrap().relocate(base)
    }

    #[test]
    fn test_register_takes_next_free_slot() {
        let mut registry = ModuleRegistry::new();
        assert_eq!(registry.register(module("a", 1, 0x100)).unwrap(), 0);
        assert_eq!(registry.register(module("b", 1, 0x200)).unwrap(), 1);
        assert_eq!(registry.count(), 2);
        assert_eq!(registry.index_of(module_identifier("b")), Some(1));
    }

    #[test]
    fn test_same_identifier_replaces_in_place() {
        let mut registry = ModuleRegistry::new();
        registry.register(module("a", 1, 0x100)).unwrap();
        registry.register(module("gpio", 1, 0x200)).unwrap();
        let index = registry.register(module("gpio", 3, 0x300)).unwrap();
        assert_eq!(index, 1);
        assert_eq!(registry.count(), 2);
        let module = registry.get(1).unwrap();
        assert_eq!(module.base(), 0x300);
        assert_eq!(module.function_count(), 3);
    }

    #[test]
    fn test_exhausted() {
        let mut registry = ModuleRegistry::new();
        for i in 0..MAX_USER_MODULES {
            registry
                .register(module(&alloc::format!("m{i}"), 1, 0x100))
                .unwrap();
        }
        assert_eq!(
            registry.register(module("extra", 1, 0x100)).unwrap_err(),
            LoadError::RegistryExhausted
        );
        // a matching identifier still replaces
        assert_eq!(registry.register(module("m3", 2, 0x500)).unwrap(), 3);
    }

    #[test]
    fn test_release() {
        let mut registry = ModuleRegistry::new();
        registry.register(module("a", 1, 0x100)).unwrap();
        registry.release(0).unwrap();
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.loaded(), 0);
        assert_eq!(registry.release(0), Err(ErrorKind::Null));
        assert_eq!(registry.release(1), Err(ErrorKind::OutOfBounds));
        assert_eq!(registry.release(99), Err(ErrorKind::OutOfBounds));
        assert_eq!(registry.get(0).unwrap_err(), ErrorKind::UnresolvedFunction);
    }

    #[test]
    fn test_release_keeps_count_as_bound() {
        let mut registry = ModuleRegistry::new();
        registry.register(module("a", 1, 0x100)).unwrap();
        registry.register(module("b", 1, 0x200)).unwrap();
        registry.release(0).unwrap();
        assert_eq!(registry.count(), 2);
        assert_eq!(registry.get(2).unwrap_err(), ErrorKind::OutOfBounds);
        assert_eq!(registry.get(1).unwrap().name(), "b");
        assert_eq!(registry.index_of(module_identifier("a")), None);
    }

    #[test]
    fn test_released_slot_is_reused_before_growing() {
        let mut registry = ModuleRegistry::new();
        registry.register(module("a", 1, 0x100)).unwrap();
        registry.register(module("b", 1, 0x200)).unwrap();
        registry.release(0).unwrap();
        assert_eq!(registry.register(module("c", 1, 0x300)).unwrap(), 0);
        assert_eq!(registry.count(), 2);
        assert_eq!(registry.register(module("d", 1, 0x400)).unwrap(), 2);
        assert_eq!(registry.count(), 3);
    }
}
