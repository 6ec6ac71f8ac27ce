//! Built-in modules: `sys`, `fld` and `ram`.

use crate::invoker::Invoker;
use crate::runtime::Runtime;
use crate::scheduler::Scheduler;
use alloc::vec::Vec;
use fmr_model::standard::{MODULES, fld, ram, sys};
use fmr_model::{Arg, Args, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StandardFunction {
    Ping,
    Version,
    ModuleCount,
    Index,
    Load,
    Release,
    RamLoad,
    RamRead,
    RamFree,
}

impl StandardFunction {
    /// Bounds-check `module.function` against the standard table.
    fn resolve(module: u16, function: u8) -> Result<Self, ErrorKind> {
        let (_, functions) = MODULES.get(module as usize).ok_or(ErrorKind::OutOfBounds)?;
        if function as usize >= functions.len() {
            return Err(ErrorKind::OutOfBounds);
        }
        let resolved = match (module, function) {
            (sys::MODULE, sys::PING) => StandardFunction::Ping,
            (sys::MODULE, sys::VERSION) => StandardFunction::Version,
            (sys::MODULE, sys::MODULE_COUNT) => StandardFunction::ModuleCount,
            (fld::MODULE, fld::INDEX) => StandardFunction::Index,
            (fld::MODULE, fld::LOAD) => StandardFunction::Load,
            (fld::MODULE, fld::RELEASE) => StandardFunction::Release,
            (ram::MODULE, ram::LOAD) => StandardFunction::RamLoad,
            (ram::MODULE, ram::READ) => StandardFunction::RamRead,
            (ram::MODULE, ram::FREE) => StandardFunction::RamFree,
            _ => return Err(ErrorKind::UnresolvedFunction),
        };
        Ok(resolved)
    }
}

fn word(args: &Args, index: usize) -> Result<u32, ErrorKind> {
    args.get(index).map(Arg::value).ok_or(ErrorKind::Null)
}

impl<S: Scheduler, I: Invoker> Runtime<S, I> {
    pub(crate) fn call_standard(
        &mut self,
        module: u16,
        function: u8,
        args: &Args,
    ) -> Result<u32, ErrorKind> {
        let function = StandardFunction::resolve(module, function)?;
        log::debug!("standard call {function:?}{args}");
        match function {
            StandardFunction::Ping => Ok(self.config.device.identifier as u32),
            StandardFunction::Version => Ok(self.config.device.version as u32),
            StandardFunction::ModuleCount => Ok(self.registry.count() as u32),
            StandardFunction::Index => {
                let identifier = word(args, 0)? as u16;
                self.registry
                    .index_of(identifier)
                    .map(u32::from)
                    .ok_or(ErrorKind::NoCounterpartModule)
            }
            StandardFunction::Load => {
                let address = word(args, 0)?;
                let outcome = self.load_staged(address)?;
                Ok(outcome.value())
            }
            StandardFunction::Release => {
                self.release_module(word(args, 0)? as u16)?;
                Ok(0)
            }
            StandardFunction::RamLoad => {
                let swap = word(args, 0)?;
                self.swap_mut(swap)?;
                self.retain_swap = true;
                Ok(swap)
            }
            StandardFunction::RamRead => {
                let address = word(args, 0)?;
                let swap = word(args, 1)?;
                let len = word(args, 2)? as usize;
                let bytes: Vec<u8> = self
                    .read_memory(address, len)
                    .ok_or(ErrorKind::OutOfBounds)?
                    .to_vec();
                self.swap_mut(swap)?
                    .get_mut(..len)
                    .ok_or(ErrorKind::OutOfBounds)?
                    .copy_from_slice(&bytes);
                Ok(len as u32)
            }
            StandardFunction::RamFree => {
                self.heap.free(word(args, 0)?)?;
                Ok(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_bounds() {
        assert_eq!(
            StandardFunction::resolve(sys::MODULE, sys::PING),
            Ok(StandardFunction::Ping)
        );
        assert_eq!(
            StandardFunction::resolve(sys::MODULE, 3),
            Err(ErrorKind::OutOfBounds)
        );
        assert_eq!(
            StandardFunction::resolve(MODULES.len() as u16, 0),
            Err(ErrorKind::OutOfBounds)
        );
        assert_eq!(
            StandardFunction::resolve(ram::MODULE, ram::FREE),
            Ok(StandardFunction::RamFree)
        );
    }
}
