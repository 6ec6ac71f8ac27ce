//! Image loader.
//!
//! Turns a staged buffer into either a registered module or a running
//! application. A loaded image keeps its heap range until the module is
//! released or replaced, or the application exits or is replaced. Any
//! failure drops the image and retires its range; nothing is left half
//! registered.

use crate::application::Application;
use crate::heap::Arena;
use crate::image::{LoadError, RawImage, RelocatedImage};
use crate::invoker::Invoker;
use crate::runtime::Runtime;
use crate::scheduler::{ExitHook, Scheduler, TaskId};
use fmr_model::ErrorKind;

/// Result of a successful load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Application started as this task
    Application(TaskId),
    /// Module registered in this slot
    Module(u16),
}

impl LoadOutcome {
    /// Value reported back to the host.
    pub fn value(&self) -> u32 {
        match *self {
            LoadOutcome::Application(task) => task,
            LoadOutcome::Module(index) => index as u32,
        }
    }
}

impl<S: Scheduler, I: Invoker> Runtime<S, I> {
    /// Load the image staged in the heap at `address`.
    pub fn load_staged(&mut self, address: u32) -> Result<LoadOutcome, LoadError> {
        let arena = self
            .heap
            .claim(address)
            .ok_or(LoadError::NoImage(address))?;
        self.load_image(address, arena)
    }

    /// Stage `image` in the heap and load it.
    pub fn load_bytes(&mut self, image: Arena) -> Result<LoadOutcome, LoadError> {
        let address = self.heap.insert(image).map_err(|_| LoadError::Allocation)?;
        self.load_staged(address)
    }

    /// Parse, relocate to `base` and register or start an image.
    pub fn load_image(&mut self, base: u32, arena: Arena) -> Result<LoadOutcome, LoadError> {
        let outcome = RawImage::parse(arena)
            .inspect_err(|err| log::warn!("rejecting image at 0x{base:08x}: {err}"))
            .and_then(|raw| {
                let image = raw.relocate(base);
                match image.entry() {
                    Some(entry) => self.load_application(image, entry).map(LoadOutcome::Application),
                    None => self.load_module(image).map(LoadOutcome::Module),
                }
            });
        if let Err(err) = &outcome {
            log::warn!("load failed: {err}");
            self.heap.retire(base);
        }
        outcome
    }

    fn load_module(&mut self, image: RelocatedImage) -> Result<u16, LoadError> {
        let replaced = self
            .registry
            .index_of(image.identifier())
            .and_then(|index| self.registry.get(index).ok())
            .map(|module| module.base());
        let index = self.registry.register(image)?;
        if let Some(old) = replaced {
            self.heap.retire(old);
        }
        Ok(index)
    }

    fn load_application(
        &mut self,
        image: RelocatedImage,
        entry: u32,
    ) -> Result<TaskId, LoadError> {
        if let Some(old) = self.apps.remove_by_name(image.name()) {
            log::info!(
                "stopping application '{}' (task {}) before reload",
                old.name(),
                old.task
            );
            self.scheduler.release(old.task);
            self.heap.retire(old.image().base());
        }

        let hook = self.apps.next_hook();
        let task = self
            .scheduler
            .create(entry, hook, self.config.stack_size)
            .ok_or(LoadError::Task)?;
        self.scheduler.add(task);
        log::info!(
            "application '{}' started as task {task} at 0x{entry:08x}",
            image.name()
        );
        self.apps.insert(Application::new(hook, task, image));
        self.scheduler.advance();
        Ok(task)
    }

    /// Remove the application a finished task belonged to, freeing its image.
    pub fn exit_application(&mut self, hook: ExitHook) -> bool {
        match self.apps.remove_by_hook(hook) {
            Some(app) => {
                log::info!("application '{}' exited", app.name());
                self.heap.retire(app.image().base());
                true
            }
            None => false,
        }
    }

    /// Free the module in slot `index`.
    pub fn release_module(&mut self, index: u16) -> Result<(), ErrorKind> {
        let module = self.registry.release(index)?;
        self.heap.retire(module.base());
        Ok(())
    }
}
