//! Running applications.

use crate::image::RelocatedImage;
use crate::scheduler::{ExitHook, TaskId};
use alloc::vec::Vec;

/// A loaded image with an entry point, run as a task.
#[derive(Debug)]
pub struct Application {
    pub hook: ExitHook,
    pub task: TaskId,
    image: RelocatedImage,
}

impl Application {
    pub fn new(hook: ExitHook, task: TaskId, image: RelocatedImage) -> Self {
        Self { hook, task, image }
    }

    pub fn name(&self) -> &str {
        self.image.name()
    }

    pub fn image(&self) -> &RelocatedImage {
        &self.image
    }
}

/// Applications in load order. At most one per name.
#[derive(Debug, Default)]
pub struct Applications {
    apps: Vec<Application>,
    next_hook: u32,
}

impl Applications {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh hook for an application about to be created.
    pub fn next_hook(&mut self) -> ExitHook {
        self.next_hook = self.next_hook.wrapping_add(1);
        ExitHook(self.next_hook)
    }

    pub fn insert(&mut self, app: Application) {
        self.apps.push(app);
    }

    pub fn find(&self, name: &str) -> Option<&Application> {
        self.apps.iter().find(|a| a.name() == name)
    }

    /// Remove the application called `name`. Dropping it frees the image.
    pub fn remove_by_name(&mut self, name: &str) -> Option<Application> {
        let index = self.apps.iter().position(|a| a.name() == name)?;
        Some(self.apps.remove(index))
    }

    pub fn remove_by_hook(&mut self, hook: ExitHook) -> Option<Application> {
        let index = self.apps.iter().position(|a| a.hook == hook)?;
        Some(self.apps.remove(index))
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Application> {
        self.apps.iter()
    }
}
