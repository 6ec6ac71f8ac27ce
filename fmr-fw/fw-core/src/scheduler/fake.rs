//! Fake scheduler for testing and the virtual device
//!
//! Keeps a table of tasks without running anything. Tests drive task exit
//! with [`FakeScheduler::finish`].

use super::{ExitHook, Scheduler, TaskId};
use alloc::collections::VecDeque;
use alloc::vec::Vec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Created,
    Runnable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeTask {
    pub id: TaskId,
    pub entry: u32,
    pub hook: ExitHook,
    pub stack_size: usize,
    pub state: TaskState,
}

/// Scheduler that records lifecycle calls
#[derive(Debug, Default)]
pub struct FakeScheduler {
    tasks: Vec<FakeTask>,
    next_id: TaskId,
    exited: VecDeque<ExitHook>,
    /// Number of `advance()` calls
    pub passes: usize,
    /// Number of `release()` calls
    pub released: usize,
    /// Make `create()` fail
    pub refuse_create: bool,
}

impl FakeScheduler {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    pub fn tasks(&self) -> &[FakeTask] {
        &self.tasks
    }

    pub fn task(&self, id: TaskId) -> Option<&FakeTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Simulate task `id` returning from its entry point.
    pub fn finish(&mut self, id: TaskId) -> bool {
        match self.tasks.iter().position(|t| t.id == id) {
            Some(index) => {
                let task = self.tasks.remove(index);
                self.exited.push_back(task.hook);
                true
            }
            None => false,
        }
    }
}

impl Scheduler for FakeScheduler {
    fn create(&mut self, entry: u32, hook: ExitHook, stack_size: usize) -> Option<TaskId> {
        if self.refuse_create {
            return None;
        }
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        self.tasks.push(FakeTask {
            id,
            entry,
            hook,
            stack_size,
            state: TaskState::Created,
        });
        Some(id)
    }

    fn add(&mut self, task: TaskId) {
        if let Some(task) = self.tasks.iter_mut().find(|t| t.id == task) {
            task.state = TaskState::Runnable;
        }
    }

    fn release(&mut self, task: TaskId) {
        self.released += 1;
        self.tasks.retain(|t| t.id != task);
    }

    fn advance(&mut self) {
        self.passes += 1;
    }

    fn exited(&mut self) -> Option<ExitHook> {
        self.exited.pop_front()
    }
}
