//! Task lifecycle contract consumed by the loader.
//!
//! The scheduler that runs application tasks lives outside the runtime.
//! The loader only creates, adds and releases tasks and asks for a
//! scheduling pass. When a task finishes, the scheduler hands its
//! [`ExitHook`] back through [`Scheduler::exited`] and the runtime tears the
//! application down.

pub mod fake;

pub use fake::FakeScheduler;

/// Scheduler-assigned task handle.
pub type TaskId = u32;

/// Identifies the application a task belongs to when it exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExitHook(pub u32);

pub trait Scheduler {
    /// Create a task running `entry` on its own stack. `None` on failure.
    fn create(&mut self, entry: u32, hook: ExitHook, stack_size: usize) -> Option<TaskId>;

    /// Make a created task runnable.
    fn add(&mut self, task: TaskId);

    /// Stop and free a task.
    fn release(&mut self, task: TaskId);

    /// Run a scheduling pass.
    fn advance(&mut self);

    /// Next exit hook of a task that has finished since the last call.
    fn exited(&mut self) -> Option<ExitHook>;
}
