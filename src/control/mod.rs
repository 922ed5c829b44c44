//! Step/task execution engine
//!
//! A pass over one backup builds a [`Task`] from the backup's phase, runs its
//! [`Step`]s strictly in order with the [`Executor`], always runs the task's
//! finalizer, and hands a [`Verdict`] back to the controller.

mod context;
mod executor;
mod step;
mod task;
mod verdict;

pub use context::BackupContext;
pub use executor::Executor;
pub use step::{Outcome, Step};
pub use task::Task;
pub use verdict::Verdict;
