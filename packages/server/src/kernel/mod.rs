//! Kernel module - background triggers that drive the dispatcher.

pub mod queue;
pub mod scheduled_tasks;

pub use queue::{QueueConfig, QueueError, QueueWorker, ScrapeQueue};
pub use scheduled_tasks::{run_guarded_cycle, start_scheduler, CycleLock, GuardedCycle};
