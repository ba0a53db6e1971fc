//! Asynchronous task queue: callers enqueue work and poll for completion.
//!
//! Workers claim the oldest Pending task; each task is claimed at most once
//! and reaches a terminal state at most once. Callers poll `status`: there
//! is no push notification.

pub mod db;
pub mod task;

pub use db::TaskDb;
pub use task::{QueueTask, TaskId, TaskStatus};
