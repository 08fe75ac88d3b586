//! Cooperative task execution.
//!
//! This module provides the task model shared by every host:
//!
//! - [`TaskHandle`], [`TaskStatus`] handle and lifecycle of one task
//! - [`Suspend`], [`StepOutcome`] the closed suspension protocol
//! - [`sleep`], [`Event`] the two suspension primitives
//! - [`TaskExecutor`] the built-in single-threaded driver
//!
//! ## Suspension protocol
//! A task may only suspend through [`sleep`] or [`Event::wait`]. Under the
//! built-in executor each of these reports a [`Suspend`] token for the step in
//! progress; under the tokio host they use tokio timers and wakers. Awaiting
//! anything else inside a native task is a protocol error: it is logged and the
//! task is cancelled.

mod context;
mod primitives;
mod runtime;
mod task;

pub(crate) use context::{CANCEL, TaskCancel};
pub use primitives::{Event, sleep};
pub use runtime::{ExecutorRemote, RemoteJob, TaskExecutor};
pub use task::{LocalTask, StepOutcome, Suspend, TaskHandle, TaskStatus};
