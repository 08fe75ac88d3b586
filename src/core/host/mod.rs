//! # Host drivers.
//!
//! A [`Host`] is what actually runs the loop's tasks. The loop lifecycle talks to
//! it only through this trait, so the lifecycle logic is written once:
//!
//! | Host           | Driver                                   | blocking run | run_async | process_tasks |
//! |----------------|------------------------------------------|--------------|-----------|---------------|
//! | [`NativeHost`] | built-in [`TaskExecutor`]                | yes          | no        | yes           |
//! | [`TokioHost`]  | tokio current-thread runtime + nursery   | yes          | yes       | no            |
//!
//! [`TaskExecutor`]: crate::TaskExecutor

mod native;
mod tokio_host;

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::LoopError;
use crate::executor::{LocalTask, RemoteJob, TaskHandle};

pub use native::NativeHost;
pub use tokio_host::TokioHost;

/// What a host can do beyond spawning tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Supports a blocking [`Host::run`].
    pub blocking_run: bool,
    /// Supports [`Host::run_async`].
    pub async_run: bool,
    /// Supports stepping by hand with [`Host::process_tasks`].
    pub manual_step: bool,
}

/// Driver seam between the loop lifecycle and an executor.
///
/// All methods are called on the loop thread.
#[async_trait(?Send)]
pub trait Host {
    /// Short host name for logs and errors.
    fn name(&self) -> &'static str;

    /// Feature flags of this host.
    fn capabilities(&self) -> Capabilities;

    /// Schedules a task; it starts at the next opportunity.
    fn spawn(&self, name: Cow<'static, str>, task: LocalTask) -> TaskHandle;

    /// Runs `callback` soon.
    fn call_soon(&self, callback: Box<dyn FnOnce()>);

    /// Runs `callback` after `delay`.
    fn call_later(&self, delay: Duration, callback: Box<dyn FnOnce()>);

    /// Thread-safe hand-off into this host.
    fn remote(&self) -> LoopRemote;

    /// `true` if this host's tasks are already being polled by a driver other
    /// than [`run`](Self::run).
    fn foreign_driver_active(&self) -> bool {
        false
    }

    /// Drives tasks until [`stop`](Self::stop) is called.
    fn run(&self) -> Result<(), LoopError>;

    /// Awaitable variant of [`run`](Self::run).
    async fn run_async(&self) -> Result<(), LoopError> {
        Err(LoopError::HostIncompatible {
            host: self.name(),
            capability: "run_async",
        })
    }

    /// Runs one batch of due work without blocking. Returns how many jobs ran.
    fn process_tasks(&self) -> Result<usize, LoopError> {
        Err(LoopError::HostIncompatible {
            host: self.name(),
            capability: "process_tasks",
        })
    }

    /// Makes a running `run`/`run_async` return.
    fn stop(&self);

    /// Cancels every live task, giving each one cleanup pass.
    fn cancel_all(&self);
}

type Submit = dyn Fn(RemoteJob) -> Result<(), LoopError> + Send + Sync;

/// Thread-safe handle for queueing callbacks onto a loop's thread.
///
/// The only loop API that may be used from other threads.
#[derive(Clone)]
pub struct LoopRemote {
    submit: Arc<Submit>,
}

impl LoopRemote {
    pub(crate) fn new(submit: impl Fn(RemoteJob) -> Result<(), LoopError> + Send + Sync + 'static) -> Self {
        Self {
            submit: Arc::new(submit),
        }
    }

    /// Queues `callback` to run on the loop thread.
    ///
    /// Fails with [`LoopError::RemoteClosed`] once the loop is dropped.
    pub fn call_soon_threadsafe(
        &self,
        callback: impl FnOnce() + Send + 'static,
    ) -> Result<(), LoopError> {
        (self.submit)(Box::new(callback))
    }
}

impl fmt::Debug for LoopRemote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopRemote").finish_non_exhaustive()
    }
}
