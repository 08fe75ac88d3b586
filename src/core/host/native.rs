//! Host backed by the built-in [`TaskExecutor`].

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;

use super::{Capabilities, Host, LoopRemote};
use crate::error::LoopError;
use crate::executor::{LocalTask, TaskExecutor, TaskHandle};

/// Runs tasks on a [`TaskExecutor`] owned by the host.
#[derive(Clone, Default)]
pub struct NativeHost {
    exec: TaskExecutor,
}

impl NativeHost {
    /// Creates a host with a fresh executor.
    pub fn new() -> Self {
        Self::default()
    }

    /// The underlying executor.
    pub fn executor(&self) -> &TaskExecutor {
        &self.exec
    }
}

#[async_trait(?Send)]
impl Host for NativeHost {
    fn name(&self) -> &'static str {
        "native"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            blocking_run: true,
            async_run: false,
            manual_step: true,
        }
    }

    fn spawn(&self, name: Cow<'static, str>, task: LocalTask) -> TaskHandle {
        self.exec.schedule_boxed(TaskHandle::new(name), task)
    }

    fn call_soon(&self, callback: Box<dyn FnOnce()>) {
        self.exec.call_soon(callback);
    }

    fn call_later(&self, delay: Duration, callback: Box<dyn FnOnce()>) {
        self.exec.call_later(delay, callback);
    }

    fn remote(&self) -> LoopRemote {
        let remote = self.exec.remote();
        LoopRemote::new(move |job| {
            if remote.call_soon(job) {
                Ok(())
            } else {
                Err(LoopError::RemoteClosed)
            }
        })
    }

    fn run(&self) -> Result<(), LoopError> {
        self.exec.run();
        Ok(())
    }

    fn process_tasks(&self) -> Result<usize, LoopError> {
        Ok(self.exec.process_tasks())
    }

    fn stop(&self) {
        self.exec.stop();
    }

    fn cancel_all(&self) {
        self.exec.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::TaskStatus;

    #[test]
    fn run_async_is_not_supported() {
        let host = NativeHost::new();
        let res = futures::executor::block_on(host.run_async());
        assert!(matches!(
            res,
            Err(LoopError::HostIncompatible { host: "native", .. })
        ));
    }

    #[test]
    fn spawned_tasks_run_on_process_tasks() {
        let host = NativeHost::new();
        let handle = host.spawn("t".into(), Box::pin(async { Ok(()) }));
        assert_eq!(host.process_tasks().ok(), Some(1));
        assert_eq!(handle.status(), TaskStatus::Completed);
    }
}
