//! # Host backed by tokio.
//!
//! Tasks are `!Send`, so they are not handed to `tokio::spawn`. Instead the host
//! queues them and a single driver future polls them in a [`FuturesUnordered`]
//! nursery:
//!
//! ```text
//! spawn() ──► spawn_tx ──┐
//! remote  ──► remote_tx ─┤
//!                        ▼
//!   drive(): select! { stop token | remote job | new task → nursery | nursery.next() }
//!                                                     │
//!                       supervise(task): CANCEL.scope(TaskCancel(token), catch_unwind(task))
//!                                                     └─► handle.settle(outcome)
//! ```
//!
//! `run()` builds a current-thread runtime and blocks on the driver. Inside an
//! existing tokio runtime that would panic, so there:
//! - if the driver is already being awaited (through
//!   [`run_async`](Host::run_async)), it counts as a foreign driver and `run()`
//!   has nothing to do;
//! - otherwise `run()` fails with [`LoopError::HostIncompatible`]; await
//!   `run_async` instead.
//!
//! ## Rules
//! - A task cancelled before the driver first polls it never runs.
//! - On stop, the nursery gets one more non-blocking pass so cancelled tasks can
//!   clean up; what is left is dropped and closed as cancelled.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{Capabilities, Host, LoopRemote};
use crate::error::{LoopError, TaskError, panic_message};
use crate::executor::{CANCEL, LocalTask, RemoteJob, TaskCancel, TaskHandle, sleep};
use crate::report::report_error;

struct Spawned {
    handle: TaskHandle,
    token: CancellationToken,
    task: LocalTask,
}

struct Inner {
    spawn_tx: mpsc::UnboundedSender<Spawned>,
    spawn_rx: RefCell<Option<mpsc::UnboundedReceiver<Spawned>>>,
    remote_tx: mpsc::UnboundedSender<RemoteJob>,
    remote_rx: RefCell<Option<mpsc::UnboundedReceiver<RemoteJob>>>,
    stop: RefCell<CancellationToken>,
    live: RefCell<BTreeMap<u64, (TaskHandle, CancellationToken)>>,
    driving: Cell<bool>,
}

/// Clears `Inner::driving` when the driver future ends or is dropped.
struct DrivingGuard<'a>(&'a Cell<bool>);

impl Drop for DrivingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Runs tasks on a tokio current-thread runtime.
#[derive(Clone)]
pub struct TokioHost {
    inner: Rc<Inner>,
}

impl Default for TokioHost {
    fn default() -> Self {
        Self::new()
    }
}

impl TokioHost {
    /// Creates an idle host.
    pub fn new() -> Self {
        let (spawn_tx, spawn_rx) = mpsc::unbounded_channel();
        let (remote_tx, remote_rx) = mpsc::unbounded_channel();
        Self {
            inner: Rc::new(Inner {
                spawn_tx,
                spawn_rx: RefCell::new(Some(spawn_rx)),
                remote_tx,
                remote_rx: RefCell::new(Some(remote_rx)),
                stop: RefCell::new(CancellationToken::new()),
                live: RefCell::new(BTreeMap::new()),
                driving: Cell::new(false),
            }),
        }
    }

    /// Number of tasks not yet closed.
    pub fn len(&self) -> usize {
        self.inner.live.borrow().len()
    }

    /// `true` if no task is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn drive(&self) -> Result<(), LoopError> {
        let spawn_rx = self.inner.spawn_rx.borrow_mut().take();
        let remote_rx = self.inner.remote_rx.borrow_mut().take();
        let (Some(mut spawn_rx), Some(mut remote_rx)) = (spawn_rx, remote_rx) else {
            return Err(LoopError::NotReentrant);
        };
        let stop = CancellationToken::new();
        *self.inner.stop.borrow_mut() = stop.clone();
        self.inner.driving.set(true);
        let _driving = DrivingGuard(&self.inner.driving);

        debug!("tokio host driving");
        let mut nursery = FuturesUnordered::new();
        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                Some(job) = remote_rx.recv() => run_remote(job),
                Some(spawned) = spawn_rx.recv() => nursery.push(supervise(spawned)),
                Some(()) = nursery.next(), if !nursery.is_empty() => {}
            }
        }

        // One cleanup pass for tasks that were cancelled just before stop.
        let drain = async { while nursery.next().await.is_some() {} };
        let _ = tokio::time::timeout(Duration::ZERO, drain).await;
        drop(nursery);

        let leftovers: Vec<TaskHandle> = std::mem::take(&mut *self.inner.live.borrow_mut())
            .into_values()
            .map(|(handle, _)| handle)
            .collect();
        for handle in leftovers {
            handle.settle(Err(TaskError::Canceled));
        }
        // Tasks spawned but never picked up are closed too.
        while let Ok(spawned) = spawn_rx.try_recv() {
            spawned.handle.settle(Err(TaskError::Canceled));
        }

        *self.inner.spawn_rx.borrow_mut() = Some(spawn_rx);
        *self.inner.remote_rx.borrow_mut() = Some(remote_rx);
        debug!("tokio host stopped");
        Ok(())
    }
}

fn run_remote(job: RemoteJob) {
    if let Err(payload) = std::panic::catch_unwind(AssertUnwindSafe(job)) {
        report_error("Callback error:", &panic_message(payload.as_ref()));
    }
}

async fn supervise(spawned: Spawned) {
    let Spawned {
        handle,
        token,
        task,
    } = spawned;
    if handle.is_cancelled() {
        trace!(task = handle.name(), "cancelled before first poll");
        handle.settle(Err(TaskError::Canceled));
        return;
    }
    let scoped = CANCEL.scope(TaskCancel::new(token), AssertUnwindSafe(task).catch_unwind());
    let outcome = match scoped.await {
        Ok(res) => res,
        Err(payload) => Err(TaskError::Panicked {
            info: panic_message(payload.as_ref()),
        }),
    };
    handle.settle(outcome);
}

#[async_trait(?Send)]
impl Host for TokioHost {
    fn name(&self) -> &'static str {
        "tokio"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            blocking_run: true,
            async_run: true,
            manual_step: false,
        }
    }

    fn spawn(&self, name: Cow<'static, str>, task: LocalTask) -> TaskHandle {
        let handle = TaskHandle::new(name);
        let token = CancellationToken::new();
        let hook = token.clone();
        handle.set_cancel_hook(move || hook.cancel());

        let id = handle.id();
        self.inner
            .live
            .borrow_mut()
            .insert(id, (handle.clone(), token.clone()));
        let weak = Rc::downgrade(&self.inner);
        handle.add_done_callback(move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.live.borrow_mut().remove(&id);
            }
        });

        let spawned = Spawned {
            handle: handle.clone(),
            token,
            task,
        };
        if let Err(mpsc::error::SendError(spawned)) = self.inner.spawn_tx.send(spawned) {
            spawned.handle.settle(Err(TaskError::Canceled));
        }
        handle
    }

    fn call_soon(&self, callback: Box<dyn FnOnce()>) {
        self.spawn(
            "call_soon".into(),
            Box::pin(async move {
                callback();
                Ok(())
            }),
        );
    }

    fn call_later(&self, delay: Duration, callback: Box<dyn FnOnce()>) {
        self.spawn(
            "call_later".into(),
            Box::pin(async move {
                sleep(delay).await?;
                callback();
                Ok(())
            }),
        );
    }

    fn remote(&self) -> LoopRemote {
        let tx = self.inner.remote_tx.clone();
        LoopRemote::new(move |job| tx.send(job).map_err(|_| LoopError::RemoteClosed))
    }

    fn foreign_driver_active(&self) -> bool {
        self.inner.driving.get()
    }

    fn run(&self) -> Result<(), LoopError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(LoopError::HostIncompatible {
                host: self.name(),
                capability: "run inside a foreign runtime (await run_async)",
            });
        }
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        rt.block_on(self.drive())
    }

    async fn run_async(&self) -> Result<(), LoopError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(LoopError::HostIncompatible {
                host: self.name(),
                capability: "run_async outside a tokio runtime",
            });
        }
        self.drive().await
    }

    fn stop(&self) {
        self.inner.stop.borrow().cancel();
    }

    fn cancel_all(&self) {
        let live: Vec<CancellationToken> = self
            .inner
            .live
            .borrow()
            .values()
            .map(|(handle, token)| {
                handle.mark_cancelled();
                token.clone()
            })
            .collect();
        if !live.is_empty() {
            debug!(tasks = live.len(), "cancelling all tasks");
        }
        for token in live {
            token.cancel();
        }
    }
}
