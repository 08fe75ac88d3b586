//! Per-step driver context.
//!
//! The suspension primitives need to know who is polling them. The built-in
//! executor installs a [`StepContext`] in a thread-local for the duration of each
//! step; primitives take the cancelled flag from it and push their suspension
//! tokens into it. The flag is handed out once per step: the first primitive to
//! see it returns `Canceled`, later ones in the same poll suspend normally.
//!
//! Tasks driven by the tokio host instead run inside a [`CANCEL`] task-local
//! scope carrying the task's cancellation token and whether `Canceled` was
//! already handed out.
//!
//! ```text
//!  TaskExecutor::step ──► enter(cancelled) ──► poll(future) ──► finish() → Vec<Suspend>
//!                                 │                 │
//!                                 │            sleep()/wait() push tokens
//!                                 └─ restores the outer context on exit (nested steps)
//! ```

use std::cell::{Cell, RefCell};

use tokio_util::sync::CancellationToken;

use super::task::Suspend;

tokio::task_local! {
    /// Cancellation state of the tokio-driven task currently being polled.
    pub(crate) static CANCEL: TaskCancel;
}

/// Per-task cancellation state under the tokio host.
pub(crate) struct TaskCancel {
    token: CancellationToken,
    delivered: Cell<bool>,
}

impl TaskCancel {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self {
            token,
            delivered: Cell::new(false),
        }
    }
}

#[derive(Default)]
struct StepContext {
    cancelled: bool,
    suspensions: Vec<Suspend>,
}

thread_local! {
    static STEP: RefCell<Option<StepContext>> = const { RefCell::new(None) };
}

/// Which driver is polling the current future.
pub(crate) enum Driver {
    /// Built-in executor.
    Native,
    /// Tokio host (token present) or a bare tokio runtime (no token).
    Tokio(Option<CancellationToken>),
    /// Nothing we know how to suspend on.
    Unknown,
}

/// Restores the previous step context when finished or dropped.
pub(crate) struct StepGuard {
    prev: Option<Option<StepContext>>,
}

/// Installs a fresh step context for one poll.
pub(crate) fn enter(cancelled: bool) -> StepGuard {
    let ctx = StepContext {
        cancelled,
        suspensions: Vec::new(),
    };
    let prev = STEP.with(|s| s.borrow_mut().replace(ctx));
    StepGuard { prev: Some(prev) }
}

impl StepGuard {
    /// Leaves the step and returns the suspension tokens collected during it.
    pub(crate) fn finish(mut self) -> Vec<Suspend> {
        self.restore()
            .map(|ctx| ctx.suspensions)
            .unwrap_or_default()
    }

    fn restore(&mut self) -> Option<StepContext> {
        let prev = self.prev.take()?;
        STEP.with(|s| std::mem::replace(&mut *s.borrow_mut(), prev))
    }
}

impl Drop for StepGuard {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}

/// `true` while a native step is being polled.
pub(crate) fn in_native_step() -> bool {
    STEP.with(|s| s.borrow().is_some())
}

/// Takes the cancelled flag of the native step being polled, if any.
///
/// Returns `Some(true)` at most once per step.
pub(crate) fn take_native_cancel() -> Option<bool> {
    STEP.with(|s| {
        s.borrow_mut()
            .as_mut()
            .map(|ctx| std::mem::take(&mut ctx.cancelled))
    })
}

/// Records a suspension token for the native step being polled.
///
/// Returns `false` when no native step is active.
pub(crate) fn push_suspension(token: Suspend) -> bool {
    STEP.with(|s| match s.borrow_mut().as_mut() {
        Some(ctx) => {
            ctx.suspensions.push(token);
            true
        }
        None => false,
    })
}

/// `true` if the tokio-driven task was already handed `Canceled`.
pub(crate) fn tokio_cancel_delivered() -> bool {
    CANCEL.try_with(|c| c.delivered.get()).unwrap_or(false)
}

/// Records that the tokio-driven task was handed `Canceled`.
pub(crate) fn mark_tokio_cancel_delivered() {
    let _ = CANCEL.try_with(|c| c.delivered.set(true));
}

/// Detects the driver of the current poll.
pub(crate) fn current_driver() -> Driver {
    if in_native_step() {
        return Driver::Native;
    }
    if let Ok(token) = CANCEL.try_with(|c| c.token.clone()) {
        return Driver::Tokio(Some(token));
    }
    if tokio::runtime::Handle::try_current().is_ok() {
        return Driver::Tokio(None);
    }
    Driver::Unknown
}
