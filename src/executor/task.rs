//! # Task handles and suspension tokens.
//!
//! A task is a `'static` local future returning `Result<(), TaskError>`, plus a
//! name, a cancelled flag and a list of done-callbacks. The future itself is owned
//! by whatever drives it (the built-in [`TaskExecutor`](super::TaskExecutor) or the
//! tokio host); callers keep a [`TaskHandle`].
//!
//! ## Rules
//! - A handle is closed exactly once; done-callbacks fire exactly once, at close.
//! - Cancelling a closed task is a no-op.
//! - Done-callbacks registered after close run immediately.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use futures::future::LocalBoxFuture;

use crate::error::TaskError;
use crate::executor::Event;
use crate::report::report_error;

/// Boxed continuation driven by a host.
pub type LocalTask = LocalBoxFuture<'static, Result<(), TaskError>>;

type DoneCallback = Box<dyn FnOnce(&TaskHandle)>;

static TASK_IDS: AtomicU64 = AtomicU64::new(1);

/// Where a task is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Not finished yet.
    Pending,
    /// Body returned `Ok(())`.
    Completed,
    /// Closed through cancellation.
    Canceled,
    /// Body returned an error or panicked.
    Failed,
}

/// Suspension token reported by a continuation at a suspension point.
///
/// Only these two kinds exist; a continuation that suspends without producing
/// one is a protocol error.
#[derive(Clone)]
pub enum Suspend {
    /// Resume at the given instant.
    TimedWait(Instant),
    /// Resume when the event is set.
    SignaledWait(Event),
}

impl fmt::Debug for Suspend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Suspend::TimedWait(at) => f.debug_tuple("TimedWait").field(at).finish(),
            Suspend::SignaledWait(ev) => f
                .debug_tuple("SignaledWait")
                .field(&ev.is_set())
                .finish(),
        }
    }
}

/// Result of stepping a task once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The task is parked on at least one suspension.
    Suspended,
    /// The task finished during this step.
    Finished(TaskStatus),
    /// The task was already closed; nothing happened.
    Closed,
}

struct TaskShared {
    id: u64,
    name: Cow<'static, str>,
    cancelled: Cell<bool>,
    status: Cell<TaskStatus>,
    error: RefCell<Option<TaskError>>,
    done: RefCell<Vec<DoneCallback>>,
    on_cancel: RefCell<Option<Box<dyn Fn()>>>,
}

/// Shared handle to a scheduled task.
///
/// Cheap to clone. Holding a handle does not keep the task running; it only
/// allows observing and cancelling it.
#[derive(Clone)]
pub struct TaskHandle {
    shared: Rc<TaskShared>,
}

impl TaskHandle {
    pub(crate) fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            shared: Rc::new(TaskShared {
                id: TASK_IDS.fetch_add(1, Ordering::Relaxed),
                name: name.into(),
                cancelled: Cell::new(false),
                status: Cell::new(TaskStatus::Pending),
                error: RefCell::new(None),
                done: RefCell::new(Vec::new()),
                on_cancel: RefCell::new(None),
            }),
        }
    }

    /// Process-unique task id.
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// Task name (for logs).
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Current status.
    pub fn status(&self) -> TaskStatus {
        self.shared.status.get()
    }

    /// `true` once the task is closed.
    pub fn is_done(&self) -> bool {
        self.status() != TaskStatus::Pending
    }

    /// `true` once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.get()
    }

    /// The error the task failed with, if any.
    pub fn error(&self) -> Option<TaskError> {
        self.shared.error.borrow().clone()
    }

    /// Requests cancellation.
    ///
    /// The task observes it at its next resumption: the primitive it is parked on
    /// returns [`TaskError::Canceled`]. A task that was never started is closed
    /// without running.
    pub fn cancel(&self) {
        if self.is_done() {
            return;
        }
        self.shared.cancelled.set(true);
        let hook = self.shared.on_cancel.borrow_mut().take();
        if let Some(hook) = hook {
            hook();
            // Keep the hook for re-delivery unless the task closed meanwhile.
            if !self.is_done() {
                *self.shared.on_cancel.borrow_mut() = Some(hook);
            }
        }
    }

    /// Registers a callback to run when the task closes.
    ///
    /// Runs immediately if the task is already closed.
    pub fn add_done_callback(&self, callback: impl FnOnce(&TaskHandle) + 'static) {
        if self.is_done() {
            callback(self);
        } else {
            self.shared.done.borrow_mut().push(Box::new(callback));
        }
    }

    pub(crate) fn set_cancel_hook(&self, hook: impl Fn() + 'static) {
        *self.shared.on_cancel.borrow_mut() = Some(Box::new(hook));
    }

    /// Marks cancellation without waking the driver.
    pub(crate) fn mark_cancelled(&self) {
        if !self.is_done() {
            self.shared.cancelled.set(true);
        }
    }

    /// Closes the task with the given outcome and fires done-callbacks.
    ///
    /// Errors (other than cancellation) are reported through the deduplicating
    /// reporter. Panics inside done-callbacks are swallowed.
    pub(crate) fn settle(&self, outcome: Result<(), TaskError>) {
        if self.is_done() {
            return;
        }
        let status = match outcome {
            Ok(()) => TaskStatus::Completed,
            Err(TaskError::Canceled) => TaskStatus::Canceled,
            Err(err) => {
                report_error(&format!("Error in {} task:", self.name()), &err.to_string());
                *self.shared.error.borrow_mut() = Some(err);
                TaskStatus::Failed
            }
        };
        self.shared.status.set(status);
        self.shared.on_cancel.borrow_mut().take();

        let callbacks: Vec<DoneCallback> = self.shared.done.borrow_mut().drain(..).collect();
        for callback in callbacks {
            let _ = catch_unwind(AssertUnwindSafe(|| callback(self)));
        }
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("status", &self.status())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
