//! # Suspension primitives: [`sleep`] and [`Event`].
//!
//! These are the only two ways a task may suspend. Each primitive detects the
//! driver polling it:
//!
//! | Driver             | `sleep`                         | `Event::wait`                  |
//! |--------------------|---------------------------------|--------------------------------|
//! | built-in executor  | `Suspend::TimedWait(deadline)`  | `Suspend::SignaledWait(event)` |
//! | tokio host         | `sleep_until` raced with cancel | waker list raced with cancel   |
//! | plain tokio        | `sleep_until`                   | waker list                     |
//! | none               | protocol error                  | protocol error                 |
//!
//! ## Rules
//! - `sleep` always yields at least once, even for a zero delay.
//! - `Event::wait` on a set event returns without yielding.
//! - A cancelled task gets [`TaskError::Canceled`] from whichever primitive it is
//!   parked on; propagate it with `?`.
//! - The error is delivered once per resumption. A task that swallows it and
//!   suspends again waits normally and gets it again when it next wakes.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use super::context::{
    Driver, current_driver, mark_tokio_cancel_delivered, push_suspension, take_native_cancel,
    tokio_cancel_delivered,
};
use super::task::Suspend;
use crate::error::TaskError;
use crate::report::report_error;

/// Upper bound for deadlines that would overflow `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

fn outside_driver(what: &str) -> TaskError {
    let detail = format!("{what} polled outside of a loop task");
    report_error("Protocol error:", &detail);
    TaskError::Protocol { detail }
}

/// Suspends the current task for `delay`.
///
/// Returns `Err(TaskError::Canceled)` if the task is cancelled while sleeping.
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use renderloop::{EventLoop, LoopConfig, sleep};
///
/// let lp = EventLoop::native(LoopConfig::default());
/// lp.add_task("tick", async {
///     sleep(Duration::from_millis(50)).await?;
///     Ok(())
/// });
/// ```
pub async fn sleep(delay: Duration) -> Result<(), TaskError> {
    let now = Instant::now();
    let deadline = now
        .checked_add(delay)
        .unwrap_or_else(|| now + FAR_FUTURE);
    match current_driver() {
        Driver::Native => {
            NativeSleep {
                deadline,
                yielded: false,
            }
            .await
        }
        Driver::Tokio(token) => tokio_sleep(deadline, token).await,
        Driver::Unknown => Err(outside_driver("sleep")),
    }
}

struct NativeSleep {
    deadline: Instant,
    yielded: bool,
}

impl Future for NativeSleep {
    type Output = Result<(), TaskError>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match take_native_cancel() {
            None => Poll::Ready(Err(outside_driver("sleep"))),
            Some(true) => Poll::Ready(Err(TaskError::Canceled)),
            Some(false) => {
                if this.yielded && Instant::now() >= this.deadline {
                    return Poll::Ready(Ok(()));
                }
                this.yielded = true;
                push_suspension(Suspend::TimedWait(this.deadline));
                Poll::Pending
            }
        }
    }
}

async fn tokio_sleep(
    deadline: Instant,
    token: Option<CancellationToken>,
) -> Result<(), TaskError> {
    let wait = async move {
        if deadline <= Instant::now() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep_until(deadline.into()).await;
        }
        Ok(())
    };
    match token {
        Some(token) => race_cancel(token, wait).await,
        None => wait.await,
    }
}

/// Races `wait` with the task's token.
///
/// A task that already swallowed `Canceled` waits `wait` out first.
async fn race_cancel(
    token: CancellationToken,
    wait: impl Future<Output = Result<(), TaskError>>,
) -> Result<(), TaskError> {
    if token.is_cancelled() && tokio_cancel_delivered() {
        let _ = wait.await;
        return Err(TaskError::Canceled);
    }
    tokio::select! {
        biased;
        _ = token.cancelled() => {
            mark_tokio_cancel_delivered();
            Err(TaskError::Canceled)
        }
        res = wait => res,
    }
}

pub(crate) enum Waiter {
    /// Wake-up closure installed by the built-in executor.
    Native(Box<dyn FnOnce()>),
    /// Standard waker from a tokio-driven poll.
    Waker(Waker),
}

#[derive(Default)]
struct EventInner {
    set: Cell<bool>,
    waiters: RefCell<Vec<Waiter>>,
}

/// One-shot signal that tasks can wait on.
///
/// Cheap to clone; clones share state. Once set, an event stays set.
#[derive(Clone, Default)]
pub struct Event {
    inner: Rc<EventInner>,
}

impl Event {
    /// Creates an unset event.
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` once [`set`](Self::set) was called.
    pub fn is_set(&self) -> bool {
        self.inner.set.get()
    }

    /// Sets the event and wakes every waiter. Idempotent.
    pub fn set(&self) {
        if self.inner.set.replace(true) {
            return;
        }
        let waiters = std::mem::take(&mut *self.inner.waiters.borrow_mut());
        for waiter in waiters {
            match waiter {
                Waiter::Native(wake) => wake(),
                Waiter::Waker(waker) => waker.wake(),
            }
        }
    }

    /// Waits until the event is set.
    ///
    /// Returns immediately if it already is. Returns `Err(TaskError::Canceled)`
    /// if the waiting task is cancelled first.
    pub async fn wait(&self) -> Result<(), TaskError> {
        if self.is_set() {
            return Ok(());
        }
        let wait = EventWait {
            event: self.clone(),
        };
        match current_driver() {
            Driver::Native | Driver::Tokio(None) => wait.await,
            Driver::Tokio(Some(token)) => race_cancel(token, wait).await,
            Driver::Unknown => Err(outside_driver("Event::wait")),
        }
    }

    /// `true` if both handles refer to the same event.
    pub fn ptr_eq(&self, other: &Event) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn add_waiter(&self, waiter: Waiter) {
        let mut waiters = self.inner.waiters.borrow_mut();
        if let Waiter::Waker(new) = &waiter {
            let known = waiters
                .iter()
                .any(|w| matches!(w, Waiter::Waker(old) if old.will_wake(new)));
            if known {
                return;
            }
        }
        waiters.push(waiter);
    }

    #[cfg(test)]
    pub(crate) fn waiter_count(&self) -> usize {
        self.inner.waiters.borrow().len()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("set", &self.is_set())
            .field("waiters", &self.inner.waiters.borrow().len())
            .finish()
    }
}

struct EventWait {
    event: Event,
}

impl Future for EventWait {
    type Output = Result<(), TaskError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.event.is_set() {
            return Poll::Ready(Ok(()));
        }
        match take_native_cancel() {
            Some(true) => Poll::Ready(Err(TaskError::Canceled)),
            Some(false) => {
                push_suspension(Suspend::SignaledWait(self.event.clone()));
                Poll::Pending
            }
            None => {
                self.event.add_waiter(Waiter::Waker(cx.waker().clone()));
                Poll::Pending
            }
        }
    }
}
