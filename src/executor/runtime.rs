//! # Built-in single-threaded task executor.
//!
//! [`TaskExecutor`] drives tasks that suspend only through [`sleep`](super::sleep)
//! and [`Event::wait`](super::Event::wait). It can be stepped by hand
//! ([`process_tasks`](TaskExecutor::process_tasks)) or driven until stopped
//! ([`run`](TaskExecutor::run)).
//!
//! ```text
//!  schedule(task) ──► slot + Step{id, gen=0} due now
//!                                │
//!            ┌───────────────────▼─────────────────────┐
//!            │ timer heap ordered by (due, seq)        │◄── call_soon / call_later
//!            └───────────────────┬─────────────────────┘◄── remote queue (any thread)
//!                                │ due
//!                                ▼
//!                  step(id): poll once under a step context
//!                    ├─ Ready      → settle handle, drop slot
//!                    ├─ Pending +  suspensions → gen += 1, arm each
//!                    │     TimedWait(t)      → Step{id, gen} due at t
//!                    │     SignaledWait(ev)  → ev waiter pushes Step{id, gen} now
//!                    └─ Pending, no suspension → protocol error, cancel, re-step
//! ```
//!
//! ## Rules
//! - Steps carry the generation they were armed for; a wake for an older
//!   generation is ignored. This is how a sleep racing an event resumes once.
//! - A task cancelled before its first step is closed without being polled.
//! - `cancel_all` reaches the task being polled too: once its poll returns it
//!   gets the same single cleanup step as every other task.
//! - Panics and errors inside a task close only that task.
//! - Jobs due at the same instant run in scheduling order.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, trace};

use super::context;
use super::primitives::Waiter;
use super::task::{LocalTask, StepOutcome, Suspend, TaskHandle, TaskStatus};
use crate::error::{TaskError, panic_message};
use crate::report::report_error;

/// Callback handed to the executor from another thread.
pub type RemoteJob = Box<dyn FnOnce() + Send>;

enum Job {
    Step { id: u64, generation: u64 },
    Call(Box<dyn FnOnce()>),
}

struct Entry {
    due: Instant,
    seq: u64,
    job: Job,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

struct Slot {
    future: LocalTask,
    handle: TaskHandle,
    generation: u64,
    started: bool,
}

struct ExecInner {
    slots: RefCell<BTreeMap<u64, Slot>>,
    queue: RefCell<BinaryHeap<Reverse<Entry>>>,
    seq: Cell<u64>,
    remote_tx: Sender<RemoteJob>,
    remote_rx: Receiver<RemoteJob>,
    stop_requested: Cell<bool>,
    running: Cell<bool>,
    /// Task whose future is being polled right now (its slot is checked out).
    current: RefCell<Option<TaskHandle>>,
    /// Bumped by every `cancel_all`.
    cancel_epoch: Cell<u64>,
}

/// Single-threaded cooperative executor.
///
/// Cheap to clone; clones share the same queues.
#[derive(Clone)]
pub struct TaskExecutor {
    inner: Rc<ExecInner>,
}

/// Thread-safe handle for queueing callbacks onto a [`TaskExecutor`].
#[derive(Clone)]
pub struct ExecutorRemote {
    tx: Sender<RemoteJob>,
}

impl ExecutorRemote {
    /// Queues `job` to run on the executor thread at its next batch.
    ///
    /// Returns `false` if the executor is gone.
    pub fn call_soon(&self, job: RemoteJob) -> bool {
        self.tx.send(job).is_ok()
    }
}

impl Default for TaskExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskExecutor {
    /// Creates an idle executor.
    pub fn new() -> Self {
        let (remote_tx, remote_rx) = channel::unbounded();
        Self {
            inner: Rc::new(ExecInner {
                slots: RefCell::new(BTreeMap::new()),
                queue: RefCell::new(BinaryHeap::new()),
                seq: Cell::new(0),
                remote_tx,
                remote_rx,
                stop_requested: Cell::new(false),
                running: Cell::new(false),
                current: RefCell::new(None),
                cancel_epoch: Cell::new(0),
            }),
        }
    }

    /// Schedules a task; its first step runs at the next batch.
    pub fn schedule(
        &self,
        name: impl Into<Cow<'static, str>>,
        task: impl Future<Output = Result<(), TaskError>> + 'static,
    ) -> TaskHandle {
        self.schedule_boxed(TaskHandle::new(name), Box::pin(task))
    }

    pub(crate) fn schedule_boxed(&self, handle: TaskHandle, future: LocalTask) -> TaskHandle {
        let id = handle.id();
        let weak = Rc::downgrade(&self.inner);
        handle.set_cancel_hook(move || {
            if let Some(inner) = weak.upgrade() {
                TaskExecutor { inner }.wake_now(id);
            }
        });
        self.inner.slots.borrow_mut().insert(
            id,
            Slot {
                future,
                handle: handle.clone(),
                generation: 0,
                started: false,
            },
        );
        self.push(Instant::now(), Job::Step { id, generation: 0 });
        trace!(task = handle.name(), id, "task scheduled");
        handle
    }

    /// Runs `callback` at the next batch.
    pub fn call_soon(&self, callback: impl FnOnce() + 'static) {
        self.push(Instant::now(), Job::Call(Box::new(callback)));
    }

    /// Runs `callback` once `delay` has elapsed.
    pub fn call_later(&self, delay: Duration, callback: impl FnOnce() + 'static) {
        self.push(Instant::now() + delay, Job::Call(Box::new(callback)));
    }

    /// Returns a `Send` handle for queueing callbacks from other threads.
    pub fn remote(&self) -> ExecutorRemote {
        ExecutorRemote {
            tx: self.inner.remote_tx.clone(),
        }
    }

    /// Number of tasks not yet closed.
    pub fn len(&self) -> usize {
        self.inner.slots.borrow().len()
    }

    /// `true` if no task is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Earliest due time among queued jobs.
    pub fn next_due(&self) -> Option<Instant> {
        self.inner.queue.borrow().peek().map(|Reverse(e)| e.due)
    }

    /// `true` while inside [`run`](Self::run).
    pub fn is_running(&self) -> bool {
        self.inner.running.get()
    }

    /// Steps a task once, ignoring its wake generation.
    pub fn step(&self, handle: &TaskHandle) -> StepOutcome {
        self.step_id(handle.id(), None)
    }

    /// Runs every job that is due now, in order. Returns how many ran.
    ///
    /// Jobs that become due while the batch runs wait for the next batch.
    pub fn process_tasks(&self) -> usize {
        self.drain_remote();
        let now = Instant::now();
        let mut batch = Vec::new();
        {
            let mut queue = self.inner.queue.borrow_mut();
            while queue.peek().is_some_and(|Reverse(e)| e.due <= now) {
                if let Some(Reverse(entry)) = queue.pop() {
                    batch.push(entry.job);
                }
            }
        }
        let ran = batch.len();
        for job in batch {
            self.run_job(job);
        }
        ran
    }

    /// Drives the executor until [`stop`](Self::stop) is called.
    ///
    /// Blocks between batches until the next timer is due or a remote job
    /// arrives. Returns at once if already running.
    pub fn run(&self) {
        if self.inner.running.replace(true) {
            debug!("executor already running");
            return;
        }
        self.inner.stop_requested.set(false);
        loop {
            self.process_tasks();
            if self.inner.stop_requested.get() {
                break;
            }
            let received = match self.next_due() {
                Some(due) if due <= Instant::now() => continue,
                Some(due) => match self.inner.remote_rx.recv_deadline(due) {
                    Ok(job) => Some(job),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match self.inner.remote_rx.recv() {
                    Ok(job) => Some(job),
                    Err(_) => break,
                },
            };
            if let Some(job) = received {
                self.push(Instant::now(), Job::Call(job));
            }
        }
        self.inner.running.set(false);
        self.inner.stop_requested.set(false);
    }

    /// Makes [`run`](Self::run) return after the current batch.
    pub fn stop(&self) {
        self.inner.stop_requested.set(true);
    }

    /// Cancels every task, gives each one cleanup step, then drops the rest.
    ///
    /// Queued callbacks and timers are discarded too. Called from inside a task,
    /// that task is cancelled as well and closed right after its current poll.
    pub fn cancel_all(&self) {
        let current = self.inner.current.borrow().clone();
        if let Some(handle) = &current {
            handle.mark_cancelled();
            self.inner.cancel_epoch.set(self.inner.cancel_epoch.get() + 1);
        }
        let ids: Vec<u64> = self.inner.slots.borrow().keys().copied().collect();
        if ids.is_empty() && self.inner.queue.borrow().is_empty() {
            return;
        }
        debug!(tasks = ids.len(), "cancelling all tasks");
        for id in &ids {
            if let Some(slot) = self.inner.slots.borrow().get(id) {
                slot.handle.mark_cancelled();
            }
        }
        for id in ids {
            self.step_id(id, None);
        }

        let leftovers: Vec<Slot> = std::mem::take(&mut *self.inner.slots.borrow_mut())
            .into_values()
            .collect();
        for slot in leftovers {
            let Slot { future, handle, .. } = slot;
            drop(future);
            handle.settle(Err(TaskError::Canceled));
        }
        let queued = std::mem::take(&mut *self.inner.queue.borrow_mut());
        drop(queued);
    }

    fn push(&self, due: Instant, job: Job) {
        let seq = self.inner.seq.get();
        self.inner.seq.set(seq + 1);
        self.inner
            .queue
            .borrow_mut()
            .push(Reverse(Entry { due, seq, job }));
    }

    fn drain_remote(&self) {
        while let Ok(job) = self.inner.remote_rx.try_recv() {
            self.push(Instant::now(), Job::Call(job));
        }
    }

    /// Schedules an immediate step at the task's current generation.
    fn wake_now(&self, id: u64) {
        let generation = self.inner.slots.borrow().get(&id).map(|s| s.generation);
        if let Some(generation) = generation {
            self.push(Instant::now(), Job::Step { id, generation });
        }
    }

    fn run_job(&self, job: Job) {
        match job {
            Job::Step { id, generation } => {
                self.step_id(id, Some(generation));
            }
            Job::Call(callback) => {
                if let Err(payload) = catch_unwind(AssertUnwindSafe(callback)) {
                    report_error("Callback error:", &panic_message(payload.as_ref()));
                }
            }
        }
    }

    fn step_id(&self, id: u64, generation: Option<u64>) -> StepOutcome {
        let mut slot = {
            let mut slots = self.inner.slots.borrow_mut();
            match slots.remove(&id) {
                None => return StepOutcome::Closed,
                Some(slot) => {
                    if generation.is_some_and(|g| g != slot.generation) {
                        slots.insert(id, slot);
                        return StepOutcome::Suspended;
                    }
                    slot
                }
            }
        };

        let cancelled = slot.handle.is_cancelled();
        if cancelled && !slot.started {
            let Slot { future, handle, .. } = slot;
            drop(future);
            handle.settle(Err(TaskError::Canceled));
            trace!(task = handle.name(), "cancelled before first step");
            return StepOutcome::Finished(TaskStatus::Canceled);
        }
        slot.started = true;

        let epoch = self.inner.cancel_epoch.get();
        let outer = self.inner.current.replace(Some(slot.handle.clone()));
        let guard = context::enter(cancelled);
        let waker = futures::task::noop_waker();
        let mut cx = Context::from_waker(&waker);
        let polled = catch_unwind(AssertUnwindSafe(|| slot.future.as_mut().poll(&mut cx)));
        let suspensions = guard.finish();
        *self.inner.current.borrow_mut() = outer;

        let torn_down = self.inner.cancel_epoch.get() != epoch;
        let outcome = match polled {
            // Cancelled and still not using our primitives: it will never notice.
            // Or this was already its cleanup step and it tore the executor down.
            Ok(Poll::Pending) if cancelled && (suspensions.is_empty() || torn_down) => {
                Err(TaskError::Canceled)
            }
            Ok(Poll::Pending) if torn_down => {
                self.park(id, slot, cancelled, suspensions);
                return self.close_after_cancel_all(id);
            }
            Ok(Poll::Pending) => {
                self.park(id, slot, cancelled, suspensions);
                return StepOutcome::Suspended;
            }
            Ok(Poll::Ready(res)) => res,
            Err(payload) => Err(TaskError::Panicked {
                info: panic_message(payload.as_ref()),
            }),
        };
        let Slot { future, handle, .. } = slot;
        drop(future);
        handle.settle(outcome);
        StepOutcome::Finished(handle.status())
    }

    /// Cleanup step for a task that ran `cancel_all` during its own poll.
    fn close_after_cancel_all(&self, id: u64) -> StepOutcome {
        if let StepOutcome::Finished(status) = self.step_id(id, None) {
            return StepOutcome::Finished(status);
        }
        let leftover = self.inner.slots.borrow_mut().remove(&id);
        match leftover {
            Some(Slot { future, handle, .. }) => {
                drop(future);
                handle.settle(Err(TaskError::Canceled));
                StepOutcome::Finished(handle.status())
            }
            None => StepOutcome::Closed,
        }
    }

    fn park(&self, id: u64, mut slot: Slot, was_cancelled: bool, suspensions: Vec<Suspend>) {
        slot.generation += 1;
        let generation = slot.generation;

        if suspensions.is_empty() {
            report_error(
                "Protocol error:",
                &format!(
                    "task '{}' suspended without sleep() or Event::wait(); cancelling it",
                    slot.handle.name()
                ),
            );
            slot.handle.mark_cancelled();
            self.push(Instant::now(), Job::Step { id, generation });
        } else {
            for token in suspensions {
                self.arm(id, generation, token);
            }
            // Cancel requested from inside the task's own poll.
            if slot.handle.is_cancelled() && !was_cancelled {
                self.push(Instant::now(), Job::Step { id, generation });
            }
        }
        self.inner.slots.borrow_mut().insert(id, slot);
    }

    fn arm(&self, id: u64, generation: u64, token: Suspend) {
        match token {
            Suspend::TimedWait(due) => self.push(due, Job::Step { id, generation }),
            Suspend::SignaledWait(event) => {
                if event.is_set() {
                    self.push(Instant::now(), Job::Step { id, generation });
                    return;
                }
                let weak: Weak<ExecInner> = Rc::downgrade(&self.inner);
                event.add_waiter(Waiter::Native(Box::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        TaskExecutor { inner }.push(Instant::now(), Job::Step { id, generation });
                    }
                })));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{Event, sleep};
    use std::future::pending;

    fn drive_for(exec: &TaskExecutor, total: Duration) {
        let end = Instant::now() + total;
        while Instant::now() < end {
            exec.process_tasks();
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn event_wait_resumes_after_sleep_and_before_later_timer() {
        let exec = TaskExecutor::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let started = Instant::now();
        let ev = Event::new();

        let (e, l) = (ev.clone(), Rc::clone(&log));
        exec.schedule("setter", async move {
            sleep(Duration::from_millis(50)).await?;
            l.borrow_mut().push(("set", started.elapsed()));
            e.set();
            Ok(())
        });
        let (e, l) = (ev.clone(), Rc::clone(&log));
        exec.schedule("waiter", async move {
            e.wait().await?;
            l.borrow_mut().push(("woke", started.elapsed()));
            Ok(())
        });
        let l = Rc::clone(&log);
        exec.schedule("late", async move {
            sleep(Duration::from_millis(100)).await?;
            l.borrow_mut().push(("late", started.elapsed()));
            Ok(())
        });

        drive_for(&exec, Duration::from_millis(200));
        let log = log.borrow();
        let names: Vec<_> = log.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, ["set", "woke", "late"]);
        assert!(log[1].1 >= Duration::from_millis(50));
        assert!(log[2].1 >= Duration::from_millis(100));
        assert!(exec.is_empty());
    }

    #[test]
    fn zero_sleep_yields_to_siblings() {
        let exec = TaskExecutor::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for name in ["a", "b"] {
            let l = Rc::clone(&log);
            exec.schedule(name, async move {
                l.borrow_mut().push(format!("{name}1"));
                sleep(Duration::ZERO).await?;
                l.borrow_mut().push(format!("{name}2"));
                Ok(())
            });
        }
        exec.process_tasks();
        exec.process_tasks();
        assert_eq!(*log.borrow(), ["a1", "b1", "a2", "b2"]);
    }

    #[test]
    fn cancel_before_first_step_runs_nothing() {
        let exec = TaskExecutor::new();
        let ran = Rc::new(Cell::new(false));
        let r = Rc::clone(&ran);
        let handle = exec.schedule("never", async move {
            r.set(true);
            Ok(())
        });
        let closed = Rc::new(Cell::new(0));
        let c = Rc::clone(&closed);
        handle.add_done_callback(move |_| c.set(c.get() + 1));

        handle.cancel();
        exec.process_tasks();
        exec.process_tasks();

        assert!(!ran.get());
        assert_eq!(handle.status(), TaskStatus::Canceled);
        assert_eq!(closed.get(), 1);
    }

    #[test]
    fn cancel_is_delivered_at_the_suspension_point() {
        let exec = TaskExecutor::new();
        let cleanup = Rc::new(Cell::new(false));
        let c = Rc::clone(&cleanup);
        let handle = exec.schedule("sleeper", async move {
            let res = sleep(Duration::from_secs(60)).await;
            c.set(res == Err(TaskError::Canceled));
            res
        });
        exec.process_tasks();
        assert_eq!(handle.status(), TaskStatus::Pending);

        handle.cancel();
        exec.process_tasks();
        assert!(cleanup.get());
        assert_eq!(handle.status(), TaskStatus::Canceled);
    }

    #[test]
    fn swallowed_cancel_is_delivered_again_at_next_resumption() {
        let exec = TaskExecutor::new();
        let (passes, delivered) = (Rc::new(Cell::new(0)), Rc::new(Cell::new(0)));
        let (p, d) = (Rc::clone(&passes), Rc::clone(&delivered));
        let handle = exec.schedule("stubborn", async move {
            loop {
                match sleep(Duration::from_millis(10)).await {
                    Err(TaskError::Canceled) if d.get() == 0 => d.set(1),
                    Err(err) => {
                        d.set(d.get() + 1);
                        return Err(err);
                    }
                    Ok(()) => {}
                }
                p.set(p.get() + 1);
            }
        });
        exec.process_tasks();
        assert_eq!(passes.get(), 0);

        handle.cancel();
        exec.process_tasks();
        // One pass after the swallowed error, then parked on the next sleep.
        assert_eq!(delivered.get(), 1);
        assert_eq!(passes.get(), 1);
        assert_eq!(handle.status(), TaskStatus::Pending);

        drive_for(&exec, Duration::from_millis(40));
        assert_eq!(delivered.get(), 2);
        assert_eq!(passes.get(), 1);
        assert_eq!(handle.status(), TaskStatus::Canceled);
        assert!(exec.is_empty());
    }

    #[test]
    fn cancel_all_from_inside_a_task_closes_the_caller() {
        let exec = TaskExecutor::new();
        let sibling = exec.schedule("sibling", async {
            sleep(Duration::from_secs(60)).await
        });
        exec.process_tasks();

        let ticks = Rc::new(Cell::new(0));
        let (t, teardown) = (Rc::clone(&ticks), exec.clone());
        let caller = exec.schedule("caller", async move {
            teardown.cancel_all();
            loop {
                sleep(Duration::from_millis(1)).await?;
                t.set(t.get() + 1);
            }
        });
        exec.process_tasks();

        assert_eq!(caller.status(), TaskStatus::Canceled);
        assert_eq!(sibling.status(), TaskStatus::Canceled);
        assert!(exec.is_empty());
        for _ in 0..20 {
            exec.process_tasks();
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(ticks.get(), 0);
    }

    #[test]
    fn sleep_racing_event_resumes_once() {
        use futures::future::{Either, select};
        use std::pin::pin;

        let exec = TaskExecutor::new();
        let ev = Event::new();
        let polls = Rc::new(Cell::new(0));
        let (e, p) = (ev.clone(), Rc::clone(&polls));
        let handle = exec.schedule("racer", async move {
            let won = match select(pin!(e.wait()), pin!(sleep(Duration::from_millis(30)))).await {
                Either::Left((res, _)) => res.map(|_| "event")?,
                Either::Right((res, _)) => res.map(|_| "timer")?,
            };
            p.set(p.get() + 1);
            assert_eq!(won, "event");
            Ok(())
        });
        exec.process_tasks();
        ev.set();
        drive_for(&exec, Duration::from_millis(60));
        assert_eq!(polls.get(), 1);
        assert_eq!(handle.status(), TaskStatus::Completed);
    }

    #[test]
    fn failures_close_only_the_offending_task() {
        let exec = TaskExecutor::new();
        let bad = exec.schedule("bad", async { Err(TaskError::fail("boom")) });
        let panicky = exec.schedule("panicky", async {
            if true {
                panic!("kaput");
            }
            Ok(())
        });
        let good = exec.schedule("good", async { Ok(()) });
        exec.process_tasks();

        assert_eq!(bad.status(), TaskStatus::Failed);
        assert_eq!(panicky.status(), TaskStatus::Failed);
        assert!(matches!(panicky.error(), Some(TaskError::Panicked { .. })));
        assert_eq!(good.status(), TaskStatus::Completed);
    }

    #[test]
    fn foreign_awaitable_is_a_protocol_error() {
        let exec = TaskExecutor::new();
        let handle = exec.schedule("foreign", async {
            pending::<()>().await;
            Ok(())
        });
        exec.process_tasks();
        assert_eq!(handle.status(), TaskStatus::Pending);
        assert!(handle.is_cancelled());

        // Re-stepped once with the cancel flag; still foreign, so it is dropped.
        exec.process_tasks();
        assert_eq!(handle.status(), TaskStatus::Canceled);
        assert!(exec.is_empty());
    }

    #[test]
    fn callbacks_run_in_order_and_survive_panics() {
        let exec = TaskExecutor::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        exec.call_later(Duration::from_millis(10), move || l.borrow_mut().push(3));
        let l = Rc::clone(&log);
        exec.call_soon(move || l.borrow_mut().push(1));
        exec.call_soon(|| panic!("callback bug"));
        let l = Rc::clone(&log);
        exec.call_soon(move || l.borrow_mut().push(2));

        drive_for(&exec, Duration::from_millis(30));
        assert_eq!(*log.borrow(), [1, 2, 3]);
    }

    #[test]
    fn run_returns_after_stop_from_a_task() {
        let exec = TaskExecutor::new();
        let stopper = exec.clone();
        exec.schedule("stopper", async move {
            sleep(Duration::from_millis(20)).await?;
            stopper.stop();
            Ok(())
        });
        let started = Instant::now();
        exec.run();
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert!(!exec.is_running());
    }

    #[test]
    fn remote_jobs_wake_a_blocked_run() {
        let exec = TaskExecutor::new();
        let remote = exec.remote();
        let flag = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let f = std::sync::Arc::clone(&flag);
        let thread = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            assert!(remote.call_soon(Box::new(move || {
                f.store(true, std::sync::atomic::Ordering::SeqCst);
            })));
        });

        let poller = exec.clone();
        let flag2 = std::sync::Arc::clone(&flag);
        exec.schedule("watch", async move {
            while !flag2.load(std::sync::atomic::Ordering::SeqCst) {
                sleep(Duration::from_millis(5)).await?;
            }
            poller.stop();
            Ok(())
        });
        exec.run();
        thread.join().expect("remote thread");
        assert!(flag.load(std::sync::atomic::Ordering::SeqCst));
    }
}
