//! # Event loop lifecycle.
//!
//! [`EventLoop`] owns a [`Host`] and walks the state machine in
//! [`LoopState`]. It knows its canvas groups only weakly and learns about
//! surfaces through them.
//!
//! ```text
//!  first add_task / register ──► ensure_ready(): Off → Ready, spawn housekeeping
//!  housekeeping first runs   ──► Active → Running (inside run()) | Interactive
//!  every interval            ──► consume interrupts, poll_gui, sweep groups
//!                                 driven && (no live surface || stop count ≥ force) → teardown
//!  stop(force)               ──► count += 1 (force: jump to threshold)
//!                                 close live surfaces once
//!                                 no live surface || count ≥ spam || force → teardown
//!  teardown                  ──► cancel_all, host.stop(), → Off
//! ```
//!
//! ## Rules
//! - `stop()` on an `Off` loop does nothing.
//! - `run()` is not reentrant; a host already driven elsewhere makes it return at once.
//! - Signals are only intercepted while inside `run()`.
//! - Teardown is allowed from every state.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::builder::LoopBuilder;
use super::group::GroupInner;
use super::host::{Host, LoopRemote, NativeHost, TokioHost};
use super::housekeeping;
use super::shutdown::SignalListener;
use super::state::LoopState;
use crate::config::LoopConfig;
use crate::error::LoopError;
use crate::events::{Bus, Event, EventKind};
use crate::executor::{TaskHandle, TaskStatus};
use crate::surface::Surface;

pub(crate) struct LoopInner {
    cfg: LoopConfig,
    host: Box<dyn Host>,
    bus: Bus,
    state: Cell<LoopState>,
    groups: RefCell<Vec<Weak<GroupInner>>>,
    housekeeping: RefCell<Option<TaskHandle>>,
    inside_run: Cell<bool>,
    driving: Cell<bool>,
    stop_count: Cell<u32>,
    interrupts: Arc<AtomicU32>,
    interrupts_seen: Cell<u32>,
    signals: RefCell<Option<SignalListener>>,
}

/// Cooperative event loop driving tasks for one or more canvas groups.
///
/// Cheap to clone; clones share state. Not `Send`: a loop lives on the thread
/// that created it. Use [`remote`](Self::remote) to reach it from elsewhere.
#[derive(Clone)]
pub struct EventLoop {
    inner: Rc<LoopInner>,
}

impl EventLoop {
    /// Creates a loop on the given host.
    pub fn new(cfg: LoopConfig, host: impl Host + 'static) -> Self {
        Self::from_boxed(cfg, Box::new(host))
    }

    pub(crate) fn from_boxed(cfg: LoopConfig, host: Box<dyn Host>) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        Self {
            inner: Rc::new(LoopInner {
                cfg,
                host,
                bus,
                state: Cell::new(LoopState::Off),
                groups: RefCell::new(Vec::new()),
                housekeeping: RefCell::new(None),
                inside_run: Cell::new(false),
                driving: Cell::new(false),
                stop_count: Cell::new(0),
                interrupts: Arc::new(AtomicU32::new(0)),
                interrupts_seen: Cell::new(0),
                signals: RefCell::new(None),
            }),
        }
    }

    /// Loop on the built-in executor.
    pub fn native(cfg: LoopConfig) -> Self {
        Self::new(cfg, NativeHost::new())
    }

    /// Loop on tokio.
    pub fn tokio(cfg: LoopConfig) -> Self {
        Self::new(cfg, TokioHost::new())
    }

    /// Tokio if a runtime is current on this thread, otherwise native.
    pub fn auto(cfg: LoopConfig) -> Self {
        if tokio::runtime::Handle::try_current().is_ok() {
            Self::tokio(cfg)
        } else {
            Self::native(cfg)
        }
    }

    /// Starts a [`LoopBuilder`].
    pub fn builder(cfg: LoopConfig) -> LoopBuilder {
        LoopBuilder::new(cfg)
    }

    pub(crate) fn from_inner(inner: Rc<LoopInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<LoopInner> {
        Rc::downgrade(&self.inner)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LoopState {
        self.inner.state.get()
    }

    /// Loop configuration.
    pub fn config(&self) -> &LoopConfig {
        &self.inner.cfg
    }

    /// Observability bus.
    pub fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    /// Name of the host driver.
    pub fn host_name(&self) -> &'static str {
        self.inner.host.name()
    }

    /// Accumulated stop requests since the last teardown.
    pub fn stop_count(&self) -> u32 {
        self.inner.stop_count.get()
    }

    /// Thread-safe hand-off onto this loop's thread.
    pub fn remote(&self) -> LoopRemote {
        self.inner.host.remote()
    }

    /// Schedules a task on the loop.
    ///
    /// Initializes the loop if needed. Failures are logged and published as
    /// [`EventKind::TaskFailed`].
    pub fn add_task(
        &self,
        name: impl Into<Cow<'static, str>>,
        task: impl Future<Output = Result<(), crate::error::TaskError>> + 'static,
    ) -> TaskHandle {
        self.ensure_ready();
        let handle = self.inner.host.spawn(name.into(), Box::pin(task));
        let bus = self.inner.bus.clone();
        handle.add_done_callback(move |h| {
            if h.status() == TaskStatus::Failed {
                let reason = h.error().map(|e| e.to_string()).unwrap_or_default();
                bus.publish(
                    Event::new(EventKind::TaskFailed)
                        .with_name(h.name())
                        .with_reason(reason),
                );
            }
        });
        handle
    }

    /// Runs `callback` soon, on the loop thread.
    pub fn call_soon(&self, callback: impl FnOnce() + 'static) {
        self.ensure_ready();
        self.inner.host.call_soon(Box::new(callback));
    }

    /// Runs `callback` after `delay`, on the loop thread.
    pub fn call_later(&self, delay: Duration, callback: impl FnOnce() + 'static) {
        self.ensure_ready();
        self.inner.host.call_later(delay, Box::new(callback));
    }

    /// Runs one batch of due work without blocking.
    ///
    /// Only hosts with manual stepping support this (the native host).
    pub fn process_tasks(&self) -> Result<usize, LoopError> {
        self.inner.host.process_tasks()
    }

    /// Drives the loop until it is stopped or every surface has closed.
    ///
    /// Returns immediately when the host is already driven elsewhere (e.g. a
    /// pending [`run_async`](Self::run_async) on this thread's tokio runtime).
    /// Inside a tokio runtime that nothing drives, the tokio host fails with
    /// [`LoopError::HostIncompatible`]; await `run_async` there.
    pub fn run(&self) -> Result<(), LoopError> {
        if self.inner.inside_run.get() {
            return Err(LoopError::NotReentrant);
        }
        let caps = self.inner.host.capabilities();
        if !caps.blocking_run {
            return Err(LoopError::HostIncompatible {
                host: self.inner.host.name(),
                capability: "run",
            });
        }
        self.ensure_ready();
        if self.inner.host.foreign_driver_active() {
            debug!(host = self.host_name(), "foreign driver active; run() returns");
            return Ok(());
        }

        self.inner.interrupts.store(0, Ordering::SeqCst);
        self.inner.interrupts_seen.set(0);
        if self.inner.cfg.handle_signals {
            *self.inner.signals.borrow_mut() =
                SignalListener::install(Arc::clone(&self.inner.interrupts));
        }

        info!(host = self.host_name(), "loop running");
        self.inner.inside_run.set(true);
        self.inner.driving.set(true);
        let res = self.inner.host.run();
        self.inner.driving.set(false);
        self.inner.inside_run.set(false);
        // Restores the previous signal dispositions.
        let listener = self.inner.signals.borrow_mut().take();
        drop(listener);
        info!("loop returned");
        res
    }

    /// Awaitable variant of [`run`](Self::run).
    ///
    /// Requires a host with async support; fails with
    /// [`LoopError::HostIncompatible`] before anything is scheduled otherwise.
    pub async fn run_async(&self) -> Result<(), LoopError> {
        let caps = self.inner.host.capabilities();
        if !caps.async_run {
            return Err(LoopError::HostIncompatible {
                host: self.inner.host.name(),
                capability: "run_async",
            });
        }
        if self.inner.driving.get() {
            return Err(LoopError::NotReentrant);
        }
        self.ensure_ready();
        info!(host = self.host_name(), "loop running (async)");
        self.inner.driving.set(true);
        let res = self.inner.host.run_async().await;
        self.inner.driving.set(false);
        res
    }

    /// Requests the loop to stop.
    ///
    /// Every live surface is asked to close (once). The loop tears down when no
    /// surface is left, when `force` is set, or when stop requests pile up to
    /// [`LoopConfig::spam_threshold`]. Otherwise housekeeping finishes the job.
    pub fn stop(&self, force: bool) {
        if self.state() == LoopState::Off {
            return;
        }
        let force_at = self.inner.cfg.force_threshold_clamped();
        let mut count = self.inner.stop_count.get() + 1;
        if force {
            count = count.max(force_at);
        }
        self.inner.stop_count.set(count);
        debug!(count, force, "stop requested");
        self.inner
            .bus
            .publish(Event::new(EventKind::StopRequested).with_count(count));

        let live = self.close_surfaces();
        if live == 0 || force || count >= self.inner.cfg.spam_threshold_clamped() {
            self.teardown();
        }
    }

    /// Handles one interrupt: logs it and requests a graceful stop.
    ///
    /// The signal listener funnels every SIGINT/SIGTERM through here.
    pub fn interrupt(&self) {
        let seen = self.inner.interrupts_seen.get();
        warn!("interrupt received; stopping loop");
        self.inner
            .bus
            .publish(Event::new(EventKind::InterruptReceived).with_count(seen));
        self.stop(false);
    }

    /// Live surfaces across all bound groups.
    pub fn get_surfaces(&self) -> Vec<Rc<dyn Surface>> {
        self.groups()
            .iter()
            .flat_map(|g| g.get_surfaces(false))
            .collect()
    }

    pub(crate) fn register_group(&self, group: &Rc<GroupInner>) {
        self.ensure_ready();
        let mut groups = self.inner.groups.borrow_mut();
        groups.retain(|g| g.strong_count() > 0);
        if !groups.iter().any(|g| std::ptr::eq(g.as_ptr(), Rc::as_ptr(group))) {
            groups.push(Rc::downgrade(group));
        }
    }

    pub(crate) fn unregister_group(&self, group: &Rc<GroupInner>) {
        self.inner
            .groups
            .borrow_mut()
            .retain(|g| g.strong_count() > 0 && !std::ptr::eq(g.as_ptr(), Rc::as_ptr(group)));
    }

    fn groups(&self) -> Vec<Rc<GroupInner>> {
        let mut groups = self.inner.groups.borrow_mut();
        groups.retain(|g| g.strong_count() > 0);
        groups.iter().filter_map(Weak::upgrade).collect()
    }

    fn set_state(&self, next: LoopState) {
        let prev = self.state();
        if prev == next {
            return;
        }
        if !prev.can_transition_to(next) {
            debug!(from = %prev, to = %next, "ignored state transition");
            return;
        }
        self.inner.state.set(next);
        debug!(from = %prev, to = %next, "loop state");
        self.inner.bus.publish(Event::state_changed(next));
    }

    fn ensure_ready(&self) {
        if self.state() == LoopState::Off {
            self.set_state(LoopState::Ready);
        }
        if self
            .inner
            .housekeeping
            .borrow()
            .as_ref()
            .is_some_and(|h| !h.is_done())
        {
            return;
        }
        let task = housekeeping::run(self.downgrade(), self.inner.cfg.housekeeping_interval);
        let handle = self
            .inner
            .host
            .spawn("housekeeping".into(), Box::pin(task));
        *self.inner.housekeeping.borrow_mut() = Some(handle);
    }

    /// Housekeeping's first step: the loop is executing tasks.
    pub(crate) fn mark_active(&self) {
        if self.state() == LoopState::Ready {
            self.set_state(LoopState::Active);
        }
        if self.state() == LoopState::Active {
            if self.inner.inside_run.get() {
                self.set_state(LoopState::Running);
            } else {
                self.set_state(LoopState::Interactive);
            }
        }
    }

    /// One housekeeping pass. Returns `false` once the loop is torn down.
    pub(crate) fn housekeeping_tick(&self) -> bool {
        self.consume_interrupts();
        if self.state() == LoopState::Off {
            return false;
        }

        let mut live = 0;
        for group in self.groups() {
            for surface in group.get_surfaces(true) {
                surface.poll_gui();
                live += 1;
            }
        }

        let count = self.inner.stop_count.get();
        if count >= self.inner.cfg.force_threshold_clamped() {
            info!(count, "forced stop");
            self.teardown();
            return false;
        }
        if self.inner.driving.get() && live == 0 {
            debug!("no live surfaces; stopping loop");
            self.teardown();
            return false;
        }
        if count > 0 {
            self.close_surfaces();
        }
        true
    }

    fn consume_interrupts(&self) {
        if let Some(listener) = self.inner.signals.borrow().as_ref() {
            listener.pump();
        }
        let total = self.inner.interrupts.load(Ordering::SeqCst);
        while self.inner.interrupts_seen.get() < total {
            self.inner
                .interrupts_seen
                .set(self.inner.interrupts_seen.get() + 1);
            self.interrupt();
            if self.state() == LoopState::Off {
                break;
            }
        }
    }

    /// Asks surfaces to close, then returns how many are still alive.
    fn close_surfaces(&self) -> usize {
        let groups = self.groups();
        for group in &groups {
            group.close_live();
        }
        groups.iter().map(|g| g.get_surfaces(true).len()).sum()
    }

    fn teardown(&self) {
        if self.state() == LoopState::Off && !self.inner.driving.get() {
            return;
        }
        info!("loop teardown");
        let housekeeping = self.inner.housekeeping.borrow_mut().take();
        drop(housekeeping);
        self.inner.host.cancel_all();
        self.inner.host.stop();
        self.inner.stop_count.set(0);
        self.set_state(LoopState::Off);
    }
}

impl fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("host", &self.host_name())
            .field("state", &self.state())
            .field("stop_count", &self.stop_count())
            .finish()
    }
}
