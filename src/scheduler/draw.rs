//! # Per-surface draw scheduler.
//!
//! A [`DrawScheduler`] runs one task per surface. Every tick it waits out the
//! frame interval, lets the surface process events, decides whether to draw and,
//! if so, waits for the surface to report the frame done before ticking again.
//!
//! ```text
//! loop {
//!   ├─► sleep(max(0, interval - time spent since last tick))
//!   │       interval = 1/max_fps  (0 for fastest, 100ms when disabled)
//!   ├─► upgrade surface (gone or closed → exit)
//!   ├─► surface.process_events().await; sleep(0)   (tasks spawned by handlers start)
//!   ├─► policy says draw?  no → next tick
//!   ├─► arm completion event, surface.request_draw()
//!   └─► wait: completion event | every 100ms re-check the surface is alive
//! }
//! ```
//!
//! ## Rules
//! - At most one draw in flight: the next tick waits for `on_draw_done` or
//!   `on_cancel_draw`.
//! - The scheduler never keeps its surface alive; it holds a `Weak`.
//! - Frame statistics are reported when a ≥1s window closes, not per frame.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::pin::pin;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use futures::future::{Either, select};
use tracing::{debug, trace};

use super::mode::UpdateMode;
use super::stats::{FrameStats, FrameTiming};
use crate::config::{SchedulerConfig, validate_max_fps, validate_min_fps};
use crate::core::CanvasGroup;
use crate::error::{LoopError, TaskError};
use crate::events::{Bus, Event as BusEvent, EventKind};
use crate::executor::{Event, TaskHandle, sleep};
use crate::surface::Surface;

/// Delay before the first tick.
const STARTUP_DELAY: Duration = Duration::from_millis(20);
/// Tick interval while disabled.
const DISABLED_INTERVAL: Duration = Duration::from_millis(100);
/// How often a pending draw re-checks that the surface is still alive.
const LIVENESS_INTERVAL: Duration = Duration::from_millis(100);

/// Cooperative per-surface frame pacer.
pub struct DrawScheduler {
    name: String,
    surface: Weak<dyn Surface>,
    mode: Cell<UpdateMode>,
    min_fps: Cell<f64>,
    max_fps: Cell<f64>,
    enabled: Cell<bool>,
    draw_requested: Cell<bool>,
    last_draw: Cell<Option<Instant>>,
    ready_for_present: RefCell<Option<Event>>,
    stats: RefCell<FrameStats>,
    bus: RefCell<Option<Bus>>,
}

impl DrawScheduler {
    /// Creates a scheduler for `surface`.
    ///
    /// Fails if the fps bounds in `cfg` are invalid.
    pub fn new(surface: Weak<dyn Surface>, cfg: SchedulerConfig) -> Result<Rc<Self>, LoopError> {
        let cfg = cfg.validated()?;
        let name = surface
            .upgrade()
            .map(|s| s.name().to_string())
            .unwrap_or_else(|| "surface".to_string());
        Ok(Rc::new(Self {
            name,
            surface,
            mode: Cell::new(cfg.mode),
            min_fps: Cell::new(cfg.min_fps),
            max_fps: Cell::new(cfg.max_fps),
            enabled: Cell::new(true),
            draw_requested: Cell::new(true),
            last_draw: Cell::new(None),
            ready_for_present: RefCell::new(None),
            stats: RefCell::new(FrameStats::default()),
            bus: RefCell::new(None),
        }))
    }

    /// Registers the surface in `group` and schedules this scheduler's task on
    /// the group's loop. Returns `None` for a group without a loop.
    pub fn register(self: &Rc<Self>, group: &CanvasGroup) -> Option<TaskHandle> {
        if let Some(lp) = group.get_loop() {
            *self.bus.borrow_mut() = Some(lp.bus().clone());
        }
        group.register(self.surface.clone(), Rc::clone(self).run())
    }

    /// Surface name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current update mode.
    pub fn mode(&self) -> UpdateMode {
        self.mode.get()
    }

    /// Minimum fps (ondemand).
    pub fn min_fps(&self) -> f64 {
        self.min_fps.get()
    }

    /// Maximum fps.
    pub fn max_fps(&self) -> f64 {
        self.max_fps.get()
    }

    /// `false` while disabled.
    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    /// `true` while a draw request is pending.
    pub fn is_draw_requested(&self) -> bool {
        self.draw_requested.get()
    }

    /// Changes the update mode and, optionally, the fps bounds.
    ///
    /// Nothing changes if either bound is invalid.
    pub fn set_update_mode(
        &self,
        mode: UpdateMode,
        min_fps: Option<f64>,
        max_fps: Option<f64>,
    ) -> Result<(), LoopError> {
        let min_fps = min_fps.map(validate_min_fps).transpose()?;
        let max_fps = max_fps.map(validate_max_fps).transpose()?;
        self.mode.set(mode);
        if let Some(min_fps) = min_fps {
            self.min_fps.set(min_fps);
        }
        if let Some(max_fps) = max_fps {
            self.max_fps.set(max_fps);
        }
        debug!(
            surface = %self.name,
            mode = %mode,
            min_fps = self.min_fps.get(),
            max_fps = self.max_fps.get(),
            "update mode"
        );
        Ok(())
    }

    /// Enables or disables automatic drawing. Re-enabling requests a draw.
    pub fn set_enabled(&self, enabled: bool) {
        if self.enabled.replace(enabled) != enabled && enabled {
            self.request_draw();
        }
    }

    /// Requests a draw at the next ondemand tick.
    pub fn request_draw(&self) {
        self.draw_requested.set(true);
    }

    /// The surface, if it is still alive.
    pub fn get_surface(&self) -> Option<Rc<dyn Surface>> {
        self.surface.upgrade()
    }

    /// Called by the surface right before it draws.
    pub fn on_about_to_draw(&self) {
        self.draw_requested.set(false);
        self.last_draw.set(Some(Instant::now()));
    }

    /// Called by the surface once the frame is presented.
    ///
    /// Releases the waiting tick. Returns the frame timing when a statistics
    /// window closes.
    pub fn on_draw_done(&self) -> Option<FrameTiming> {
        self.release_tick();
        let now = Instant::now();
        self.last_draw.set(Some(now));

        let timing = self.stats.borrow_mut().record(now)?;
        debug!(
            surface = %self.name,
            fps = timing.fps,
            frame_ms = timing.frame_time.as_secs_f64() * 1000.0,
            "frame stats"
        );
        if let Some(bus) = self.bus.borrow().as_ref() {
            bus.publish(
                BusEvent::new(EventKind::FrameStats)
                    .with_name(self.name.as_str())
                    .with_frame_time(timing.frame_time)
                    .with_count(timing.frames),
            );
        }
        Some(timing)
    }

    /// Called by the surface when a requested draw was skipped.
    pub fn on_cancel_draw(&self) {
        self.release_tick();
    }

    /// Drives the scheduler until the surface goes away.
    ///
    /// Usually scheduled through [`register`](Self::register).
    pub async fn run(self: Rc<Self>) -> Result<(), TaskError> {
        sleep(STARTUP_DELAY).await?;
        let mut last_tick: Option<Instant> = None;
        loop {
            let interval = self.tick_interval();
            let spent = last_tick.map_or(interval, |t| t.elapsed());
            sleep(interval.saturating_sub(spent)).await?;
            last_tick = Some(Instant::now());

            let Some(surface) = self.live_surface() else {
                break;
            };
            surface.process_events().await;
            // Let tasks spawned by event handlers start before drawing.
            sleep(Duration::ZERO).await?;

            if !self.should_draw(Instant::now()) {
                continue;
            }
            let done = Event::new();
            *self.ready_for_present.borrow_mut() = Some(done.clone());
            surface.request_draw();
            drop(surface);

            if !self.wait_for_present(&done).await? {
                break;
            }
        }
        self.ready_for_present.borrow_mut().take();
        trace!(surface = %self.name, "scheduler done");
        Ok(())
    }

    /// Waits for the frame to finish. Returns `false` if the surface died first.
    async fn wait_for_present(&self, done: &Event) -> Result<bool, TaskError> {
        loop {
            match select(pin!(done.wait()), pin!(sleep(LIVENESS_INTERVAL))).await {
                Either::Left((res, _)) => {
                    res?;
                    return Ok(true);
                }
                Either::Right((res, _)) => {
                    res?;
                    if done.is_set() {
                        return Ok(true);
                    }
                    if self.live_surface().is_none() {
                        return Ok(false);
                    }
                }
            }
        }
    }

    fn live_surface(&self) -> Option<Rc<dyn Surface>> {
        self.surface.upgrade().filter(|s| !s.is_closed())
    }

    fn release_tick(&self) {
        let pending = self.ready_for_present.borrow_mut().take();
        if let Some(done) = pending {
            done.set();
        }
    }

    fn tick_interval(&self) -> Duration {
        if !self.enabled.get() {
            return DISABLED_INTERVAL;
        }
        match self.mode.get() {
            UpdateMode::Fastest => Duration::ZERO,
            _ => Duration::from_secs_f64(1.0 / self.max_fps.get()),
        }
    }

    fn should_draw(&self, now: Instant) -> bool {
        if !self.enabled.get() {
            return false;
        }
        match self.mode.get() {
            UpdateMode::Manual => false,
            UpdateMode::Continuous | UpdateMode::Fastest => true,
            UpdateMode::Ondemand => {
                if self.draw_requested.get() {
                    return true;
                }
                let min_fps = self.min_fps.get();
                if min_fps <= 0.0 {
                    return false;
                }
                self.last_draw.get().is_none_or(|at| {
                    now.saturating_duration_since(at) >= Duration::from_secs_f64(1.0 / min_fps)
                })
            }
        }
    }
}

impl fmt::Debug for DrawScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawScheduler")
            .field("name", &self.name)
            .field("mode", &self.mode.get())
            .field("min_fps", &self.min_fps.get())
            .field("max_fps", &self.max_fps.get())
            .field("enabled", &self.enabled.get())
            .field("draw_requested", &self.draw_requested.get())
            .finish()
    }
}
