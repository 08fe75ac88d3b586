//! # renderloop
//!
//! **renderloop** is the scheduling core of a multi-backend canvas library.
//!
//! It decides *when* surfaces draw: a cooperative task executor, an event loop
//! lifecycle that knows when to start and stop, weak registries of surfaces, and
//! a per-surface frame pacer with draw-completion back-pressure. Rendering,
//! windowing and input belong to the [`Surface`] implementations plugged into it.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   Surface    │   │   Surface    │   │   Surface    │
//!     │  (window #1) │   │  (window #2) │   │ (offscreen)  │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ owns             │ owns             │ owns
//!     ┌──────▼───────┐   ┌──────▼───────┐   ┌──────▼───────┐
//!     │DrawScheduler │   │DrawScheduler │   │DrawScheduler │
//!     │ (tick task)  │   │ (tick task)  │   │ (tick task)  │
//!     └──────┬───────┘   └──────┬───────┘   └──────────────┘
//!            │ register         │ register        (no loop: task dropped)
//! ┌──────────▼──────────────────▼──────────────────────────────────────┐
//! │  CanvasGroup (weak surface registry) ──strong──► EventLoop          │
//! └────────────────────────────────────────────────┬───────────────────┘
//!                                                  ▼
//! ┌────────────────────────────────────────────────────────────────────┐
//! │  EventLoop (LoopState machine)                                     │
//! │  - housekeeping task (poll_gui, sweep closed surfaces, auto-stop)  │
//! │  - stop / force / interrupt handling                               │
//! │  - Bus (broadcast observability events)                            │
//! └───────────────────────────────┬────────────────────────────────────┘
//!                                 ▼  Host trait
//!                 ┌───────────────┴────────────────┐
//!                 ▼                                ▼
//!        NativeHost (TaskExecutor)         TokioHost (current-thread
//!        timer heap + crossbeam hand-off   runtime + local nursery)
//! ```
//!
//! ### Lifecycle
//! ```text
//! Off ──(first add_task / register)──► Ready ──(housekeeping runs)──► Active
//!   ▲                                                                   │
//!   │                                    run() ◄────────────────────────┤
//!   │                                  Running                          │
//!   │                                      │           run_async / process_tasks
//!   │                                      │                 Interactive
//!   └──── teardown: no live surface, forced stop, second interrupt ────┘
//! ```
//!
//! ### Tick
//! ```text
//! loop {
//!   ├─► sleep(1/max_fps - time already spent)     (0 for fastest)
//!   ├─► surface.process_events().await
//!   ├─► policy: manual | ondemand | continuous | fastest
//!   └─► draw? request_draw(), then wait for on_draw_done / on_cancel_draw
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                          |
//! |-------------------|---------------------------------------------------------------|---------------------------------------------|
//! | **Executor**      | Single-threaded cooperative tasks with a closed suspend set.  | [`TaskExecutor`], [`TaskHandle`], [`sleep`], [`Event`] |
//! | **Loop**          | Lifecycle state machine, stop/interrupt handling, run modes.  | [`EventLoop`], [`LoopState`], [`LoopBuilder`] |
//! | **Hosts**         | Swappable drivers behind one trait.                           | [`Host`], [`NativeHost`], [`TokioHost`]     |
//! | **Groups**        | Weak surface registries bound to a loop.                      | [`CanvasGroup`]                             |
//! | **Pacing**        | Update modes, fps bounds, draw back-pressure, frame stats.    | [`DrawScheduler`], [`UpdateMode`]           |
//! | **Events**        | Broadcast observability events.                               | [`events::Event`], [`EventKind`], [`Bus`]   |
//! | **Errors**        | Typed pre-flight and in-task errors.                          | [`LoopError`], [`TaskError`]                |
//! | **Configuration** | Loop and scheduler settings.                                  | [`LoopConfig`], [`SchedulerConfig`]         |
//!
//! ## Example
//! ```rust,no_run
//! use std::cell::Cell;
//! use std::rc::{Rc, Weak};
//!
//! use async_trait::async_trait;
//! use renderloop::{
//!     CanvasGroup, DrawScheduler, EventLoop, LoopConfig, SchedulerConfig, Surface, UpdateMode,
//! };
//!
//! struct Window {
//!     closed: Cell<bool>,
//!     scheduler: std::cell::OnceCell<Rc<DrawScheduler>>,
//! }
//!
//! #[async_trait(?Send)]
//! impl Surface for Window {
//!     async fn process_events(&self) {}
//!     fn request_draw(&self) {
//!         let sched = self.scheduler.get().expect("scheduler set");
//!         sched.on_about_to_draw();
//!         // ... render and present ...
//!         sched.on_draw_done();
//!     }
//!     fn is_closed(&self) -> bool { self.closed.get() }
//!     fn close(&self) { self.closed.set(true) }
//! }
//!
//! fn main() -> Result<(), renderloop::LoopError> {
//!     let lp = EventLoop::native(LoopConfig::default());
//!     let group = CanvasGroup::new(Some(lp.clone()));
//!
//!     let window = Rc::new(Window { closed: Cell::new(false), scheduler: Default::default() });
//!     let weak: Weak<dyn Surface> = Rc::downgrade(&window) as Weak<dyn Surface>;
//!     let sched = DrawScheduler::new(weak, SchedulerConfig::with_mode(UpdateMode::Continuous))?;
//!     let _ = window.scheduler.set(Rc::clone(&sched));
//!     sched.register(&group);
//!
//!     // Returns once the window closes (Ctrl-C asks it to).
//!     lp.run()
//! }
//! ```

mod config;
mod core;
mod error;
pub mod events;
pub mod executor;
mod report;
mod scheduler;
mod surface;

// ---- Public re-exports ----

pub use config::{LoopConfig, SchedulerConfig};
pub use crate::core::{
    Capabilities, CanvasGroup, EventLoop, Host, HostKind, LoopBuilder, LoopRemote, LoopState,
    NativeHost, TokioHost, wait_for_shutdown_signal,
};
pub use error::{LoopError, TaskError};
pub use events::{Bus, EventKind};
pub use executor::{
    Event, ExecutorRemote, LocalTask, StepOutcome, Suspend, TaskExecutor, TaskHandle, TaskStatus,
    sleep,
};
pub use report::{report_error, reset_reports};
pub use scheduler::{DrawScheduler, FrameTiming, UpdateMode};
pub use surface::Surface;
