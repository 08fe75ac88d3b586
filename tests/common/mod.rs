#![allow(dead_code)]

use std::cell::{Cell, OnceCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use renderloop::{
    CanvasGroup, DrawScheduler, EventLoop, LoopConfig, SchedulerConfig, Surface, UpdateMode,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub fn quiet() -> LoopConfig {
    LoopConfig {
        handle_signals: false,
        ..LoopConfig::default()
    }
}

/// Surface double that draws synchronously inside `request_draw`.
#[derive(Default)]
pub struct TestCanvas {
    pub closed: Cell<bool>,
    pub refuse_close: Cell<bool>,
    pub request_on_events: Cell<bool>,
    pub events: Cell<u32>,
    pub draws: Cell<u32>,
    pub notified: Cell<u32>,
    pub scheduler: OnceCell<Rc<DrawScheduler>>,
}

impl TestCanvas {
    /// Draws now, bypassing the scheduling policy.
    pub fn force_draw(&self) {
        self.draw();
    }

    fn draw(&self) {
        if let Some(sched) = self.scheduler.get() {
            sched.on_about_to_draw();
        }
        self.draws.set(self.draws.get() + 1);
        if let Some(sched) = self.scheduler.get() {
            sched.on_draw_done();
        }
    }
}

#[async_trait(?Send)]
impl Surface for TestCanvas {
    fn name(&self) -> &str {
        "test-canvas"
    }

    async fn process_events(&self) {
        self.events.set(self.events.get() + 1);
        if self.request_on_events.get() {
            if let Some(sched) = self.scheduler.get() {
                sched.request_draw();
            }
        }
    }

    fn request_draw(&self) {
        self.draw();
    }

    fn is_closed(&self) -> bool {
        self.closed.get()
    }

    fn close(&self) {
        if !self.refuse_close.get() {
            self.closed.set(true);
        }
    }

    fn notify_closed(&self) {
        self.notified.set(self.notified.get() + 1);
    }
}

/// Creates a canvas with a scheduler registered in `group`.
pub fn canvas(group: &CanvasGroup, cfg: SchedulerConfig) -> Rc<TestCanvas> {
    let canvas = Rc::new(TestCanvas::default());
    let weak: Weak<dyn Surface> = Rc::downgrade(&canvas) as Weak<dyn Surface>;
    let sched = DrawScheduler::new(weak, cfg).expect("valid scheduler config");
    let _ = canvas.scheduler.set(Rc::clone(&sched));
    sched.register(group);
    canvas
}

pub fn mode(mode: UpdateMode, max_fps: f64) -> SchedulerConfig {
    SchedulerConfig {
        mode,
        min_fps: 1.0,
        max_fps,
    }
}

/// Stops (forced) the loop after `after`.
pub fn stop_after(lp: &EventLoop, after: Duration) {
    let target = lp.clone();
    lp.call_later(after, move || target.stop(true));
}
