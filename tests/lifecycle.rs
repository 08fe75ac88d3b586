mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use common::{canvas, init_tracing, mode, quiet};
use renderloop::events::EventKind;
use renderloop::{
    CanvasGroup, Event, EventLoop, LoopConfig, LoopState, TaskError, TaskStatus, UpdateMode,
    sleep,
};

#[test]
fn run_without_surfaces_returns_within_a_housekeeping_interval() {
    init_tracing();
    let lp = EventLoop::native(quiet());
    let started = Instant::now();
    lp.run().expect("run");
    assert!(started.elapsed() < Duration::from_millis(200));
    assert_eq!(lp.state(), LoopState::Off);
}

#[test]
fn stop_on_an_off_loop_is_a_noop() {
    let lp = EventLoop::native(quiet());
    let mut rx = lp.bus().subscribe();
    lp.stop(false);
    lp.stop(true);
    assert_eq!(lp.state(), LoopState::Off);
    assert!(rx.try_recv().is_err());
}

#[test]
fn loop_walks_the_state_machine() {
    init_tracing();
    let lp = EventLoop::native(quiet());
    let mut rx = lp.bus().subscribe();
    let group = CanvasGroup::new(Some(lp.clone()));
    let c = canvas(&group, mode(UpdateMode::Ondemand, 30.0));
    assert_eq!(lp.state(), LoopState::Ready);

    let closer = Rc::clone(&c);
    lp.call_later(Duration::from_millis(50), move || closer.closed.set(true));
    lp.run().expect("run");

    let states: Vec<LoopState> = std::iter::from_fn(|| rx.try_recv().ok())
        .filter(|ev| ev.kind == EventKind::StateChanged)
        .filter_map(|ev| ev.state)
        .collect();
    assert_eq!(
        states,
        [
            LoopState::Ready,
            LoopState::Active,
            LoopState::Running,
            LoopState::Off
        ]
    );
}

#[test]
fn closing_twice_notifies_once() {
    init_tracing();
    let lp = EventLoop::native(quiet());
    let group = CanvasGroup::new(Some(lp.clone()));
    let c = canvas(&group, mode(UpdateMode::Manual, 30.0));
    let mut rx = lp.bus().subscribe();

    let closer = Rc::clone(&c);
    lp.call_later(Duration::from_millis(30), move || {
        use renderloop::Surface;
        closer.close();
        closer.close();
    });
    lp.run().expect("run");

    assert_eq!(c.notified.get(), 1);
    assert_eq!(group.get_surfaces(true).len(), 0);
    assert_eq!(c.notified.get(), 1);
    let closed_events = std::iter::from_fn(|| rx.try_recv().ok())
        .filter(|ev| ev.kind == EventKind::SurfaceClosed)
        .count();
    assert_eq!(closed_events, 1);
}

#[test]
fn dropped_surface_is_swept_silently() {
    init_tracing();
    let lp = EventLoop::native(quiet());
    let group = CanvasGroup::new(Some(lp.clone()));
    let c = canvas(&group, mode(UpdateMode::Continuous, 30.0));
    let sched = Rc::clone(c.scheduler.get().expect("scheduler"));
    assert_eq!(group.get_surfaces(false).len(), 1);

    drop(c);
    assert!(group.get_surfaces(true).is_empty());
    assert!(sched.get_surface().is_none());

    let started = Instant::now();
    lp.run().expect("run");
    assert!(started.elapsed() < Duration::from_millis(300));
}

#[test]
fn cancel_before_first_resumption_has_no_side_effects() {
    let lp = EventLoop::native(quiet());
    let ran = Rc::new(Cell::new(false));
    let r = Rc::clone(&ran);
    let handle = lp.add_task("never", async move {
        r.set(true);
        Ok(())
    });
    let notified = Rc::new(Cell::new(0));
    let n = Rc::clone(&notified);
    handle.add_done_callback(move |_| n.set(n.get() + 1));

    handle.cancel();
    lp.process_tasks().expect("native");
    lp.process_tasks().expect("native");

    assert!(!ran.get());
    assert_eq!(handle.status(), TaskStatus::Canceled);
    assert_eq!(notified.get(), 1);
}

#[test]
fn second_stop_forces_teardown_when_surfaces_refuse_to_close() {
    init_tracing();
    let lp = EventLoop::native(quiet());
    let group = CanvasGroup::new(Some(lp.clone()));
    let c = canvas(&group, mode(UpdateMode::Continuous, 30.0));
    c.refuse_close.set(true);

    let first = lp.clone();
    lp.call_later(Duration::from_millis(50), move || first.interrupt());
    let second = lp.clone();
    lp.call_later(Duration::from_millis(100), move || second.interrupt());

    let started = Instant::now();
    lp.run().expect("run");
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(100), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(400), "{elapsed:?}");
    assert!(!c.closed.get());
    assert_eq!(lp.state(), LoopState::Off);
}

#[test]
fn single_stop_with_cooperative_surface_tears_down() {
    init_tracing();
    let lp = EventLoop::native(quiet());
    let group = CanvasGroup::new(Some(lp.clone()));
    let c = canvas(&group, mode(UpdateMode::Continuous, 30.0));

    let stopper = lp.clone();
    lp.call_later(Duration::from_millis(50), move || stopper.stop(false));
    lp.run().expect("run");

    assert!(c.closed.get());
    assert_eq!(c.notified.get(), 1);
    assert_eq!(lp.state(), LoopState::Off);
}

#[test]
fn loop_can_run_again_after_teardown() {
    init_tracing();
    let lp = EventLoop::native(quiet());
    lp.run().expect("first run");
    assert_eq!(lp.state(), LoopState::Off);

    let hits = Rc::new(Cell::new(0));
    let h = Rc::clone(&hits);
    lp.add_task("again", async move {
        sleep(Duration::from_millis(10)).await?;
        h.set(h.get() + 1);
        Ok(())
    });
    lp.run().expect("second run");
    assert_eq!(hits.get(), 1);
}

#[test]
fn sleep_then_event_ordering_on_the_loop() {
    init_tracing();
    // Long housekeeping interval: no surfaces would otherwise stop the loop at 100ms.
    let lp = EventLoop::native(LoopConfig {
        housekeeping_interval: Duration::from_millis(500),
        ..quiet()
    });
    let log = Rc::new(RefCell::new(Vec::new()));
    let started = Instant::now();
    let ev = Event::new();

    let (e, l) = (ev.clone(), Rc::clone(&log));
    lp.add_task("a", async move {
        sleep(Duration::from_millis(50)).await?;
        l.borrow_mut().push("a");
        e.set();
        Ok(())
    });
    let (e, l) = (ev.clone(), Rc::clone(&log));
    lp.add_task("b", async move {
        e.wait().await?;
        assert!(started.elapsed() >= Duration::from_millis(50));
        l.borrow_mut().push("b");
        Ok(())
    });
    let (l, stopper) = (Rc::clone(&log), lp.clone());
    lp.add_task("timer", async move {
        sleep(Duration::from_millis(110)).await?;
        l.borrow_mut().push("timer");
        stopper.stop(true);
        Ok(())
    });

    lp.run().expect("run");
    assert_eq!(*log.borrow(), ["a", "b", "timer"]);
}

#[test]
fn remote_callbacks_run_on_the_loop_thread() {
    init_tracing();
    let lp = EventLoop::native(quiet());
    let remote = lp.remote();
    let loop_thread = std::thread::current().id();
    let (tx, rx) = std::sync::mpsc::channel();

    let worker = std::thread::spawn(move || {
        remote
            .call_soon_threadsafe(move || {
                let _ = tx.send(std::thread::current().id());
            })
            .expect("loop alive");
    });
    lp.run().expect("run");
    worker.join().expect("worker");
    assert_eq!(
        rx.recv_timeout(Duration::from_secs(1)).ok(),
        Some(loop_thread)
    );
}

#[test]
fn task_that_stops_the_loop_is_cancelled_by_teardown() {
    init_tracing();
    let lp = EventLoop::native(quiet());
    let wakes = Rc::new(Cell::new(0));
    let (w, stopper) = (Rc::clone(&wakes), lp.clone());
    let handle = lp.add_task("stopper", async move {
        sleep(Duration::from_millis(10)).await?;
        stopper.stop(true);
        loop {
            let _ = sleep(Duration::from_millis(5)).await;
            w.set(w.get() + 1);
        }
    });
    lp.run().expect("run");

    assert_eq!(handle.status(), TaskStatus::Canceled);
    assert!(wakes.get() <= 1, "wakes = {}", wakes.get());
    assert_eq!(lp.state(), LoopState::Off);
}

/// Handler currently installed for `signal`.
#[cfg(unix)]
fn disposition(signal: nix::sys::signal::Signal) -> nix::libc::sighandler_t {
    use nix::libc;
    // SAFETY: a null new action only queries the current one.
    unsafe {
        let mut current: libc::sigaction = std::mem::zeroed();
        libc::sigaction(signal as libc::c_int, std::ptr::null(), &mut current);
        current.sa_sigaction
    }
}

#[cfg(unix)]
#[test]
fn sigint_stops_run_and_the_previous_handler_is_restored() {
    use nix::sys::signal::{Signal, raise};

    init_tracing();
    let before = (disposition(Signal::SIGINT), disposition(Signal::SIGTERM));

    let lp = EventLoop::native(LoopConfig {
        housekeeping_interval: Duration::from_millis(20),
        ..LoopConfig::default()
    });
    let mut rx = lp.bus().subscribe();
    let group = CanvasGroup::new(Some(lp.clone()));
    let c = canvas(&group, mode(UpdateMode::Continuous, 30.0));

    lp.add_task("interrupt", async {
        sleep(Duration::from_millis(30)).await?;
        raise(Signal::SIGINT).map_err(|e| TaskError::fail(e.to_string()))?;
        Ok(())
    });
    let started = Instant::now();
    lp.run().expect("run");

    assert!(started.elapsed() < Duration::from_millis(500));
    assert!(c.closed.get());
    assert_eq!(lp.state(), LoopState::Off);
    let mut kinds = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        kinds.push(ev.kind);
    }
    assert!(kinds.contains(&EventKind::InterruptReceived), "{kinds:?}");
    assert_eq!(
        (disposition(Signal::SIGINT), disposition(Signal::SIGTERM)),
        before
    );
}
