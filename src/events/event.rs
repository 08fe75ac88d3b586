//! # Runtime events emitted by loops, groups and schedulers.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Loop events**: state transitions, stop requests, interrupts
//! - **Surface events**: registration and close finalization
//! - **Task/frame events**: task failures and rolling frame statistics
//!
//! The [`Event`] struct carries additional metadata such as the loop state,
//! surface/task name, reasons and frame timings.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use renderloop::events::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TaskFailed)
//!     .with_name("housekeeping")
//!     .with_reason("boom");
//!
//! assert_eq!(ev.kind, EventKind::TaskFailed);
//! assert_eq!(ev.name.as_deref(), Some("housekeeping"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::core::LoopState;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Loop events ===
    /// Loop moved to a new [`LoopState`].
    ///
    /// Sets:
    /// - `state`: the new state
    StateChanged,

    /// `stop()` was called on a live loop.
    ///
    /// Sets:
    /// - `count`: accumulated stop requests
    StopRequested,

    /// An interrupt/termination signal was consumed by the loop.
    ///
    /// Sets:
    /// - `count`: interrupts seen during this `run()`
    InterruptReceived,

    // === Surface events ===
    /// A surface was registered in a canvas group.
    ///
    /// Sets:
    /// - `name`: surface name
    SurfaceRegistered,

    /// A closed surface was finalized by a group sweep (fires once per surface).
    ///
    /// Sets:
    /// - `name`: surface name
    SurfaceClosed,

    // === Task/frame events ===
    /// A task ended with an error or panic.
    ///
    /// Sets:
    /// - `name`: task name
    /// - `reason`: error message
    TaskFailed,

    /// A rolling frame-statistics window closed.
    ///
    /// Sets:
    /// - `name`: scheduler name
    /// - `frame_time_us`: mean frame time over the window
    /// - `count`: frames in the window
    FrameStats,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Surface, task or scheduler name, if applicable.
    pub name: Option<Arc<str>>,
    /// Human-readable reason (errors, details).
    pub reason: Option<Arc<str>>,
    /// Loop state (for `StateChanged`).
    pub state: Option<LoopState>,
    /// Counter payload (stop requests, interrupts, frames).
    pub count: Option<u32>,
    /// Mean frame time in microseconds (compact).
    pub frame_time_us: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            name: None,
            reason: None,
            state: None,
            count: None,
            frame_time_us: None,
        }
    }

    /// Attaches a surface/task/scheduler name.
    #[inline]
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a loop state.
    #[inline]
    pub fn with_state(mut self, state: LoopState) -> Self {
        self.state = Some(state);
        self
    }

    /// Attaches a counter.
    #[inline]
    pub fn with_count(mut self, n: u32) -> Self {
        self.count = Some(n);
        self
    }

    /// Attaches a frame time (stored as microseconds).
    #[inline]
    pub fn with_frame_time(mut self, d: Duration) -> Self {
        let us = d.as_micros().min(u128::from(u32::MAX)) as u32;
        self.frame_time_us = Some(us);
        self
    }

    /// Creates a state transition event.
    #[inline]
    pub fn state_changed(state: LoopState) -> Self {
        Event::new(EventKind::StateChanged).with_state(state)
    }

    /// Returns the frame time as a `Duration`, if present.
    pub fn frame_time(&self) -> Option<Duration> {
        self.frame_time_us
            .map(|us| Duration::from_micros(u64::from(us)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::StopRequested);
        let b = Event::new(EventKind::StopRequested);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn frame_time_is_stored_compactly() {
        let ev = Event::new(EventKind::FrameStats).with_frame_time(Duration::from_millis(16));
        assert_eq!(ev.frame_time_us, Some(16_000));
        assert_eq!(ev.frame_time(), Some(Duration::from_millis(16)));
    }
}
