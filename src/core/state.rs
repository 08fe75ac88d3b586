//! Loop lifecycle states.
//!
//! ```text
//!   Off ──► Ready ──► Active ──┬─► Running      (blocking run())
//!    ▲                         └─► Interactive  (run_async, process_tasks, foreign driver)
//!    └──────────── teardown (from any state) ─────────────┘
//! ```

use std::fmt;

/// Lifecycle state of an [`EventLoop`](crate::EventLoop).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoopState {
    /// Nothing scheduled; the initial and final state.
    #[default]
    Off,
    /// Initialized (housekeeping scheduled) but not yet executing.
    Ready,
    /// Housekeeping observed executing; driver not yet classified.
    Active,
    /// Driven by this crate's blocking `run()`.
    Running,
    /// Driven by something else.
    Interactive,
}

impl LoopState {
    /// Returns `true` if moving from `self` to `next` is allowed.
    ///
    /// Teardown (`→ Off`) is allowed from every state.
    pub fn can_transition_to(self, next: LoopState) -> bool {
        use LoopState::*;
        matches!(
            (self, next),
            (_, Off)
                | (Off, Ready)
                | (Ready, Active)
                | (Active, Running)
                | (Active, Interactive)
        )
    }

    /// `true` for every state except `Off`.
    pub fn is_live(self) -> bool {
        self != LoopState::Off
    }

    /// Lowercase name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            LoopState::Off => "off",
            LoopState::Ready => "ready",
            LoopState::Active => "active",
            LoopState::Running => "running",
            LoopState::Interactive => "interactive",
        }
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
