//! Frame pacing.
//!
//! - [`UpdateMode`] the four draw policies
//! - [`DrawScheduler`] per-surface tick loop with draw-completion back-pressure
//! - [`FrameTiming`] rolling frame statistics reported once per window

mod draw;
mod mode;
mod stats;

pub use draw::DrawScheduler;
pub use mode::UpdateMode;
pub use stats::FrameTiming;
