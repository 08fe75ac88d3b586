//! # Surface contract.
//!
//! A [`Surface`] is anything that can be drawn on and closed: a window, an
//! offscreen target, a test double. The scheduling core only needs the hooks
//! below; rendering, input and toolkit integration live behind them.
//!
//! ```text
//!  DrawScheduler tick ──► process_events().await ──► request_draw()
//!                                                          │
//!        surface draws, then calls DrawScheduler::on_draw_done()   (or on_cancel_draw())
//! ```
//!
//! ## Rules
//! - `close()` is a request; `is_closed()` reports the outcome. Calling `close()`
//!   twice must be harmless.
//! - `notify_closed()` is called exactly once, by the first group sweep that
//!   sees the surface closed.
//! - `request_draw()` must not block; the draw happens later.

use async_trait::async_trait;

/// Hooks a drawable surface exposes to the scheduling core.
#[async_trait(?Send)]
pub trait Surface {
    /// Name for logs.
    fn name(&self) -> &str {
        "surface"
    }

    /// Processes pending input/resize events. Awaited once per scheduler tick,
    /// before the draw decision.
    async fn process_events(&self);

    /// Asks the surface to draw a frame.
    ///
    /// The surface reports completion by calling
    /// [`DrawScheduler::on_draw_done`](crate::DrawScheduler::on_draw_done) or
    /// [`DrawScheduler::on_cancel_draw`](crate::DrawScheduler::on_cancel_draw).
    fn request_draw(&self);

    /// `true` once the surface is closed.
    fn is_closed(&self) -> bool;

    /// Requests the surface to close.
    fn close(&self);

    /// Lets toolkit-backed surfaces pump their GUI. Called by housekeeping.
    fn poll_gui(&self) {}

    /// Called once, when a group sweep finalizes the closed surface.
    fn notify_closed(&self) {}
}
