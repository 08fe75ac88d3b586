//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! observe loops, canvas groups and draw schedulers from the outside.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `EventLoop` (state, stop, interrupts, task failures),
//!   `CanvasGroup` (registration, close finalization), `DrawScheduler` (frame stats).
//! - **Consumers**: anything holding a receiver from [`EventLoop::bus`](crate::EventLoop::bus).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
