//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`]. Publishing never
//! blocks and does not need a running runtime, so the loop can publish from the
//! built-in executor as well as from tokio-driven tasks. Receivers can live on any
//! thread.
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` calls `broadcast::Sender::send` and returns.
//! - **Bounded capacity**: slow receivers get `RecvError::Lagged(n)` and skip `n` items.
//! - **No persistence**: events are lost if there are no receivers at send time.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events.
///
/// Cheap to clone (internally holds an `Arc`-backed sender).
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers.
    ///
    /// Without receivers the event is dropped.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver that observes subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[test]
    fn publish_without_receivers_is_silent() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::StopRequested));
    }

    #[test]
    fn receivers_see_later_events_only() {
        let bus = Bus::new(4);
        bus.publish(Event::new(EventKind::StopRequested));
        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::InterruptReceived));
        let ev = rx.try_recv().expect("event");
        assert_eq!(ev.kind, EventKind::InterruptReceived);
        assert!(rx.try_recv().is_err());
    }
}
