//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`] so the scheduler and the network
//! sources can broadcast [`Event`]s to any number of subscribers.
//!
//! ## Key characteristics:
//! - **Broadcast semantics**: every active subscriber receives a clone of
//!   each event
//! - **Non-persistent**: events published with no subscriber are dropped
//! - **Bounded capacity**: slow subscribers lag and skip the oldest events

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events.
#[derive(Clone)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given ring-buffer capacity.
    ///
    /// The capacity is clamped to a minimum of 1; a zero-capacity broadcast
    /// channel is not constructible.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active subscribers.
    ///
    /// If there are no active subscribers the event is dropped silently;
    /// the library operates without observers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a new subscriber that will receive all future events.
    ///
    /// Each call creates an independent receiver; multiple subscribers can
    /// exist simultaneously, each receiving a clone of every event.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
