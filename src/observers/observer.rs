//! # Observer: user-facing event handlers
//!
//! The [`Observer`] trait is the main **extension point** for watching the
//! runtime. All [`Event`]s published by the scheduler and the network
//! sources flow through a [`Bus`]; [`spawn_observer`] pumps a bus
//! subscription into an observer.
//!
//! Implementing your own observer allows you to plug in:
//! - metrics export;
//! - custom monitoring or alerting pipelines;
//! - structured logging.
//!
//! ```text
//! Event flow:
//!   scheduler / TcpServer / TcpStream ── publish(Event) ──► Bus
//!                                                            └─► Observer::on_event(&Event)
//! ```
//!
//! # Example: custom observer
//! ```no_run
//! use taskline::{Bus, Event, EventKind, Observer};
//! use async_trait::async_trait;
//!
//! struct MetricsObserver;
//!
//! #[async_trait]
//! impl Observer for MetricsObserver {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::RunFailed {
//!             println!("[metrics] run failed: {:?}", event.error);
//!         }
//!     }
//! }
//!
//! # fn demo() {
//! let bus = Bus::new(1024);
//! taskline::spawn_observer(&bus, MetricsObserver);
//! # }
//! ```

use async_trait::async_trait;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::events::{Bus, Event};

/// Trait for receiving runtime events from the bus.
///
/// Observers are called for every published [`Event`]. Slow observers lag
/// behind the bus ring buffer and skip the oldest events rather than block
/// publishers.
#[async_trait]
pub trait Observer: Send + Sync + 'static {
    /// Called for every emitted [`Event`].
    async fn on_event(&self, event: &Event);
}

/// Spawns a worker that forwards every event from `bus` to `observer`.
///
/// The worker exits when the bus is dropped. Lagged receivers resubscribe to
/// the stream at the current position (skipped events are lost).
pub fn spawn_observer(bus: &Bus, observer: impl Observer) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => observer.on_event(&ev).await,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    })
}
