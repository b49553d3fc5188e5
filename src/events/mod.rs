//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to events emitted by the scheduler and by the network
//! sources.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: the scheduler (run lifecycle), `TcpServer` (accepts),
//!   `TcpStream` (connect/disconnect/write completion).
//! - **Consumers**: observers attached via
//!   [`spawn_observer`](crate::observers::spawn_observer), or any code
//!   holding a [`Bus::subscribe`] receiver.
//!
//! A bus is attached to a runner with [`Runner::with_bus`]; components
//! publish through the bus of the runner that hosts them. Delivery is
//! fire-and-forget: with no active subscriber, events are dropped.
//!
//! [`Runner::with_bus`]: crate::Runner::with_bus

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
