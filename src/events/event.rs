//! # Runtime events emitted by the scheduler and network sources.
//!
//! [`EventKind`] classifies events across two categories:
//! - **Run lifecycle**: a `run()` call started, completed, or failed
//! - **Network lifecycle**: connections accepted, streams connected or torn
//!   down, writes completed
//!
//! The [`Event`] struct carries metadata such as timestamps, the name of the
//! task or source involved, error labels, byte counts, and peer addresses.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically, so events can be ordered correctly even when observed
//! through independent async channels.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Run lifecycle events ===
    /// A `run()` call submitted its root frame to a runner.
    RunStarted,
    /// A run delivered its final result to the awaiter.
    RunCompleted,
    /// A run delivered an error to the awaiter.
    RunFailed,

    // === Network lifecycle events ===
    /// A server accepted an inbound connection.
    ConnAccepted,
    /// A stream finished its non-blocking connect.
    StreamConnected,
    /// A stream reached the disconnected state.
    StreamDisconnected,
    /// A stream detected an asynchronous failure.
    StreamFailed,
    /// An in-flight write ran to completion.
    WriteCompleted,
}

/// Runtime event with optional metadata.
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp (may go backwards, use for logging only).
    pub at: SystemTime,
    /// The kind of event.
    pub kind: EventKind,
    /// Name of the task or source involved, if applicable.
    pub name: Option<String>,
    /// Error message, if the event represents a failure.
    pub error: Option<String>,
    /// Byte count (reads/writes), if relevant.
    pub bytes: Option<usize>,
    /// Peer address, for network events.
    pub peer: Option<SocketAddr>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// the next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            name: None,
            error: None,
            bytes: None,
            peer: None,
        }
    }

    /// Attaches a task or source name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attaches an error message.
    pub fn with_error(mut self, msg: impl Into<String>) -> Self {
        self.error = Some(msg.into());
        self
    }

    /// Attaches a byte count.
    pub fn with_bytes(mut self, n: usize) -> Self {
        self.bytes = Some(n);
        self
    }

    /// Attaches a peer address.
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }
}
