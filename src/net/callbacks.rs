//! # Callback traits for the network sources.
//!
//! Both traits are implemented by the application and handed to the
//! factories as `Weak` references: the callback owner controls its own
//! lifetime, and a dropped callback never keeps a socket alive.
//!
//! All callbacks run on the source's runner. A panicking callback is
//! contained by the runner's worker; it cannot terminate the runner or
//! corrupt source state.

use std::net::SocketAddr;

use async_trait::async_trait;

use crate::error::TaskError;

/// Server-side accept callback.
#[async_trait]
pub trait Accept: Send + Sync + 'static {
    /// Called once per accepted connection, with the connection and its
    /// peer address.
    ///
    /// Ownership of `conn` is the adoption protocol: dropping it closes
    /// the handle within the same dispatch turn, while storing it
    /// (typically by adopting it into a
    /// [`TcpStream`](crate::net::TcpStream)) keeps it alive.
    async fn on_connect(&self, conn: tokio::net::TcpStream, peer: SocketAddr);
}

/// Stream lifecycle notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEvent {
    /// The non-blocking connect completed.
    Connected,
    /// The stream reached the disconnected state (peer EOF or local
    /// disconnect). Delivered exactly once per connected lifetime.
    Disconnected,
    /// An asynchronous failure was detected; the error rides along.
    FailureDetected,
}

/// Stream-side callbacks: data delivery and lifecycle events.
///
/// All methods default to no-ops so implementors override only what they
/// need.
#[async_trait]
pub trait StreamCallback: Send + Sync + 'static {
    /// Called with the read buffer and the number of bytes just read
    /// (`&buf[..n]`).
    ///
    /// The callback may replace the vector wholesale; the replacement
    /// becomes the stream's read buffer and its length the new read
    /// window, and the old buffer is released.
    async fn on_read(&self, buf: &mut Vec<u8>, n: usize) {
        let _ = (buf, n);
    }

    /// Called when an in-flight write has been written out completely; the
    /// buffer is handed back.
    async fn on_write(&self, data: Vec<u8>) {
        let _ = data;
    }

    /// Called on lifecycle transitions; `error` is set for
    /// [`StreamEvent::FailureDetected`].
    async fn on_event(&self, event: StreamEvent, error: Option<TaskError>) {
        let _ = (event, error);
    }
}
