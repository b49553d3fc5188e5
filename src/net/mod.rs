//! Network event sources: TCP server and stream.
//!
//! ## Files & responsibilities
//! - **source.rs**: the event-source/executor binding: arming state and
//!   cancellation for a readiness source, plus the dispatch helper that
//!   runs source callbacks on the owning runner.
//! - **server.rs**: [`TcpServer`] - listening socket whose accepted
//!   connections are handed to an [`Accept`] callback on the runner.
//! - **stream.rs**: [`TcpStream`] - connecting/connected socket with paired
//!   read and write sources and the full disconnect state machine.
//! - **callbacks.rs**: the [`Accept`] and [`StreamCallback`] traits and the
//!   [`StreamEvent`] kinds.
//!
//! ## Rules
//! - Every callback runs on the source's runner, serialised with the
//!   runner's task work; handler code never races itself.
//! - Callbacks are held by `Weak`: a dropped callback never keeps I/O
//!   alive, and a dead server callback still accepts (to drain readiness)
//!   and immediately closes the connection.
//! - Construction failures return `Err` and leave no partial registration;
//!   lifecycle failures surface as `on_event(FailureDetected, _)` and drive
//!   the stream to `disconnected`.

mod callbacks;
mod server;
mod source;
mod stream;

pub use callbacks::{Accept, StreamCallback, StreamEvent};
pub use server::TcpServer;
pub use stream::{StreamState, TcpStream};
