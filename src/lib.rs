//! # taskline
//!
//! **Taskline** is a small asynchronous task and I/O library: strongly-typed
//! units of work composed into pipelines, scheduled onto named execution
//! contexts ("runners") that guarantee serial execution, and TCP event
//! sources whose callbacks are delivered through the same runner
//! discipline.
//!
//! ## Features
//!
//! | Area            | Description                                                        | Key types / functions                       |
//! |-----------------|--------------------------------------------------------------------|---------------------------------------------|
//! | **Runners**     | Named serial execution contexts; FIFO, no overlap.                 | [`Runner`], [`RunnerRef`]                   |
//! | **Tasks**       | Typed descriptors of work; composed, then `run()`.                 | [`Task`]                                    |
//! | **Composition** | Sequential, parallel, conditional, repeat, intercept.              | [`Task::then`], [`parallel3`], [`if_then_else`], [`repeat`], [`intercept`] |
//! | **Networking**  | TCP server and stream as runner-bound event sources.               | [`TcpServer`], [`TcpStream`]                |
//! | **Errors**      | One error enum rides task chains like an exception.                | [`TaskError`], [`ErrorKind`]                |
//! | **Events**      | Broadcast bus of run/network lifecycle events.                     | [`Bus`], [`Event`], [`Observer`]            |
//! | **Config**      | Centralized settings for buses, buffers, backlog.                  | [`Config`]                                  |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] observer
//!   _(demo/reference only)_.
//!
//! ```
//! use taskline::{Runner, Task, TaskError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), TaskError> {
//!     let compute = Runner::new("compute");
//!     let render = Runner::new("render");
//!
//!     // Each stage runs on its own runner; the result type threads through.
//!     let inc = Task::simple(&compute, "inc", |x: i32| Ok(x + 1));
//!     let show = Task::simple(&render, "show", |x: i32| Ok(format!("result: {x}")));
//!
//!     let pipeline = inc.then(show);
//!     assert_eq!(pipeline.run(41).await?, "result: 42");
//!     Ok(())
//! }
//! ```
//!
//! ---

mod config;
mod error;
mod events;
mod net;
mod observers;
mod runtime;
mod tasks;

// ---- Public re-exports ----

pub use config::Config;
pub use error::{ErrorKind, TaskError};
pub use events::{Bus, Event, EventKind};
pub use net::{Accept, StreamCallback, StreamEvent, StreamState, TcpServer, TcpStream};
pub use observers::{spawn_observer, Observer};
pub use runtime::{Runner, RunnerRef};
pub use tasks::{
    if_then, if_then_else, intercept, parallel2, parallel3, parallel4, repeat, Handler, Task,
};

// Optional: expose a simple built-in logger observer (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use observers::LogWriter;
