//! # Error types surfaced by tasks, runners, and network sources.
//!
//! A single enum, [`TaskError`], travels along task chains the way an
//! exception would: a stage that returns `Err` aborts the stages after it,
//! and the error propagates up the context stack until an `intercept`
//! combinator catches it or the `run()` awaiter receives it.
//!
//! [`ErrorKind`] is the coarse classification used by intercept handlers to
//! decide whether they handle a given error. `as_label()` provides short
//! stable labels for logs and metrics.

use thiserror::Error;

/// Coarse classification of a [`TaskError`].
///
/// This is the match key for `intercept` handlers: a handler registered for
/// `ErrorKind::Connection` catches every `TaskError::Connection`, regardless
/// of the underlying OS error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// An OS-level socket call failed.
    Socket,
    /// A non-blocking connect did not succeed (timeout, reject).
    Connection,
    /// The runner required to execute work has been released.
    RunnerGone,
    /// Operation not permitted in the current state.
    InvalidState,
    /// A write is already in flight.
    Busy,
    /// Application-level task failure.
    Failed,
}

/// Errors produced by task execution and by the network sources.
///
/// The first five variants are raised by the library itself; [`Failed`] is
/// the variant application callables return for their own failures.
///
/// [`Failed`]: TaskError::Failed
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// An OS-level socket call failed.
    #[error("socket operation failed: {source}")]
    Socket {
        #[source]
        source: std::io::Error,
    },

    /// A non-blocking connect did not complete (timeout, reject).
    #[error("connect did not complete: {source}")]
    Connection {
        #[source]
        source: std::io::Error,
    },

    /// The runner hosting the work has been dropped; the work was discarded.
    #[error("runner is no longer available")]
    RunnerGone,

    /// The operation is not permitted in the current stream state
    /// (e.g. `write` while not connected).
    #[error("operation '{op}' not permitted in current state")]
    InvalidState {
        /// Name of the rejected operation.
        op: &'static str,
    },

    /// A write is already in flight; at most one write may be outstanding.
    #[error("resource busy: a write is already in flight")]
    Busy,

    /// Application-level failure raised by a task callable.
    #[error("{reason}")]
    Failed { reason: String },
}

impl TaskError {
    /// Returns the coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TaskError::Socket { .. } => ErrorKind::Socket,
            TaskError::Connection { .. } => ErrorKind::Connection,
            TaskError::RunnerGone => ErrorKind::RunnerGone,
            TaskError::InvalidState { .. } => ErrorKind::InvalidState,
            TaskError::Busy => ErrorKind::Busy,
            TaskError::Failed { .. } => ErrorKind::Failed,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Socket { .. } => "socket_failure",
            TaskError::Connection { .. } => "connection_failure",
            TaskError::RunnerGone => "runner_not_available",
            TaskError::InvalidState { .. } => "invalid_state",
            TaskError::Busy => "resource_busy",
            TaskError::Failed { .. } => "task_failed",
        }
    }

    /// Indicates whether the error originated in the network layer.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            TaskError::Socket { .. } | TaskError::Connection { .. }
        )
    }

    /// Convenience constructor for application-level failures.
    ///
    /// ## Example
    /// ```
    /// use taskline::TaskError;
    ///
    /// let e = TaskError::failed("parse error");
    /// assert_eq!(e.as_label(), "task_failed");
    /// ```
    pub fn failed(reason: impl Into<String>) -> Self {
        TaskError::Failed {
            reason: reason.into(),
        }
    }

    /// Wraps an I/O error from a socket call.
    pub fn socket(source: std::io::Error) -> Self {
        TaskError::Socket { source }
    }

    /// Wraps an I/O error from a failed connect.
    pub fn connection(source: std::io::Error) -> Self {
        TaskError::Connection { source }
    }
}
