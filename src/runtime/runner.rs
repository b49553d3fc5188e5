//! # Runner: a named, strictly serial execution context.
//!
//! A [`Runner`] owns a FIFO work queue drained by a single spawned worker.
//! Jobs posted with [`Runner::post`] execute one at a time, in submission
//! order, with no two jobs overlapping; this is the serial-execution
//! guarantee every frame entry point and event-source callback relies on.
//!
//! ## Lifecycle
//! - Created by the application, cheaply cloneable (shared handle).
//! - Frames and event sources hold a [`RunnerRef`] (weak). When the last
//!   strong handle is dropped, the worker stops and **pending jobs are
//!   discarded**; posting through a dead weak handle fails with
//!   [`TaskError::RunnerGone`].
//!
//! ## Rules
//! - Jobs must not block arbitrarily; they are expected to return quickly.
//!   A long computation stalls every job queued behind it.
//! - A panicking job is isolated: the worker survives and continues with
//!   the next job.

use std::borrow::Cow;
use std::sync::{Arc, Weak};

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::events::Bus;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Shared state behind a [`Runner`] handle.
///
/// Dropping the last strong reference cancels the worker; queued jobs are
/// discarded rather than drained.
struct RunnerCore {
    name: Cow<'static, str>,
    tx: mpsc::UnboundedSender<Job>,
    cancel: CancellationToken,
    bus: Option<Bus>,
}

impl Drop for RunnerCore {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// A named serial execution context.
///
/// Cloning produces another strong handle to the same runner. See the
/// module docs for lifecycle rules.
///
/// ## Example
/// ```
/// use taskline::Runner;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let runner = Runner::new("worker");
///     runner.post(async { /* runs on the worker, alone */ }).unwrap();
/// }
/// ```
#[derive(Clone)]
pub struct Runner {
    core: Arc<RunnerCore>,
}

impl Runner {
    /// Creates a runner and spawns its worker on the current Tokio runtime.
    ///
    /// Must be called from within a Tokio runtime context.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self::build(name.into(), None)
    }

    /// Creates a runner that publishes runtime events to `bus`.
    ///
    /// The scheduler and any network source hosted on this runner publish
    /// their lifecycle events through this bus.
    pub fn with_bus(name: impl Into<Cow<'static, str>>, bus: Bus) -> Self {
        Self::build(name.into(), Some(bus))
    }

    fn build(name: Cow<'static, str>, bus: Option<Bus>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let cancel = CancellationToken::new();

        let worker_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = worker_cancel.cancelled() => break,
                    job = rx.recv() => match job {
                        // A panicking job must not take the queue down with it.
                        Some(job) => {
                            let _ = AssertUnwindSafe(job).catch_unwind().await;
                        }
                        None => break,
                    },
                }
            }
        });

        Self {
            core: Arc::new(RunnerCore {
                name,
                tx,
                cancel,
                bus,
            }),
        }
    }

    /// Returns the runner's human-readable name.
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Returns the event bus attached to this runner, if any.
    pub fn bus(&self) -> Option<&Bus> {
        self.core.bus.as_ref()
    }

    /// Enqueues a job; the runner executes jobs in the order posted, with
    /// no two jobs overlapping.
    ///
    /// Fails with [`TaskError::RunnerGone`] when the runner has already been
    /// released. A job accepted just before release may still be discarded
    /// without running.
    pub fn post<F>(&self, job: F) -> Result<(), TaskError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.core.cancel.is_cancelled() {
            return Err(TaskError::RunnerGone);
        }
        self.core
            .tx
            .send(Box::pin(job))
            .map_err(|_| TaskError::RunnerGone)
    }

    /// Returns a weak handle suitable for storing in frames and sources.
    pub fn downgrade(&self) -> RunnerRef {
        RunnerRef {
            core: Arc::downgrade(&self.core),
        }
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner").field("name", &self.core.name).finish()
    }
}

/// Weak identity of a [`Runner`].
///
/// Held by frames and event sources so that a dropped runner does not keep
/// scheduled work or I/O alive.
#[derive(Clone)]
pub struct RunnerRef {
    core: Weak<RunnerCore>,
}

impl RunnerRef {
    /// Attempts to recover a strong handle.
    pub fn upgrade(&self) -> Option<Runner> {
        self.core.upgrade().map(|core| Runner { core })
    }

    /// Posts through the weak handle.
    ///
    /// Fails with [`TaskError::RunnerGone`] when the runner has been
    /// released.
    pub fn post<F>(&self, job: F) -> Result<(), TaskError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.upgrade().ok_or(TaskError::RunnerGone)?.post(job)
    }
}

impl std::fmt::Debug for RunnerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.upgrade() {
            Some(r) => f.debug_struct("RunnerRef").field("name", &r.name()).finish(),
            None => f.write_str("RunnerRef(<gone>)"),
        }
    }
}
