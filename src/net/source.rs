//! # Event-source executor binding.
//!
//! A runner doubles as the dispatch queue of the readiness sources it
//! hosts: every callback a source delivers is posted to the runner, so
//! handler code sees the same serial-execution guarantees as task
//! callables.
//!
//! [`SourceGate`] carries the lifecycle of one source (armed/suspended and
//! cancelled-for-good), while [`dispatch`] ships one callback to the runner
//! and waits for it to finish, which keeps a source from outpacing its own
//! handlers.
//!
//! ## Rules
//! - `resume`/`suspend` are cheap flags; a suspended source keeps its
//!   socket, it just stops observing readiness.
//! - `cancel` is terminal and idempotent; the watcher task drops the
//!   socket half it owns on the way out, which is what releases handles
//!   exactly once.

use std::future::Future;

use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::runtime::RunnerRef;

/// Arming and cancellation state of one readiness source.
pub(crate) struct SourceGate {
    armed: watch::Sender<bool>,
    cancel: CancellationToken,
}

impl SourceGate {
    pub(crate) fn new(armed: bool) -> Self {
        let (tx, _rx) = watch::channel(armed);
        Self {
            armed: tx,
            cancel: CancellationToken::new(),
        }
    }

    /// Arms the source; its watcher resumes observing readiness.
    pub(crate) fn resume(&self) {
        let _ = self.armed.send(true);
    }

    /// Suspends the source; readiness stops being observed, the socket
    /// stays open.
    pub(crate) fn suspend(&self) {
        let _ = self.armed.send(false);
    }

    /// Cancels the source for good. Idempotent.
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The view a watcher task waits on.
    pub(crate) fn watch(&self) -> SourceWatch {
        SourceWatch {
            armed: self.armed.subscribe(),
            cancel: self.cancel.clone(),
        }
    }
}

/// Watcher-side view of a [`SourceGate`].
pub(crate) struct SourceWatch {
    armed: watch::Receiver<bool>,
    cancel: CancellationToken,
}

impl SourceWatch {
    /// Waits until the source is armed; returns `false` once cancelled.
    pub(crate) async fn armed(&mut self) -> bool {
        loop {
            if self.cancel.is_cancelled() {
                return false;
            }
            if *self.armed.borrow_and_update() {
                return true;
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                changed = self.armed.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
            }
        }
    }

    /// Waits until the source is suspended; lets a watcher abandon a
    /// readiness wait the moment `stop()` lands.
    pub(crate) async fn suspended(&mut self) {
        loop {
            if !*self.armed.borrow_and_update() {
                return;
            }
            if self.armed.changed().await.is_err() {
                // Gate dropped; cancellation is observed separately.
                return;
            }
        }
    }

    /// Clone of the cancellation token, for use alongside the `&mut self`
    /// waits in one `select!`.
    pub(crate) fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Runs `callback` on the source's runner and waits for it to finish,
/// returning its output.
///
/// Fails with [`TaskError::RunnerGone`] when the runner has been released
/// (or dies mid-delivery); the caller is expected to tear the source down.
pub(crate) async fn dispatch<F, Fut, T>(runner: &RunnerRef, callback: F) -> Result<T, TaskError>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    runner.post(async move {
        let _ = tx.send(callback().await);
    })?;
    rx.await.map_err(|_| TaskError::RunnerGone)
}
