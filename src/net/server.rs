//! # TcpServer: listening socket with an accept event source.
//!
//! Binds a stream socket with `SO_REUSEADDR`, listens, and delivers every
//! accepted connection to the [`Accept`] callback **on the server's
//! runner**.
//!
//! ## Lifecycle
//! ```text
//! bind() ── suspended ──start()──► accepting ──stop()──► suspended
//!                │                     │
//!                └────── shutdown() ───┴──► cancelled (socket released)
//! ```
//!
//! A server is constructed suspended; `start()` arms the accept source.
//! While suspended, inbound connections queue in the listen backlog.
//! `shutdown()` (or dropping the server) cancels the source and releases
//! the listening socket; it is idempotent.

use std::net::{IpAddr, SocketAddr};
use std::sync::Weak;

use tokio::net::{TcpListener, TcpSocket};

use crate::config::Config;
use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::net::callbacks::Accept;
use crate::net::source::{dispatch, SourceGate, SourceWatch};
use crate::runtime::{Runner, RunnerRef};

/// Listening socket plus its accept event source.
pub struct TcpServer {
    gate: SourceGate,
    local_addr: SocketAddr,
}

impl TcpServer {
    /// Binds with default [`Config`] (backlog 10).
    pub fn bind(
        runner: &Runner,
        addr: IpAddr,
        port: u16,
        callback: Weak<dyn Accept>,
    ) -> Result<Self, TaskError> {
        Self::bind_with(&Config::default(), runner, addr, port, callback)
    }

    /// Binds a listening socket and spawns its accept watcher, initially
    /// suspended.
    ///
    /// The socket family follows `addr`; an IPv6 socket is not forced into
    /// dual-stack mode. Any failure closes whatever was opened so far and
    /// leaves no registration behind.
    pub fn bind_with(
        cfg: &Config,
        runner: &Runner,
        addr: IpAddr,
        port: u16,
        callback: Weak<dyn Accept>,
    ) -> Result<Self, TaskError> {
        let socket = match addr {
            IpAddr::V4(_) => TcpSocket::new_v4(),
            IpAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(TaskError::socket)?;

        socket.set_reuseaddr(true).map_err(TaskError::socket)?;
        socket
            .bind(SocketAddr::new(addr, port))
            .map_err(TaskError::socket)?;
        let listener = socket.listen(cfg.backlog).map_err(TaskError::socket)?;
        let local_addr = listener.local_addr().map_err(TaskError::socket)?;

        let gate = SourceGate::new(false);
        let watch = gate.watch();
        tokio::spawn(accept_loop(
            listener,
            watch,
            runner.downgrade(),
            runner.bus().cloned(),
            callback,
        ));

        Ok(Self { gate, local_addr })
    }

    /// The bound address; useful after binding port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Arms the accept source.
    pub fn start(&self) {
        self.gate.resume();
    }

    /// Suspends the accept source; pending connections stay in the listen
    /// backlog.
    pub fn stop(&self) {
        self.gate.suspend();
    }

    /// Cancels the accept source and releases the listening socket.
    /// Idempotent.
    pub fn shutdown(&self) {
        self.gate.cancel();
    }
}

impl Drop for TcpServer {
    fn drop(&mut self) {
        self.gate.cancel();
    }
}

/// Accept watcher: owns the listener; exits on cancel or when the runner
/// dies, releasing the socket either way.
async fn accept_loop(
    listener: TcpListener,
    mut watch: SourceWatch,
    runner: RunnerRef,
    bus: Option<Bus>,
    callback: Weak<dyn Accept>,
) {
    let name = match listener.local_addr() {
        Ok(addr) => addr.to_string(),
        Err(_) => "server".to_string(),
    };
    let cancel = watch.token();

    loop {
        if !watch.armed().await {
            break;
        }

        let accepted = tokio::select! {
            _ = cancel.cancelled() => break,
            _ = watch.suspended() => continue,
            accepted = listener.accept() => accepted,
        };

        let (conn, peer) = match accepted {
            Ok(pair) => pair,
            // Transient accept failures (e.g. the peer resetting between
            // readiness and accept) do not take the server down.
            Err(_) => continue,
        };

        if let Some(bus) = &bus {
            bus.publish(
                Event::now(EventKind::ConnAccepted)
                    .with_name(&name)
                    .with_peer(peer),
            );
        }

        let cb = callback.clone();
        let delivered = dispatch(&runner, move || async move {
            match cb.upgrade() {
                Some(cb) => cb.on_connect(conn, peer).await,
                // Dead callback: the connection was still accepted (to
                // drain readiness) and is closed right here by the drop.
                None => drop(conn),
            }
        })
        .await;

        if delivered.is_err() {
            // Runner gone; nothing can consume connections any more.
            break;
        }
    }
}
