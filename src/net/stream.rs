//! # TcpStream: connecting/connected socket with paired event sources.
//!
//! ## State machine
//! ```text
//! disconnected ──connect()──► connecting ──connect resolves──► connected
//!                                  │                               │
//!                                  │──connect fails──► disconnected│
//!                                  │──disconnect()──► disconnected │
//!                                                                  │
//!            connected ──peer EOF (read 0)──► disconnecting ──► disconnected
//!            connected ──disconnect()/shutdown()──► disconnecting ──► disconnected
//! ```
//!
//! Transitions are driven by application calls (`connect`, `write`,
//! `disconnect`, `shutdown`, `start`, `stop`), by readiness events from the
//! paired read/write sources, and by source teardown.
//!
//! ## Rules
//! - The non-blocking connect is resolved entirely by the socket layer
//!   (`TcpSocket::connect`); its outcome is the single source of truth for
//!   connect completion, and a failure surfaces as
//!   `on_event(FailureDetected, Connection)`.
//! - At most one write is outstanding; the busy flag is taken with a
//!   compare-and-set, and contending writers receive `resource_busy`.
//!   A partial write never tears the stream down.
//! - Teardown is guarded by a state compare-and-exchange so that
//!   concurrent peer-EOF and local disconnect nominate exactly one winner;
//!   the winner delivers the `Disconnected` event exactly once.
//! - `write()` and `disconnect()` may be invoked from arbitrary threads;
//!   state and the busy flag are atomics for exactly that reason. The
//!   callbacks themselves are serialised on the stream's runner.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpSocket;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::net::callbacks::{StreamCallback, StreamEvent};
use crate::net::source::{dispatch, SourceGate};
use crate::runtime::{Runner, RunnerRef};

/// Stream lifecycle state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Disconnecting = 3,
}

impl StreamState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => StreamState::Connecting,
            2 => StreamState::Connected,
            3 => StreamState::Disconnecting,
            _ => StreamState::Disconnected,
        }
    }
}

/// An in-flight write.
struct Pending {
    data: Vec<u8>,
    pos: usize,
}

struct StreamInner {
    runner: RunnerRef,
    bus: Option<Bus>,
    name: String,
    callback: Weak<dyn StreamCallback>,
    state: AtomicU8,
    /// At most one outstanding write.
    wr_busy: AtomicBool,
    pending: Mutex<Option<Pending>>,
    wr_wake: Notify,
    /// Read source: armed/suspended by `start`/`stop`, cancelled on teardown.
    read_gate: SourceGate,
    /// Write source (also covers the connect in flight).
    write_cancel: CancellationToken,
    /// Fallback size for replacement read buffers.
    default_buf: usize,
}

/// A bidirectional, non-blocking TCP stream bound to a runner.
///
/// Created either by [`TcpStream::connect`] (outbound) or by
/// [`TcpStream::adopt`] (a connection accepted by a
/// [`TcpServer`](crate::net::TcpServer)). Dropping the stream tears it
/// down.
pub struct TcpStream {
    inner: Arc<StreamInner>,
}

impl TcpStream {
    /// Connects with default [`Config`].
    pub fn connect(
        runner: &Runner,
        addr: IpAddr,
        port: u16,
        callback: Weak<dyn StreamCallback>,
        buf: Option<Vec<u8>>,
    ) -> Result<Self, TaskError> {
        Self::connect_with(&Config::default(), runner, addr, port, callback, buf)
    }

    /// Opens a socket of the family matching `addr` and starts a
    /// non-blocking connect.
    ///
    /// Returns immediately in the `connecting` state; completion is
    /// reported through `on_event` (`Connected`, or `FailureDetected` with
    /// a `Connection` error). `buf` is the read buffer; pass `None` to
    /// let the stream own one of `cfg.read_buffer` bytes.
    pub fn connect_with(
        cfg: &Config,
        runner: &Runner,
        addr: IpAddr,
        port: u16,
        callback: Weak<dyn StreamCallback>,
        buf: Option<Vec<u8>>,
    ) -> Result<Self, TaskError> {
        let socket = match addr {
            IpAddr::V4(_) => TcpSocket::new_v4(),
            IpAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(TaskError::socket)?;

        let remote = SocketAddr::new(addr, port);
        let inner = Arc::new(StreamInner::new(
            cfg,
            runner,
            remote.to_string(),
            callback,
            StreamState::Connecting,
        ));

        let buf = read_buffer(cfg, buf);
        tokio::spawn(connect_driver(socket, remote, Arc::clone(&inner), buf));

        Ok(Self { inner })
    }

    /// Adopts an accepted connection with default [`Config`].
    pub fn adopt(
        runner: &Runner,
        conn: tokio::net::TcpStream,
        callback: Weak<dyn StreamCallback>,
        buf: Option<Vec<u8>>,
    ) -> Result<Self, TaskError> {
        Self::adopt_with(&Config::default(), runner, conn, callback, buf)
    }

    /// Wraps a connection accepted by a server.
    ///
    /// The stream starts in the `connected` state with its read source
    /// armed; no `Connected` event is delivered.
    pub fn adopt_with(
        cfg: &Config,
        runner: &Runner,
        conn: tokio::net::TcpStream,
        callback: Weak<dyn StreamCallback>,
        buf: Option<Vec<u8>>,
    ) -> Result<Self, TaskError> {
        let name = conn
            .peer_addr()
            .map(|a| a.to_string())
            .map_err(TaskError::socket)?;

        let inner = Arc::new(StreamInner::new(
            cfg,
            runner,
            name,
            callback,
            StreamState::Connected,
        ));

        let (rd, wr) = conn.into_split();
        inner.spawn_reader(rd, read_buffer(cfg, buf));
        inner.spawn_writer(wr);

        Ok(Self { inner })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StreamState {
        self.inner.state()
    }

    /// Resumes the read source of a connected stream; no-op otherwise.
    pub fn start(&self) {
        if self.inner.state() == StreamState::Connected {
            self.inner.read_gate.resume();
        }
    }

    /// Suspends the read source of a connected stream; no-op otherwise.
    pub fn stop(&self) {
        if self.inner.state() == StreamState::Connected {
            self.inner.read_gate.suspend();
        }
    }

    /// Submits a write.
    ///
    /// Requires the `connected` state and no outstanding write: contending
    /// writers receive [`TaskError::Busy`], a disconnected stream
    /// [`TaskError::InvalidState`]. Completion is reported through
    /// `on_write`, which hands the buffer back.
    pub fn write(&self, data: Vec<u8>) -> Result<(), TaskError> {
        let inner = &self.inner;
        if inner.state() != StreamState::Connected {
            return Err(TaskError::InvalidState { op: "write" });
        }
        if inner
            .wr_busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(TaskError::Busy);
        }

        *lock(&inner.pending) = Some(Pending { data, pos: 0 });
        inner.wr_wake.notify_one();
        Ok(())
    }

    /// Disconnects and releases both event sources.
    ///
    /// Idempotent and race-free against peer EOF: exactly one teardown
    /// wins, handles and buffers are released exactly once. Cancelling a
    /// pending connect is silent; tearing down a connected stream delivers
    /// one `Disconnected` event.
    pub fn disconnect(&self) {
        self.inner.disconnect();
    }

    /// Tears the stream down for good; alias of [`TcpStream::disconnect`]
    /// kept for symmetry with the server surface.
    pub fn shutdown(&self) {
        self.inner.disconnect();
    }
}

impl Drop for TcpStream {
    fn drop(&mut self) {
        self.inner.disconnect();
    }
}

impl std::fmt::Debug for TcpStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpStream")
            .field("peer", &self.inner.name)
            .field("state", &self.inner.state())
            .finish()
    }
}

impl StreamInner {
    fn new(
        cfg: &Config,
        runner: &Runner,
        name: String,
        callback: Weak<dyn StreamCallback>,
        state: StreamState,
    ) -> Self {
        Self {
            runner: runner.downgrade(),
            bus: runner.bus().cloned(),
            name,
            callback,
            state: AtomicU8::new(state as u8),
            wr_busy: AtomicBool::new(false),
            pending: Mutex::new(None),
            wr_wake: Notify::new(),
            read_gate: SourceGate::new(true),
            write_cancel: CancellationToken::new(),
            default_buf: cfg.read_buffer_clamped(),
        }
    }

    fn state(&self) -> StreamState {
        StreamState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, from: StreamState, to: StreamState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Releases both sources and drops any in-flight write. Only the
    /// caller that won the state race gets here.
    fn release_sources(&self) {
        self.read_gate.cancel();
        self.write_cancel.cancel();
        *lock(&self.pending) = None;
        self.wr_busy.store(false, Ordering::Release);
    }

    /// Local disconnect; see [`TcpStream::disconnect`].
    fn disconnect(&self) {
        if self.transition(StreamState::Connected, StreamState::Disconnecting) {
            self.release_sources();
            self.state
                .store(StreamState::Disconnected as u8, Ordering::Release);
            self.publish(Event::now(EventKind::StreamDisconnected).with_name(&self.name));
            self.post_event(StreamEvent::Disconnected, None);
        } else if self.transition(StreamState::Connecting, StreamState::Disconnected) {
            // Pending connect: the driver observes the cancel and drops
            // the socket; nothing was ever delivered, nothing is now.
            self.release_sources();
        }
        // Disconnecting/disconnected: someone else is (or was) handling it.
    }

    /// Peer closed the connection (read readiness with zero bytes).
    fn peer_eof(&self) {
        if !self.transition(StreamState::Connected, StreamState::Disconnecting) {
            return;
        }
        self.release_sources();
        self.state
            .store(StreamState::Disconnected as u8, Ordering::Release);
        self.publish(Event::now(EventKind::StreamDisconnected).with_name(&self.name));
        self.post_event(StreamEvent::Disconnected, None);
    }

    /// Asynchronous socket failure on a connected stream.
    fn failure(&self, source: std::io::Error) {
        if !self.transition(StreamState::Connected, StreamState::Disconnecting) {
            return;
        }
        self.release_sources();
        self.state
            .store(StreamState::Disconnected as u8, Ordering::Release);
        self.publish(
            Event::now(EventKind::StreamFailed)
                .with_name(&self.name)
                .with_error(source.to_string()),
        );
        self.post_event(StreamEvent::FailureDetected, Some(TaskError::socket(source)));
    }

    /// Quiet teardown for a stream whose runner died: there is no queue
    /// left to deliver events on.
    fn teardown_silent(&self) {
        if self.transition(StreamState::Connected, StreamState::Disconnecting) {
            self.release_sources();
            self.state
                .store(StreamState::Disconnected as u8, Ordering::Release);
        }
    }

    /// Fire-and-forget event delivery on the stream's runner. Errors from
    /// the handler (and a dead runner) are swallowed; event delivery never
    /// disturbs the state machine.
    fn post_event(&self, event: StreamEvent, error: Option<TaskError>) {
        let cb = self.callback.clone();
        let _ = self.runner.post(async move {
            if let Some(cb) = cb.upgrade() {
                cb.on_event(event, error).await;
            }
        });
    }

    fn publish(&self, ev: Event) {
        if let Some(bus) = &self.bus {
            bus.publish(ev);
        }
    }

    /// Read watcher: owns the read half and the read buffer.
    fn spawn_reader(self: &Arc<Self>, rd: OwnedReadHalf, mut buf: Vec<u8>) {
        let inner = Arc::clone(self);
        let mut watch = inner.read_gate.watch();
        tokio::spawn(async move {
            let cancel = watch.token();
            loop {
                if !watch.armed().await {
                    break;
                }

                let readable = tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = watch.suspended() => continue,
                    r = rd.readable() => r,
                };
                if let Err(e) = readable {
                    inner.failure(e);
                    break;
                }

                match rd.try_read(&mut buf) {
                    // Zero readiness bytes: the peer disconnected.
                    Ok(0) => {
                        inner.peer_eof();
                        break;
                    }
                    Ok(n) => {
                        let cb = inner.callback.clone();
                        let moved = std::mem::take(&mut buf);
                        let delivered = dispatch(&inner.runner, move || async move {
                            let mut b = moved;
                            if let Some(cb) = cb.upgrade() {
                                cb.on_read(&mut b, n).await;
                            }
                            b
                        })
                        .await;

                        match delivered {
                            Ok(returned) => {
                                buf = returned;
                                // A zero-length window would read as EOF.
                                if buf.is_empty() {
                                    buf = vec![0; inner.default_buf];
                                }
                            }
                            Err(_) => {
                                inner.teardown_silent();
                                break;
                            }
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
                    Err(e) => {
                        inner.failure(e);
                        break;
                    }
                }
            }
            // rd drops here; the socket closes once the writer lets go too.
        });
    }

    /// Write watcher: owns the write half; drives one pending write at a
    /// time to completion.
    fn spawn_writer(self: &Arc<Self>, wr: OwnedWriteHalf) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            'idle: loop {
                tokio::select! {
                    _ = inner.write_cancel.cancelled() => break,
                    _ = inner.wr_wake.notified() => {}
                }

                loop {
                    let writable = tokio::select! {
                        _ = inner.write_cancel.cancelled() => break 'idle,
                        r = wr.writable() => r,
                    };
                    if let Err(e) = writable {
                        inner.wr_busy.store(false, Ordering::Release);
                        inner.failure(e);
                        break 'idle;
                    }

                    match inner.write_step(&wr) {
                        WriteStep::Idle => continue 'idle,
                        WriteStep::Progress => continue,
                        WriteStep::Done(data) => {
                            inner.wr_busy.store(false, Ordering::Release);
                            inner.publish(
                                Event::now(EventKind::WriteCompleted)
                                    .with_name(&inner.name)
                                    .with_bytes(data.len()),
                            );
                            let cb = inner.callback.clone();
                            let _ = inner.runner.post(async move {
                                if let Some(cb) = cb.upgrade() {
                                    cb.on_write(data).await;
                                }
                            });
                            continue 'idle;
                        }
                        WriteStep::Failed(e) => {
                            inner.wr_busy.store(false, Ordering::Release);
                            inner.failure(e);
                            break 'idle;
                        }
                    }
                }
            }
            // wr drops here, releasing its half of the socket.
        });
    }

    /// One writability turn: write as much as possible, advance the
    /// offset. A short write leaves the source armed and the stream
    /// intact.
    fn write_step(&self, wr: &OwnedWriteHalf) -> WriteStep {
        let mut guard = lock(&self.pending);
        let Some(p) = guard.as_mut() else {
            return WriteStep::Idle;
        };
        match wr.try_write(&p.data[p.pos..]) {
            Ok(n) => {
                p.pos += n;
                if p.pos >= p.data.len() {
                    match guard.take() {
                        Some(done) => WriteStep::Done(done.data),
                        None => WriteStep::Idle,
                    }
                } else {
                    WriteStep::Progress
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => WriteStep::Progress,
            Err(e) => {
                guard.take();
                WriteStep::Failed(e)
            }
        }
    }
}

enum WriteStep {
    /// Nothing pending (spurious wake or teardown took the buffer).
    Idle,
    /// Partial write; keep observing writability.
    Progress,
    /// Write ran to completion; the buffer goes back to the callback.
    Done(Vec<u8>),
    Failed(std::io::Error),
}

/// Caller-supplied buffer or a library-owned one of the configured size.
fn read_buffer(cfg: &Config, buf: Option<Vec<u8>>) -> Vec<u8> {
    match buf {
        Some(b) if !b.is_empty() => b,
        _ => vec![0; cfg.read_buffer_clamped()],
    }
}

/// Connect driver: resolves the non-blocking connect, then brings up both
/// sources. Aborted by local disconnect; a dead runner at completion time
/// tears everything down without leaking the socket.
async fn connect_driver(
    socket: TcpSocket,
    remote: SocketAddr,
    inner: Arc<StreamInner>,
    buf: Vec<u8>,
) {
    let result = tokio::select! {
        // disconnect() during connecting; the socket drops unconnected.
        _ = inner.write_cancel.cancelled() => return,
        result = socket.connect(remote) => result,
    };

    match result {
        Ok(conn) => {
            if !inner.transition(StreamState::Connecting, StreamState::Connected) {
                // Torn down while resolving; drop the fresh connection.
                return;
            }
            if inner.runner.upgrade().is_none() {
                inner.teardown_silent();
                return;
            }
            let (rd, wr) = conn.into_split();
            inner.spawn_reader(rd, buf);
            inner.spawn_writer(wr);
            inner.publish(
                Event::now(EventKind::StreamConnected)
                    .with_name(&inner.name)
                    .with_peer(remote),
            );
            inner.post_event(StreamEvent::Connected, None);
        }
        Err(e) => {
            if inner.transition(StreamState::Connecting, StreamState::Disconnected) {
                inner.publish(
                    Event::now(EventKind::StreamFailed)
                        .with_name(&inner.name)
                        .with_error(e.to_string()),
                );
                inner.post_event(StreamEvent::FailureDetected, Some(TaskError::connection(e)));
            }
        }
    }
}

/// Poison-tolerant lock: a panicking callback must not wedge teardown.
fn lock(m: &Mutex<Option<Pending>>) -> MutexGuard<'_, Option<Pending>> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
