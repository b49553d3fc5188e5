//! Server/stream integration: echo roundtrip, peer EOF, write discipline,
//! accepted-handle ownership.

mod common;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::time::timeout;

use common::{probe, WAIT};
use taskline::{
    Accept, ErrorKind, Runner, StreamCallback, StreamEvent, StreamState, TcpServer, TcpStream,
};

/// Server side of the echo: every read is written straight back.
struct EchoSession {
    stream: Mutex<Option<TcpStream>>,
}

#[async_trait]
impl StreamCallback for EchoSession {
    async fn on_read(&self, buf: &mut Vec<u8>, n: usize) {
        let data = buf[..n].to_vec();
        if let Some(stream) = self.stream.lock().unwrap().as_ref() {
            let _ = stream.write(data);
        }
    }
}

/// Adopts every accepted connection into an echoing stream.
struct EchoAcceptor {
    runner: Runner,
    sessions: Mutex<Vec<Arc<EchoSession>>>,
}

impl EchoAcceptor {
    fn new(runner: Runner) -> Arc<Self> {
        Arc::new(Self {
            runner,
            sessions: Mutex::new(Vec::new()),
        })
    }

    /// Drops every adopted stream; their teardown closes the sockets.
    fn close_sessions(&self) {
        self.sessions.lock().unwrap().clear();
    }
}

#[async_trait]
impl Accept for EchoAcceptor {
    async fn on_connect(&self, conn: tokio::net::TcpStream, _peer: SocketAddr) {
        let session = Arc::new(EchoSession {
            stream: Mutex::new(None),
        });
        let weak: Weak<dyn StreamCallback> =
            Arc::downgrade(&(session.clone() as Arc<dyn StreamCallback>));
        if let Ok(stream) = TcpStream::adopt(&self.runner, conn, weak, None) {
            *session.stream.lock().unwrap() = Some(stream);
            self.sessions.lock().unwrap().push(session);
        }
    }
}

fn echo_server(runner: &Runner) -> (TcpServer, Arc<EchoAcceptor>) {
    let acceptor = EchoAcceptor::new(runner.clone());
    let weak: Weak<dyn Accept> = Arc::downgrade(&(acceptor.clone() as Arc<dyn Accept>));
    let server = TcpServer::bind(runner, IpAddr::V4(Ipv4Addr::LOCALHOST), 0, weak).unwrap();
    server.start();
    (server, acceptor)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn tcp_echo_roundtrip() {
    let server_runner = Runner::new("server");
    let client_runner = Runner::new("client");
    let (server, _acceptor) = echo_server(&server_runner);
    let addr = server.local_addr();

    let (weak, mut rx) = probe();
    let client =
        TcpStream::connect(&client_runner, addr.ip(), addr.port(), weak, None).unwrap();

    let (event, error) = timeout(WAIT, rx.events.recv()).await.unwrap().unwrap();
    assert_eq!(event, StreamEvent::Connected);
    assert!(error.is_none());
    assert_eq!(client.state(), StreamState::Connected);

    client.write(b"hello".to_vec()).unwrap();

    let echoed = timeout(WAIT, rx.reads.recv()).await.unwrap().unwrap();
    assert_eq!(echoed, b"hello");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn peer_eof_disconnects_exactly_once() {
    let server_runner = Runner::new("server");
    let client_runner = Runner::new("client");
    let (server, acceptor) = echo_server(&server_runner);
    let addr = server.local_addr();

    let (weak, mut rx) = probe();
    let client =
        TcpStream::connect(&client_runner, addr.ip(), addr.port(), weak, None).unwrap();

    let (event, _) = timeout(WAIT, rx.events.recv()).await.unwrap().unwrap();
    assert_eq!(event, StreamEvent::Connected);

    // Server side hangs up.
    acceptor.close_sessions();

    let (event, error) = timeout(WAIT, rx.events.recv()).await.unwrap().unwrap();
    assert_eq!(event, StreamEvent::Disconnected);
    assert!(error.is_none());

    // Exactly once: nothing further arrives.
    assert!(
        timeout(Duration::from_millis(300), rx.events.recv())
            .await
            .is_err()
    );

    // Writes on the dead stream are rejected in the current state.
    let err = client.write(b"late".to_vec()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn second_write_while_busy_is_rejected() {
    const PAYLOAD: usize = 8 * 1024 * 1024;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let drained = tokio::spawn(async move {
        let (mut peer, _) = listener.accept().await.unwrap();
        let mut total = 0usize;
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            match peer.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => total += n,
            }
        }
        total
    });

    let runner = Runner::new("client");
    let (weak, mut rx) = probe();
    let client = TcpStream::connect(&runner, addr.ip(), addr.port(), weak, None).unwrap();

    let (event, _) = timeout(WAIT, rx.events.recv()).await.unwrap().unwrap();
    assert_eq!(event, StreamEvent::Connected);

    client.write(vec![42u8; PAYLOAD]).unwrap();

    // The first write cannot fit the socket buffer; a contender is
    // rejected while it is in flight.
    let err = client.write(vec![1]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Busy);

    // The first write still runs to completion and reports back.
    let written = timeout(WAIT, rx.writes.recv()).await.unwrap().unwrap();
    assert_eq!(written, PAYLOAD);

    client.disconnect();
    let total = timeout(WAIT, drained).await.unwrap().unwrap();
    assert_eq!(total, PAYLOAD);
}

/// Acceptor that keeps nothing: dropping the connection is the rejection.
struct RejectAcceptor {
    rejected: AtomicUsize,
}

#[async_trait]
impl Accept for RejectAcceptor {
    async fn on_connect(&self, conn: tokio::net::TcpStream, _peer: SocketAddr) {
        self.rejected.fetch_add(1, Ordering::SeqCst);
        drop(conn);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rejected_connection_closes_in_the_same_dispatch_turn() {
    let runner = Runner::new("server");
    let acceptor = Arc::new(RejectAcceptor {
        rejected: AtomicUsize::new(0),
    });
    let weak: Weak<dyn Accept> = Arc::downgrade(&(acceptor.clone() as Arc<dyn Accept>));
    let server = TcpServer::bind(&runner, IpAddr::V4(Ipv4Addr::LOCALHOST), 0, weak).unwrap();
    server.start();

    let mut raw = tokio::net::TcpStream::connect(server.local_addr())
        .await
        .unwrap();

    // The rejection closes the socket; the peer observes EOF promptly.
    let mut buf = [0u8; 1];
    let n = timeout(WAIT, raw.read(&mut buf)).await.unwrap().unwrap();
    assert_eq!(n, 0);
    assert_eq!(acceptor.rejected.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dead_callback_still_accepts_and_closes() {
    let runner = Runner::new("server");
    let acceptor = Arc::new(RejectAcceptor {
        rejected: AtomicUsize::new(0),
    });
    let weak: Weak<dyn Accept> = Arc::downgrade(&(acceptor.clone() as Arc<dyn Accept>));
    let server = TcpServer::bind(&runner, IpAddr::V4(Ipv4Addr::LOCALHOST), 0, weak).unwrap();
    server.start();
    drop(acceptor);

    let mut raw = tokio::net::TcpStream::connect(server.local_addr())
        .await
        .unwrap();

    let mut buf = [0u8; 1];
    let n = timeout(WAIT, raw.read(&mut buf)).await.unwrap().unwrap();
    assert_eq!(n, 0);
}
