//! Teardown discipline: idempotence, disconnect races, runner loss,
//! flow control.

mod common;

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::time::{sleep, timeout};

use common::{probe, WAIT};
use taskline::{ErrorKind, Runner, StreamEvent, StreamState, TcpStream};

/// Binds a throwaway listener and connects a library stream to it,
/// returning the accepted peer socket alongside.
async fn connected_pair(
    runner: &Runner,
) -> (TcpStream, tokio::net::TcpStream, common::ProbeRx) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (weak, mut rx) = probe();
    let client = TcpStream::connect(runner, addr.ip(), addr.port(), weak, None).unwrap();
    let (peer, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();

    let (event, _) = timeout(WAIT, rx.events.recv()).await.unwrap().unwrap();
    assert_eq!(event, StreamEvent::Connected);

    (client, peer, rx)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn repeated_teardown_is_idempotent() {
    let runner = Runner::new("client");
    let (client, _peer, mut rx) = connected_pair(&runner).await;

    client.disconnect();
    client.disconnect();
    client.shutdown();

    let (event, _) = timeout(WAIT, rx.events.recv()).await.unwrap().unwrap();
    assert_eq!(event, StreamEvent::Disconnected);
    assert!(
        timeout(Duration::from_millis(300), rx.events.recv())
            .await
            .is_err()
    );
    assert_eq!(client.state(), StreamState::Disconnected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_peer_eof_and_local_disconnect_deliver_once() {
    let runner = Runner::new("client");

    for _ in 0..10 {
        let (client, peer, mut rx) = connected_pair(&runner).await;

        // Race the peer hangup against the local teardown.
        let hangup = tokio::spawn(async move { drop(peer) });
        client.disconnect();
        hangup.await.unwrap();

        let mut disconnects = 0;
        while let Ok(Some((event, _))) =
            timeout(Duration::from_millis(200), rx.events.recv()).await
        {
            if event == StreamEvent::Disconnected {
                disconnects += 1;
            }
        }
        assert_eq!(disconnects, 1);
        assert_eq!(client.state(), StreamState::Disconnected);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn runner_loss_while_connecting_settles_cleanly() {
    // The listener never accepts; the connect resolves against the backlog
    // while the runner is being torn down.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let runner = Runner::new("doomed");
    let (weak, mut rx) = probe();
    let client = TcpStream::connect(&runner, addr.ip(), addr.port(), weak, None).unwrap();
    drop(runner);

    // Give the connect time to resolve whichever way the race went, then
    // settle the stream locally.
    sleep(Duration::from_millis(200)).await;
    client.disconnect();
    assert_eq!(client.state(), StreamState::Disconnected);

    // At most a Connected that won the race with the runner teardown ever
    // arrives; never a Disconnected once the queue is gone.
    while let Ok(Some((event, _))) = timeout(Duration::from_millis(200), rx.events.recv()).await {
        assert_eq!(event, StreamEvent::Connected);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn write_requires_connected_state() {
    let runner = Runner::new("client");
    let (weak, _rx) = probe();

    // A blackhole address: the connect does not resolve promptly, and the
    // stream is not connected either way.
    let client = TcpStream::connect(&runner, "10.255.255.1".parse().unwrap(), 9, weak, None)
        .unwrap();

    let err = client.write(b"early".to_vec()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stop_and_start_gate_the_read_source() {
    let runner = Runner::new("client");
    let (client, mut peer, mut rx) = connected_pair(&runner).await;

    client.stop();
    // Let the read watcher observe the suspension before data arrives.
    sleep(Duration::from_millis(100)).await;

    peer.write_all(b"delayed").await.unwrap();
    sleep(Duration::from_millis(300)).await;
    assert!(rx.reads.try_recv().is_err());

    client.start();
    let data = timeout(WAIT, rx.reads.recv()).await.unwrap().unwrap();
    assert_eq!(data, b"delayed");
}
