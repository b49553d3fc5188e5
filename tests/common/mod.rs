//! Shared probes for the network tests.

#![allow(dead_code)]

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use taskline::{StreamCallback, StreamEvent, TaskError};

pub const WAIT: Duration = Duration::from_secs(5);

/// Client-side callback that forwards everything into channels the test
/// body can await on.
pub struct ClientProbe {
    reads: mpsc::UnboundedSender<Vec<u8>>,
    writes: mpsc::UnboundedSender<usize>,
    events: mpsc::UnboundedSender<(StreamEvent, Option<TaskError>)>,
}

pub struct ProbeRx {
    /// Keeps the callback alive for as long as the test listens.
    pub probe: Arc<ClientProbe>,
    pub reads: mpsc::UnboundedReceiver<Vec<u8>>,
    pub writes: mpsc::UnboundedReceiver<usize>,
    pub events: mpsc::UnboundedReceiver<(StreamEvent, Option<TaskError>)>,
}

/// Builds a probe; the `Weak` goes to the stream factory, the receivers
/// hold the callback alive.
pub fn probe() -> (Weak<dyn StreamCallback>, ProbeRx) {
    let (reads_tx, reads) = mpsc::unbounded_channel();
    let (writes_tx, writes) = mpsc::unbounded_channel();
    let (events_tx, events) = mpsc::unbounded_channel();

    let probe = Arc::new(ClientProbe {
        reads: reads_tx,
        writes: writes_tx,
        events: events_tx,
    });
    let weak: Weak<dyn StreamCallback> = Arc::downgrade(&(probe.clone() as Arc<dyn StreamCallback>));

    (
        weak,
        ProbeRx {
            probe,
            reads,
            writes,
            events,
        },
    )
}

#[async_trait]
impl StreamCallback for ClientProbe {
    async fn on_read(&self, buf: &mut Vec<u8>, n: usize) {
        let _ = self.reads.send(buf[..n].to_vec());
    }

    async fn on_write(&self, data: Vec<u8>) {
        let _ = self.writes.send(data.len());
    }

    async fn on_event(&self, event: StreamEvent, error: Option<TaskError>) {
        let _ = self.events.send((event, error));
    }
}
