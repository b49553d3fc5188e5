use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::observers::Observer;

/// Base observer that logs events to stdout.
///
/// Enabled via the `logging` feature. Useful for demos and debugging.
pub struct LogWriter;

#[async_trait]
impl Observer for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::RunStarted => {
                println!("[run-started] task={:?}", e.name);
            }
            EventKind::RunCompleted => {
                println!("[run-completed] task={:?}", e.name);
            }
            EventKind::RunFailed => {
                println!("[run-failed] task={:?} err={:?}", e.name, e.error);
            }
            EventKind::ConnAccepted => {
                println!("[accepted] server={:?} peer={:?}", e.name, e.peer);
            }
            EventKind::StreamConnected => {
                println!("[connected] stream={:?} peer={:?}", e.name, e.peer);
            }
            EventKind::StreamDisconnected => {
                println!("[disconnected] stream={:?}", e.name);
            }
            EventKind::StreamFailed => {
                println!("[stream-failed] stream={:?} err={:?}", e.name, e.error);
            }
            EventKind::WriteCompleted => {
                println!("[write-completed] stream={:?} bytes={:?}", e.name, e.bytes);
            }
        }
    }
}
