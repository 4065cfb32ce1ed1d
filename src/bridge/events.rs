//! Event stream published by the bridge.
//!
//! Every bridge owns one broadcast channel. Observers call
//! [`AppServerBridge::subscribe`](crate::AppServerBridge::subscribe) and see
//! every event emitted after they subscribed, in emission order.

use std::process::ExitStatus;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::BridgeError;
use crate::protocol::Message;

/// Default number of undelivered events kept per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Something observable happened on the bridge.
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    /// The child process exists and accepts writes. Emitted once.
    Ready,
    /// A stdout line was classified. `raw` is the decoded value as received.
    Message { message: Message, raw: Value },
    /// A stdout line, verbatim, before classification.
    Raw(String),
    /// The child process exited. Terminal.
    Exit(ExitInfo),
    /// A transport or framing fault. The bridge keeps running.
    Error(Arc<BridgeError>),
}

impl BridgeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BridgeEvent::Ready => "ready",
            BridgeEvent::Message { .. } => "message",
            BridgeEvent::Raw(_) => "raw",
            BridgeEvent::Exit(_) => "exit",
            BridgeEvent::Error(_) => "error",
        }
    }
}

/// How the child process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code, absent when the process was killed by a signal.
    pub code: Option<i32>,
    /// Name of the terminating signal (e.g. `SIGTERM`), if any.
    pub signal: Option<String>,
}

impl ExitInfo {
    pub(crate) fn from_status(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            signal: exit_signal(&status),
        }
    }
}

#[cfg(unix)]
fn exit_signal(status: &ExitStatus) -> Option<String> {
    use nix::sys::signal::Signal;
    use std::os::unix::process::ExitStatusExt;

    status.signal().map(|raw| {
        Signal::try_from(raw)
            .map(|signal| signal.as_str().to_string())
            .unwrap_or_else(|_| raw.to_string())
    })
}

#[cfg(not(unix))]
fn exit_signal(_status: &ExitStatus) -> Option<String> {
    None
}

/// Sending half of the event stream, shared by the bridge's tasks.
#[derive(Debug, Clone)]
pub(crate) struct EventEmitter {
    tx: broadcast::Sender<BridgeEvent>,
}

impl EventEmitter {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub(crate) fn emit(&self, event: BridgeEvent) {
        let _ = self.tx.send(event);
    }

    pub(crate) fn emit_error(&self, error: BridgeError) {
        log::debug!(
            target: "app_server_bridge::bridge::events",
            "Emitting error event: {}",
            error
        );
        self.emit(BridgeEvent::Error(Arc::new(error)));
    }
}
