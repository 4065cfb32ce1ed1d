//! The bridge facade.
//!
//! [`AppServerBridge`] owns one `codex app-server` child and speaks
//! newline-delimited JSON-RPC with it:
//!
//! ```text
//! send_request ──register──▶ ResponseRouter ◀──resolve/reject── stdout reader
//!      │                                                            ▲
//!      └──queue──▶ writer task ──▶ child stdin      child stdout ───┘
//! ```
//!
//! The bridge is a cheap clonable handle. Dropping the last handle tears the
//! transport down as if `dispose()` had been called.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::actor::{
    InboundHandler, OutboundMessage, ResponseRouter, WriterContext, spawn_stderr_reader,
    spawn_stdout_reader, spawn_writer_task,
};
use super::events::{BridgeEvent, EventEmitter};
use super::readiness::ReadyGate;
use super::supervisor::{SpawnedChild, spawn_app_server, spawn_exit_watcher};
use crate::config::{BridgeOptions, LogDirection};
use crate::error::{BridgeError, BridgeResult, LockResultExt};
use crate::protocol::app_server::{
    AddConversationListenerParams, AddConversationListenerResult, InitializeParams,
    NewConversationParams, RemoveConversationListenerParams, SendUserMessageParams, methods,
};
use crate::protocol::{ErrorResponse, Notification, Request, RequestId, Response, ResponseError};

/// Where the write path stands.
enum TransportState {
    /// `start()` not called yet.
    NotStarted,
    /// Child spawned; sends go to the writer queue.
    Running(mpsc::UnboundedSender<OutboundMessage>),
    /// `start()` was called but the child could not be spawned.
    Failed,
    /// `dispose()` was called. Terminal.
    Disposed,
}

struct Inner {
    options: BridgeOptions,
    state: std::sync::Mutex<TransportState>,
    started: AtomicBool,
    next_id: AtomicI64,
    router: Arc<ResponseRouter>,
    events: EventEmitter,
    ready: ReadyGate,
    /// Stops every background task and terminates the child.
    cancel_token: CancellationToken,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// JSON-RPC bridge to a `codex app-server` child process.
#[derive(Clone)]
pub struct AppServerBridge {
    inner: Arc<Inner>,
}

impl AppServerBridge {
    /// Create a bridge. Nothing is spawned until [`start`](Self::start).
    pub fn new(options: BridgeOptions) -> Self {
        let events = EventEmitter::new(options.event_capacity);
        Self {
            inner: Arc::new(Inner {
                options,
                state: std::sync::Mutex::new(TransportState::NotStarted),
                started: AtomicBool::new(false),
                next_id: AtomicI64::new(1),
                router: Arc::new(ResponseRouter::new()),
                events,
                ready: ReadyGate::new(),
                cancel_token: CancellationToken::new(),
            }),
        }
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.inner.options
    }

    /// Subscribe to bridge events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.inner.events.subscribe()
    }

    /// Spawn the app server and wire up its pipes.
    ///
    /// A spawn failure is reported as an `error` event, not returned: the
    /// bridge then stays started but every write fails with
    /// `TransportNotReady`. With `auto_initialize`, this also sends
    /// `initialize` and waits for the reply.
    pub async fn start(&self) -> BridgeResult<()> {
        let spawned = self.spawn_transport()?;

        if spawned && self.inner.options.auto_initialize {
            self.initialize(InitializeParams::default()).await?;
        }
        Ok(())
    }

    /// Returns whether the child was spawned.
    fn spawn_transport(&self) -> BridgeResult<bool> {
        let inner = &self.inner;
        let mut state = inner.state.lock().recover_poison("AppServerBridge::start");
        match *state {
            TransportState::NotStarted => {}
            TransportState::Disposed => return Err(BridgeError::Disposed),
            TransportState::Running(_) | TransportState::Failed => {
                return Err(BridgeError::AlreadyStarted);
            }
        }
        inner.started.store(true, Ordering::SeqCst);

        let SpawnedChild {
            child,
            stdin,
            stdout,
            stderr,
        } = match spawn_app_server(&inner.options) {
            Ok(spawned) => spawned,
            Err(e) => {
                *state = TransportState::Failed;
                drop(state);
                log::error!(
                    target: "app_server_bridge::bridge::supervisor",
                    "{}",
                    e
                );
                inner.events.emit_error(e);
                return Ok(false);
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        spawn_writer_task(
            stdin,
            rx,
            WriterContext {
                router: Arc::clone(&inner.router),
                events: inner.events.clone(),
                reject_on_write_failure: inner.options.reject_on_write_failure,
                cancel_token: inner.cancel_token.clone(),
            },
        );
        *state = TransportState::Running(tx);

        // Ready goes out before any line the readers could emit
        inner.ready.fire();
        inner.events.emit(BridgeEvent::Ready);

        spawn_stdout_reader(
            stdout,
            InboundHandler {
                router: Arc::clone(&inner.router),
                events: inner.events.clone(),
                logger: Arc::clone(&inner.options.logger),
            },
            inner.cancel_token.clone(),
        );
        spawn_stderr_reader(
            stderr,
            Arc::clone(&inner.options.logger),
            inner.cancel_token.clone(),
        );
        spawn_exit_watcher(child, inner.cancel_token.clone(), inner.events.clone());

        Ok(true)
    }

    /// Wait until the child has been spawned. Returns immediately if it was.
    ///
    /// Never returns if the spawn failed or `start()` is never called.
    pub async fn wait_until_ready(&self) {
        self.inner.ready.wait().await
    }

    /// Tear down: reject every pending request, close stdin and terminate
    /// the child. Idempotent, and safe on a bridge that never started.
    pub fn dispose(&self) {
        let previous = {
            let mut state = self.inner.state.lock().recover_poison("AppServerBridge::dispose");
            std::mem::replace(&mut *state, TransportState::Disposed)
        };
        if matches!(previous, TransportState::Disposed) {
            return;
        }
        // Dropping `previous` closes the writer queue.
        drop(previous);

        let rejected = self.inner.router.reject_all(&ErrorResponse::disposed());
        self.inner.cancel_token.cancel();
        log::info!(
            target: "app_server_bridge::bridge::supervisor",
            "Bridge disposed, rejected {} pending request(s)",
            rejected
        );
    }

    /// Send a request and wait for the peer's reply.
    ///
    /// Resolves with the matching response; a matching error response (or
    /// disposal) yields [`BridgeError::Rejected`].
    pub async fn send_request(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
    ) -> BridgeResult<Response> {
        self.ensure_running()?;
        self.inner.ready.wait().await;

        let id = RequestId::from(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        let payload = serde_json::to_string(&Request {
            id: id.clone(),
            method: method.into(),
            params,
        })?;

        let rx = {
            let state = self.inner.state.lock().recover_poison("AppServerBridge::send_request");
            let TransportState::Running(tx) = &*state else {
                return Err(BridgeError::TransportNotReady);
            };
            // Registered under the state lock so dispose() cannot miss it
            let rx = self.inner.router.register(id.clone())?;
            let queued = tx.send(OutboundMessage::Request {
                payload: payload.clone(),
                request_id: id.clone(),
            });
            if queued.is_err() {
                self.inner.router.remove(&id);
                return Err(BridgeError::TransportNotReady);
            }
            rx
        };
        self.log_outbound(&payload);

        match rx.await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(error)) => Err(BridgeError::Rejected(error)),
            Err(_) => Err(BridgeError::Abandoned(id)),
        }
    }

    /// Send a notification. Does not wait for the write to complete.
    pub fn send_notification(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
    ) -> BridgeResult<()> {
        let payload = serde_json::to_string(&Notification {
            method: method.into(),
            params,
        })?;
        self.enqueue(payload)
    }

    /// Answer a request the app server sent us.
    pub fn send_response(&self, id: RequestId, result: Value) -> BridgeResult<()> {
        let payload = serde_json::to_string(&Response { id, result })?;
        self.enqueue(payload)
    }

    /// Reject a request the app server sent us.
    pub fn send_error(&self, id: RequestId, error: ResponseError) -> BridgeResult<()> {
        let payload = serde_json::to_string(&ErrorResponse { id, error })?;
        self.enqueue(payload)
    }

    /// Wait until everything queued so far has been written to stdin.
    ///
    /// Fails with `TransportNotReady` if the writer stopped first.
    pub async fn flush(&self) -> BridgeResult<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        {
            let state = self.inner.state.lock().recover_poison("AppServerBridge::flush");
            let TransportState::Running(tx) = &*state else {
                return Err(BridgeError::TransportNotReady);
            };
            tx.send(OutboundMessage::Flush(ack_tx))
                .map_err(|_| BridgeError::TransportNotReady)?;
        }
        ack_rx.await.map_err(|_| BridgeError::TransportNotReady)
    }

    fn ensure_running(&self) -> BridgeResult<()> {
        let state = self.inner.state.lock().recover_poison("AppServerBridge::ensure_running");
        match &*state {
            TransportState::Running(tx) if !tx.is_closed() => Ok(()),
            _ => Err(BridgeError::TransportNotReady),
        }
    }

    fn enqueue(&self, payload: String) -> BridgeResult<()> {
        {
            let state = self.inner.state.lock().recover_poison("AppServerBridge::enqueue");
            let TransportState::Running(tx) = &*state else {
                return Err(BridgeError::TransportNotReady);
            };
            tx.send(OutboundMessage::Notification(payload.clone()))
                .map_err(|_| BridgeError::TransportNotReady)?;
        }
        self.log_outbound(&payload);
        Ok(())
    }

    fn log_outbound(&self, payload: &str) {
        (self.inner.options.logger)(LogDirection::Outbound, payload);
    }

    async fn call<P, R>(&self, method: &str, params: &P) -> BridgeResult<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let params = serde_json::to_value(params)?;
        let response = self.send_request(method, Some(params)).await?;
        Ok(serde_json::from_value(response.result)?)
    }

    pub async fn initialize(&self, params: InitializeParams) -> BridgeResult<Response> {
        self.send_request(methods::INITIALIZE, Some(serde_json::to_value(params)?))
            .await
    }

    pub async fn new_conversation(&self, params: NewConversationParams) -> BridgeResult<Response> {
        self.send_request(methods::NEW_CONVERSATION, Some(serde_json::to_value(params)?))
            .await
    }

    pub async fn send_user_message(&self, params: SendUserMessageParams) -> BridgeResult<Response> {
        self.send_request(methods::SEND_USER_MESSAGE, Some(serde_json::to_value(params)?))
            .await
    }

    /// Subscribe to a conversation's events; they arrive as notifications.
    pub async fn add_conversation_listener(
        &self,
        params: AddConversationListenerParams,
    ) -> BridgeResult<AddConversationListenerResult> {
        self.call(methods::ADD_CONVERSATION_LISTENER, &params).await
    }

    pub async fn remove_conversation_listener(
        &self,
        params: RemoveConversationListenerParams,
    ) -> BridgeResult<Response> {
        self.send_request(
            methods::REMOVE_CONVERSATION_LISTENER,
            Some(serde_json::to_value(params)?),
        )
        .await
    }

    /// Whether `start()` has been called, successfully spawned or not.
    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
    }

    pub fn pending_count(&self) -> usize {
        self.inner.router.pending_count()
    }
}

impl std::fmt::Debug for AppServerBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppServerBridge")
            .field("codex_bin", &self.inner.options.codex_bin)
            .field("started", &self.is_started())
            .field("ready", &self.inner.ready.is_fired())
            .field("pending", &self.pending_count())
            .finish()
    }
}
