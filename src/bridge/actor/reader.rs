//! Reader tasks for the app server's stdout and stderr.
//!
//! Stdout lines go through the full inbound pipeline:
//! `raw` event → inbound log → decode → `message` event → settle pending.
//! Stderr lines are only handed to the logger.
//!
//! Both tasks run until EOF, a read error, or cancellation. Lines are handled
//! strictly in arrival order; a bad line produces one `error` event and the
//! reader carries on with the next one.

use std::sync::Arc;

use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;

use super::{LineCodec, ResponseRouter};
use crate::bridge::events::{BridgeEvent, EventEmitter};
use crate::config::{LogDirection, Logger};
use crate::protocol::{Message, decode_line};

/// Processes decoded stdout lines, one at a time.
pub(crate) struct InboundHandler {
    pub(crate) router: Arc<ResponseRouter>,
    pub(crate) events: EventEmitter,
    pub(crate) logger: Logger,
}

impl InboundHandler {
    pub(crate) fn handle_line(&self, line: String) {
        self.events.emit(BridgeEvent::Raw(line.clone()));
        (self.logger)(LogDirection::Inbound, &line);

        let (message, raw) = match decode_line(&line) {
            Ok(decoded) => decoded,
            Err(e) => {
                self.events.emit_error(e);
                return;
            }
        };

        // Observers see the reply before its waiter is woken
        self.events.emit(BridgeEvent::Message {
            message: message.clone(),
            raw,
        });

        match message {
            Message::Response(response) => {
                self.router.resolve(response);
            }
            Message::Error(error) => {
                self.router.reject(error);
            }
            Message::Request(request) => {
                log::debug!(
                    target: "app_server_bridge::bridge::reader",
                    "Peer request {} ({}) awaiting a response from the host",
                    request.id,
                    request.method
                );
            }
            Message::Notification(notification) => {
                log::trace!(
                    target: "app_server_bridge::bridge::reader",
                    "Received notification: {}",
                    notification.method
                );
            }
        }
    }
}

/// Spawn the stdout reader.
pub(crate) fn spawn_stdout_reader<R>(
    stdout: R,
    handler: InboundHandler,
    cancel_token: CancellationToken,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        read_lines(stdout, "stdout", cancel_token, |line| handler.handle_line(line)).await;
    })
}

/// Spawn the stderr reader. Lines never reach the classifier.
pub(crate) fn spawn_stderr_reader<R>(
    stderr: R,
    logger: Logger,
    cancel_token: CancellationToken,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        read_lines(stderr, "stderr", cancel_token, |line| {
            logger(LogDirection::Stderr, &line)
        })
        .await;
    })
}

async fn read_lines<R, F>(reader: R, stream: &str, cancel_token: CancellationToken, mut on_line: F)
where
    R: AsyncRead + Unpin,
    F: FnMut(String),
{
    let mut lines = FramedRead::new(reader, LineCodec::new());
    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log::debug!(
                    target: "app_server_bridge::bridge::reader",
                    "{} reader cancelled, shutting down",
                    stream
                );
                break;
            }
            next = lines.next() => match next {
                Some(Ok(line)) => on_line(line),
                Some(Err(e)) => {
                    log::warn!(
                        target: "app_server_bridge::bridge::reader",
                        "{} read error: {}",
                        stream,
                        e
                    );
                    break;
                }
                None => {
                    log::debug!(
                        target: "app_server_bridge::bridge::reader",
                        "{} reached EOF",
                        stream
                    );
                    break;
                }
            },
        }
    }
}
