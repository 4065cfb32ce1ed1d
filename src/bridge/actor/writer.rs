//! Writer task for the app server's stdin.
//!
//! A single task drains the FIFO queue and writes each payload followed by
//! `\n`, so stdin sees messages in exactly the order they were queued.
//!
//! The loop ends when the queue closes (bridge disposed or dropped), when the
//! cancel token fires, or after the first write or flush error. Ending the loop drops
//! both the stdin handle (closing the pipe) and the queue receiver, which is
//! what makes later sends fail with `TransportNotReady`.

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{OutboundMessage, ResponseRouter};
use crate::bridge::events::EventEmitter;
use crate::error::BridgeError;
use crate::protocol::{ErrorCodes, ErrorResponse, ResponseError};

/// Everything the writer needs besides its pipe and queue.
pub(crate) struct WriterContext {
    pub(crate) router: Arc<ResponseRouter>,
    pub(crate) events: EventEmitter,
    /// Reject the affected request (and anything still queued) when a write fails.
    pub(crate) reject_on_write_failure: bool,
    pub(crate) cancel_token: CancellationToken,
}

/// Spawn the writer task.
pub(crate) fn spawn_writer_task<W>(
    writer: W,
    rx: mpsc::UnboundedReceiver<OutboundMessage>,
    ctx: WriterContext,
) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(writer_loop(writer, rx, ctx))
}

async fn writer_loop<W>(
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<OutboundMessage>,
    ctx: WriterContext,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let msg = tokio::select! {
            biased;
            _ = ctx.cancel_token.cancelled() => {
                log::debug!(
                    target: "app_server_bridge::bridge::writer",
                    "Writer task cancelled, shutting down"
                );
                break;
            }
            msg = rx.recv() => match msg {
                Some(msg) => msg,
                None => {
                    log::debug!(
                        target: "app_server_bridge::bridge::writer",
                        "Outbound queue closed, shutting down"
                    );
                    break;
                }
            },
        };

        let result = match &msg {
            OutboundMessage::Flush(_) => writer.flush().await,
            _ => write_message(&mut writer, &msg).await,
        };
        if let Err(e) = result {
            log::warn!(
                target: "app_server_bridge::bridge::writer",
                "Write error: {}",
                e
            );
            // Dropping a flush barrier's ack makes its waiter fail
            handle_write_failure(msg, e, &mut rx, &ctx);
            break;
        }

        if let OutboundMessage::Flush(ack) = msg {
            let _ = ack.send(());
        }
    }
}

async fn write_message<W>(writer: &mut W, msg: &OutboundMessage) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let Some(payload) = msg.payload() else {
        return Ok(());
    };
    writer.write_all(payload.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

fn handle_write_failure(
    msg: OutboundMessage,
    error: std::io::Error,
    rx: &mut mpsc::UnboundedReceiver<OutboundMessage>,
    ctx: &WriterContext,
) {
    let message = format!("Failed to write to app server stdin: {}", error);
    ctx.events
        .emit_error(BridgeError::write_failure(msg.request_id().cloned(), error));

    if !ctx.reject_on_write_failure {
        return;
    }

    // Nothing queued behind the failed write will reach the child either
    rx.close();
    let mut rejected = 0;
    let mut failed = Some(msg);
    while let Some(msg) = failed.take().or_else(|| rx.try_recv().ok()) {
        if let Some(id) = msg.request_id() {
            rejected += usize::from(ctx.router.reject(ErrorResponse {
                id: id.clone(),
                error: ResponseError::new(ErrorCodes::INTERNAL_ERROR, message.clone()),
            }));
        }
    }
    log::debug!(
        target: "app_server_bridge::bridge::writer",
        "Rejected {} request(s) after write failure",
        rejected
    );
}
