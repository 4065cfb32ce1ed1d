//! Outbound message types for the writer loop.
//!
//! All messages pass through one FIFO queue so that stdin sees them in call
//! order. Payloads are serialized before they are queued.

use tokio::sync::oneshot;

use crate::protocol::RequestId;

/// A serialized line waiting to be written to the app server's stdin.
#[derive(Debug)]
pub(crate) enum OutboundMessage {
    /// Notification, or a reply to a peer-initiated request.
    Notification(String),

    /// Request (reply expected).
    ///
    /// The request_id must be registered with ResponseRouter BEFORE queuing.
    Request {
        /// The serialized request, without the trailing newline
        payload: String,
        /// Request ID for correlation (already registered with router)
        request_id: RequestId,
    },

    /// Barrier: acknowledged once every earlier message has been written.
    Flush(oneshot::Sender<()>),
}

impl OutboundMessage {
    /// The line to write, or `None` for a flush barrier.
    pub(crate) fn payload(&self) -> Option<&str> {
        match self {
            OutboundMessage::Notification(payload) => Some(payload),
            OutboundMessage::Request { payload, .. } => Some(payload),
            OutboundMessage::Flush(_) => None,
        }
    }

    pub(crate) fn request_id(&self) -> Option<&RequestId> {
        match self {
            OutboundMessage::Request { request_id, .. } => Some(request_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_exposes_payload_and_id() {
        let msg = OutboundMessage::Request {
            payload: r#"{"id":42,"method":"ping"}"#.to_string(),
            request_id: RequestId::from(42),
        };
        assert_eq!(msg.payload(), Some(r#"{"id":42,"method":"ping"}"#));
        assert_eq!(msg.request_id(), Some(&RequestId::from(42)));
    }

    #[test]
    fn notification_has_no_request_id() {
        let msg = OutboundMessage::Notification(r#"{"method":"initialized"}"#.to_string());
        assert_eq!(msg.request_id(), None);
        let debug_str = format!("{:?}", msg);
        assert!(debug_str.contains("Notification"), "{}", debug_str);
    }

    #[test]
    fn flush_has_no_payload() {
        let (tx, _rx) = oneshot::channel();
        let msg = OutboundMessage::Flush(tx);
        assert_eq!(msg.payload(), None);
        assert_eq!(msg.request_id(), None);
    }
}
