//! Wire shapes exchanged with the app server.
//!
//! Messages are JSON-RPC-like: no `jsonrpc` version marker, one JSON object
//! per line, and the kind is inferred from which fields are present
//! (see [`classify`](super::classify)).

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use super::RequestId;

/// Reserved error codes used by the bridge itself.
pub struct ErrorCodes;

impl ErrorCodes {
    /// Synthetic code for requests rejected because the bridge was disposed.
    pub const BRIDGE_DISPOSED: i64 = -1;

    /// Method is not supported by the answering side (JSON-RPC reserved).
    pub const METHOD_NOT_FOUND: i64 = -32601;

    /// Internal failure on the answering side (JSON-RPC reserved).
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// Message used for every request rejected by disposal.
pub const DISPOSED_MESSAGE: &str = "App server bridge disposed";

/// A call that expects a reply. Sent by either side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Fire-and-forget message without an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Successful reply correlated by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: RequestId,
    pub result: Value,
}

/// Failed reply correlated by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub id: RequestId,
    pub error: ResponseError,
}

/// Error body of an [`ErrorResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    /// Any JSON number; codes issued by the bridge are integers.
    pub code: Number,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ResponseError {
    pub fn new(code: impl Into<Number>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            data: None,
        }
    }

    /// Attach additional error data.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl ErrorResponse {
    /// The synthetic rejection handed to every pending request on disposal.
    pub fn disposed() -> Self {
        Self {
            id: RequestId::from(-1),
            error: ResponseError::new(ErrorCodes::BRIDGE_DISPOSED, DISPOSED_MESSAGE),
        }
    }

    /// Whether this is the synthetic disposal rejection.
    pub fn is_disposal(&self) -> bool {
        self.error.code.as_i64() == Some(ErrorCodes::BRIDGE_DISPOSED)
            && self.error.message == DISPOSED_MESSAGE
    }
}

/// Discriminant of a [`Message`], handy for logging and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Notification,
    Response,
    Error,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Request => "request",
            MessageKind::Notification => "notification",
            MessageKind::Response => "response",
            MessageKind::Error => "error",
        }
    }
}

/// A classified inbound (or outbound) message.
///
/// Serializes to the bare wire shape of the wrapped variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Message {
    Request(Request),
    Notification(Notification),
    Response(Response),
    Error(ErrorResponse),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Request(_) => MessageKind::Request,
            Message::Notification(_) => MessageKind::Notification,
            Message::Response(_) => MessageKind::Response,
            Message::Error(_) => MessageKind::Error,
        }
    }

    /// The correlation id, if this kind carries one.
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Message::Request(r) => Some(&r.id),
            Message::Notification(_) => None,
            Message::Response(r) => Some(&r.id),
            Message::Error(e) => Some(&e.id),
        }
    }

    /// The method name for requests and notifications.
    pub fn method(&self) -> Option<&str> {
        match self {
            Message::Request(r) => Some(&r.method),
            Message::Notification(n) => Some(&n.method),
            _ => None,
        }
    }
}
