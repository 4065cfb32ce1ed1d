//! Structural classification of inbound messages.
//!
//! Classification never validates method-specific shapes. It only looks at
//! which of `id`, `method`, `result` and `error` are present, in this order:
//!
//! 1. `id` (number or string) and string `method` → request
//! 2. string `method` → notification
//! 3. `id` and a `result` key (null counts) → response
//! 4. `id` and an `error` object with numeric `code` and string `message` → error
//!
//! Requests and notifications are checked first so that a malformed payload
//! carrying both `method` and `result` is never routed as a response.

use serde_json::{Map, Value};

use super::{ErrorResponse, Message, Notification, Request, RequestId, Response, ResponseError};
use crate::error::{BridgeError, BridgeResult};

/// Classify a decoded JSON value.
///
/// Returns `None` when the value matches none of the four shapes.
pub fn classify(value: &Value) -> Option<Message> {
    let object = value.as_object()?;

    let id = object.get("id").and_then(RequestId::from_value);
    let method = object.get("method").and_then(Value::as_str);
    let params = object.get("params").cloned();

    if let (Some(id), Some(method)) = (id.clone(), method) {
        return Some(Message::Request(Request {
            id,
            method: method.to_string(),
            params,
        }));
    }

    if let Some(method) = method {
        return Some(Message::Notification(Notification {
            method: method.to_string(),
            params,
        }));
    }

    let id = id?;

    if let Some(result) = object.get("result") {
        return Some(Message::Response(Response {
            id,
            result: result.clone(),
        }));
    }

    let error = object.get("error").and_then(Value::as_object)?;
    parse_error_body(error).map(|error| Message::Error(ErrorResponse { id, error }))
}

fn parse_error_body(error: &Map<String, Value>) -> Option<ResponseError> {
    let code = error.get("code")?.as_number()?.clone();
    let message = error.get("message")?.as_str()?;
    Some(ResponseError {
        code,
        message: message.to_string(),
        data: error.get("data").cloned(),
    })
}

/// Decode one stdout line into its classified form and the raw value.
///
/// JSON parse failures are reported as [`BridgeError::MalformedLine`] and
/// never reach the classifier; valid JSON of an unknown shape is reported as
/// [`BridgeError::UnclassifiableMessage`]. Both carry the offending line.
pub fn decode_line(line: &str) -> BridgeResult<(Message, Value)> {
    let raw: Value =
        serde_json::from_str(line).map_err(|source| BridgeError::malformed_line(line, source))?;
    match classify(&raw) {
        Some(message) => Ok((message, raw)),
        None => Err(BridgeError::unclassifiable(line)),
    }
}
