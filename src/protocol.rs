//! App-server wire protocol: ids, message shapes and classification.

pub mod app_server;
mod classify;
mod message;
mod request_id;

pub use classify::{classify, decode_line};
pub use message::{
    DISPOSED_MESSAGE, ErrorCodes, ErrorResponse, Message, MessageKind, Notification, Request,
    Response, ResponseError,
};
pub use request_id::RequestId;
