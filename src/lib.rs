pub mod bridge;
pub mod config;
pub mod error;
pub mod protocol;

pub use bridge::{AppServerBridge, BridgeEvent, ExitInfo};
pub use config::{BridgeOptions, BridgeSettings, LogDirection, Logger};
pub use error::{BridgeError, BridgeResult};
pub use protocol::{
    ErrorResponse, Message, MessageKind, Notification, Request, RequestId, Response,
    ResponseError,
};
