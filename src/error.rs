//! Error handling types for app-server-bridge
//!
//! A single error enum covers transport, framing and request-level faults.
//! Transport and framing faults are mostly delivered through the bridge's
//! `error` event rather than returned, so the enum is also what observers see.

use std::sync::{MutexGuard, PoisonError};

use thiserror::Error;

use crate::protocol::{ErrorResponse, RequestId};

/// Comprehensive error type for bridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    /// `start()` was called more than once
    #[error("App server bridge already started")]
    AlreadyStarted,

    /// `start()` was called after `dispose()`
    #[error("App server bridge disposed")]
    Disposed,

    /// The child process could not be created
    #[error("Failed to spawn {program}: {source}")]
    SpawnFailure {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A stdout line is not valid JSON
    #[error("Failed to parse JSON line: {source}: {line}")]
    MalformedLine {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    /// A stdout line is valid JSON but matches no known message shape
    #[error("Unknown JSON-RPC message shape: {line}")]
    UnclassifiableMessage { line: String },

    /// A write was attempted without a live, writable child stdin
    #[error("App server process not ready to accept input")]
    TransportNotReady,

    /// Writing to the child's stdin failed
    #[error("Failed to write to app server stdin: {source}")]
    WriteFailure {
        /// Id of the request whose write failed, if the payload was a request
        request_id: Option<RequestId>,
        #[source]
        source: std::io::Error,
    },

    /// A request id is already pending
    #[error("Duplicate request id: {0}")]
    DuplicateId(RequestId),

    /// The peer (or disposal) rejected a request
    #[error("Request {} rejected with code {}: {}", .0.id, .0.error.code, .0.error.message)]
    Rejected(ErrorResponse),

    /// The pending entry vanished without being settled
    #[error("Request {0} was dropped before it settled")]
    Abandoned(RequestId),

    /// Outbound params could not be encoded, or a result could not be decoded
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Configuration error
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Helper functions for common error patterns
impl BridgeError {
    /// Create a spawn failure error
    pub fn spawn_failure(program: impl Into<String>, source: std::io::Error) -> Self {
        BridgeError::SpawnFailure {
            program: program.into(),
            source,
        }
    }

    /// Create a malformed line error
    pub fn malformed_line(line: impl Into<String>, source: serde_json::Error) -> Self {
        BridgeError::MalformedLine {
            line: line.into(),
            source,
        }
    }

    /// Create an unclassifiable message error
    pub fn unclassifiable(line: impl Into<String>) -> Self {
        BridgeError::UnclassifiableMessage { line: line.into() }
    }

    /// Create a write failure error
    pub fn write_failure(request_id: Option<RequestId>, source: std::io::Error) -> Self {
        BridgeError::WriteFailure { request_id, source }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        BridgeError::Config {
            message: message.into(),
        }
    }

    /// The peer's error payload, if this is a rejected request.
    pub fn as_rejection(&self) -> Option<&ErrorResponse> {
        match self {
            BridgeError::Rejected(error) => Some(error),
            _ => None,
        }
    }

    /// Whether the request was rejected because the bridge was disposed.
    pub fn is_disposal(&self) -> bool {
        self.as_rejection().is_some_and(ErrorResponse::is_disposal)
    }
}

/// Helper trait to recover guards from poisoned mutexes.
pub(crate) trait LockResultExt<'a, T> {
    /// Take the guard even if a previous holder panicked, logging the recovery.
    ///
    /// The context parameter identifies which operation triggered lock recovery.
    fn recover_poison(self, context: &str) -> MutexGuard<'a, T>;
}

impl<'a, T> LockResultExt<'a, T> for Result<MutexGuard<'a, T>, PoisonError<MutexGuard<'a, T>>> {
    fn recover_poison(self, context: &str) -> MutexGuard<'a, T> {
        self.unwrap_or_else(|poisoned| {
            log::warn!(
                target: "app_server_bridge::lock_recovery",
                "Recovered from poisoned lock in {}",
                context
            );
            poisoned.into_inner()
        })
    }
}
