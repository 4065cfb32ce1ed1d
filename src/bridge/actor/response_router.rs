//! Response routing for pending requests.
//!
//! This module provides the ResponseRouter which tracks pending requests
//! and settles each one when its response or error arrives.
//!
//! # Usage
//!
//! - Before writing a request, register it via `register(id)` to get a oneshot Receiver
//! - The stdout reader calls `resolve()` / `reject()` for each inbound reply
//! - The requester awaits the Receiver without holding any lock

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tokio::sync::oneshot;

use crate::error::{BridgeError, BridgeResult, LockResultExt};
use crate::protocol::{ErrorResponse, RequestId, Response};

/// Outcome delivered to the caller awaiting a request.
pub type Settlement = Result<Response, ErrorResponse>;

/// Tracks in-flight requests and delivers replies to their waiters.
///
/// Entries are owned by the router from `register()` until they are
/// settled, removed, or drained by `reject_all()`. Replies for ids the
/// router does not know are dropped.
#[derive(Debug, Default)]
pub struct ResponseRouter {
    pending: std::sync::Mutex<HashMap<RequestId, oneshot::Sender<Settlement>>>,
}

impl ResponseRouter {
    /// Create a new empty ResponseRouter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending request and return a receiver for its settlement.
    ///
    /// Must be called before the request is written so that a fast reply
    /// can always be routed. Fails with `DuplicateId` if the id is pending.
    pub fn register(&self, id: RequestId) -> BridgeResult<oneshot::Receiver<Settlement>> {
        let mut pending = self.pending.lock().recover_poison("ResponseRouter::register");
        match pending.entry(id) {
            Entry::Occupied(entry) => Err(BridgeError::DuplicateId(entry.key().clone())),
            Entry::Vacant(entry) => {
                let (tx, rx) = oneshot::channel();
                entry.insert(tx);
                Ok(rx)
            }
        }
    }

    /// Settle the matching request with a successful response.
    ///
    /// Returns `true` if a waiter received it.
    pub fn resolve(&self, response: Response) -> bool {
        let id = response.id.clone();
        self.settle(&id, Ok(response))
    }

    /// Settle the matching request with an error response.
    ///
    /// Returns `true` if a waiter received it.
    pub fn reject(&self, error: ErrorResponse) -> bool {
        let id = error.id.clone();
        self.settle(&id, Err(error))
    }

    fn settle(&self, id: &RequestId, settlement: Settlement) -> bool {
        let sender = self
            .pending
            .lock()
            .recover_poison("ResponseRouter::settle")
            .remove(id);

        match sender {
            Some(tx) => tx.send(settlement).is_ok(),
            None => {
                log::debug!(
                    target: "app_server_bridge::bridge::router",
                    "Reply for unknown request id {}, dropping",
                    id
                );
                false
            }
        }
    }

    /// Remove a pending request without settling it.
    ///
    /// Used when a request could not be queued after registration.
    pub fn remove(&self, id: &RequestId) -> bool {
        self.pending
            .lock()
            .recover_poison("ResponseRouter::remove")
            .remove(id)
            .is_some()
    }

    /// Reject every pending request with the same error and empty the table.
    ///
    /// Returns the number of requests that were pending.
    pub fn reject_all(&self, error: &ErrorResponse) -> usize {
        let entries: Vec<_> = self
            .pending
            .lock()
            .recover_poison("ResponseRouter::reject_all")
            .drain()
            .collect();

        // Lock is released before any waiter is woken
        let count = entries.len();
        for (_, tx) in entries {
            let _ = tx.send(Err(error.clone()));
        }
        count
    }

    /// Get the number of pending requests.
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .recover_poison("ResponseRouter::pending_count")
            .len()
    }
}
