//! Process bridge to `codex app-server`.
//!
//! # Components
//!
//! - `AppServerBridge`: Public facade (start, send, subscribe, dispose)
//! - `supervisor`: Spawns the child and watches for its exit
//! - `actor`: Reader/writer tasks and the pending-request router
//! - `events`: Broadcast event stream

mod actor;
mod app_server;
mod events;
mod readiness;
mod supervisor;

pub use actor::{ResponseRouter, Settlement};
pub use app_server::AppServerBridge;
pub use events::{BridgeEvent, DEFAULT_EVENT_CAPACITY, ExitInfo};
