//! Shared test helpers for end-to-end tests.
#![allow(dead_code)]

#[path = "helpers_events.rs"]
pub mod events;

#[path = "helpers_fake_app_server.rs"]
pub mod fake_app_server;
