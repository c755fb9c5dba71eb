//! roomcast gateway library entry.
//!
//! Wires the WebSocket transport to the connection hub, which bridges client
//! subscriptions to the broker and keeps room presence in step with
//! connection lifecycle. Consumed by the binary (`main.rs`) and by
//! integration tests.

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod app_state;
pub mod auth;
pub mod broker;
pub mod config;
pub mod error;
pub mod hub;
pub mod obs;
pub mod ops;
pub mod presence;
pub mod rooms;
pub mod router;
pub mod transport;
