//! roomcast core: wire protocol, channel naming and the shared error type.
//!
//! This crate defines the contracts shared by the gateway and by producer
//! services that publish events for connected clients. It carries no
//! transport or runtime dependencies so producers can use it without pulling
//! in the gateway.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here.
//! Malformed client input must surface as `RoomcastError`, never as a crash.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{Result, RoomcastError};
