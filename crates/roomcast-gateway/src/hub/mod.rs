//! Connection hub: client registry, subscriptions and broker bridges.

mod bridge;
pub mod client;
#[allow(clippy::module_inception)]
mod hub;
pub mod pump;

pub use client::{Client, ClientId, Frame, OutboundQueue, PushError};
pub use hub::{Hub, HubHandle, HubSettings, SubscriptionKind, SubscriptionRequest};
pub use pump::{read_pump, write_pump, PumpSettings};
