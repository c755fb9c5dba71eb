//! WebSocket transport: upgrade handler and inbound frame codec.

pub mod codec;
pub mod ws;
