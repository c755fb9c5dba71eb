//! Inbound frame decoding.
//!
//! Text and binary frames both carry a JSON `{type, payload}` envelope.
//! Ping/Pong are handled by the socket layer and only surface here so the
//! reader can treat them as liveness.

use axum::extract::ws::Message;
use roomcast_core::{error::Result, protocol::Event};

#[derive(Debug)]
pub enum Inbound {
    Event(Event),
    Control,
    Close,
}

pub fn decode(msg: Message) -> Result<Inbound> {
    match msg {
        Message::Text(s) => Event::decode(s.as_bytes()).map(Inbound::Event),
        Message::Binary(b) => Event::decode(&b).map(Inbound::Event),
        Message::Ping(_) | Message::Pong(_) => Ok(Inbound::Control),
        Message::Close(_) => Ok(Inbound::Close),
    }
}
