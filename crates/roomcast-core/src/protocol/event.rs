//! `{type, payload}` event envelope.
//!
//! The envelope keeps `payload` as `RawValue` so only recognized event kinds
//! pay for parsing it. Unknown `type` values decode successfully into
//! `Event::Unknown` and are meant to be ignored by receivers.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::{Result, RoomcastError};

/// Recognized event tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Subscribe,
    Unsubscribe,
    ProfileUpdated,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Subscribe => "SUBSCRIBE",
            EventType::Unsubscribe => "UNSUBSCRIBE",
            EventType::ProfileUpdated => "PROFILE_UPDATED",
        }
    }

    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "SUBSCRIBE" => Some(EventType::Subscribe),
            "UNSUBSCRIBE" => Some(EventType::Unsubscribe),
            "PROFILE_UPDATED" => Some(EventType::ProfileUpdated),
            _ => None,
        }
    }
}

/// Wire envelope (Text frame or broker payload).
#[derive(Debug, Deserialize)]
pub struct Envelope {
    /// Event tag (field name is `type` in JSON).
    #[serde(rename = "type")]
    pub event_type: String,
    /// Tag-dependent payload, stored as raw JSON (lazy parsing).
    #[serde(default)]
    pub payload: Option<Box<RawValue>>,
}

impl Envelope {
    /// Parse the envelope header only.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| RoomcastError::BadRequest(format!("invalid envelope json: {e}")))
    }

    /// Resolve the payload against the tag.
    pub fn into_event(self) -> Result<Event> {
        let Some(kind) = EventType::parse(&self.event_type) else {
            return Ok(Event::Unknown {
                event_type: self.event_type,
            });
        };

        let raw = self.payload.ok_or_else(|| {
            RoomcastError::BadRequest(format!("{} requires payload", kind.as_str()))
        })?;

        let bad = |e: serde_json::Error| {
            RoomcastError::BadRequest(format!("{} invalid payload: {e}", kind.as_str()))
        };

        Ok(match kind {
            EventType::Subscribe => Event::Subscribe(serde_json::from_str(raw.get()).map_err(bad)?),
            EventType::Unsubscribe => {
                Event::Unsubscribe(serde_json::from_str(raw.get()).map_err(bad)?)
            }
            EventType::ProfileUpdated => {
                Event::ProfileUpdated(serde_json::from_str(raw.get()).map_err(bad)?)
            }
        })
    }

    /// Encode a `{type, payload}` envelope, as published by producers.
    pub fn encode<T: Serialize>(event_type: &str, payload: &T) -> Result<String> {
        #[derive(Serialize)]
        struct Out<'a, T> {
            #[serde(rename = "type")]
            event_type: &'a str,
            payload: &'a T,
        }

        serde_json::to_string(&Out {
            event_type,
            payload,
        })
        .map_err(|e| RoomcastError::Internal(format!("json encode failed: {e}")))
    }
}

/// Decoded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Subscribe(ChannelsPayload),
    Unsubscribe(ChannelsPayload),
    ProfileUpdated(ProfileUpdatedPayload),
    /// Syntactically valid envelope with a tag this build does not know.
    Unknown { event_type: String },
}

impl Event {
    /// Decode a full event from raw frame bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Envelope::from_slice(bytes)?.into_event()
    }

    pub fn event_type(&self) -> &str {
        match self {
            Event::Subscribe(_) => EventType::Subscribe.as_str(),
            Event::Unsubscribe(_) => EventType::Unsubscribe.as_str(),
            Event::ProfileUpdated(_) => EventType::ProfileUpdated.as_str(),
            Event::Unknown { event_type } => event_type,
        }
    }
}

/// Payload of SUBSCRIBE / UNSUBSCRIBE.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelsPayload {
    /// Broker channel names. Older clients send `room_ids`.
    #[serde(alias = "room_ids")]
    pub channels: Vec<String>,
}

/// Payload of PROFILE_UPDATED, published to `user:<id>` after an avatar change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdatedPayload {
    pub new_image_url: String,
}
