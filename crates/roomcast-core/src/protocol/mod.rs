//! Wire protocol for roomcast.
//!
//! - `event`: the `{type, payload}` envelope and the recognized event kinds.
//! - `channel`: broker channel naming convention (`room:<id>:...`, `user:<id>`).
//!
//! Decoding never panics: malformed input is reported as `RoomcastError`.

pub mod channel;
pub mod event;

pub use channel::{room_channel, room_id_of, room_messages_channel, user_channel};
pub use event::{ChannelsPayload, Envelope, Event, EventType, ProfileUpdatedPayload};
