//! Broker channel naming.
//!
//! Producers publish to deterministic names. Only `room:` channels carry
//! presence semantics; everything else (e.g. `user:<id>`) is a plain topic.

/// Prefix of channels scoped to a room.
pub const ROOM_PREFIX: &str = "room:";
/// Prefix of per-user notification channels.
pub const USER_PREFIX: &str = "user:";

/// `room:<room_id>`
pub fn room_channel(room_id: &str) -> String {
    format!("{ROOM_PREFIX}{room_id}")
}

/// `room:<room_id>:messages`, the room broadcast channel.
pub fn room_messages_channel(room_id: &str) -> String {
    format!("{ROOM_PREFIX}{room_id}:messages")
}

/// `user:<user_id>`, direct notices for one user.
pub fn user_channel(user_id: &str) -> String {
    format!("{USER_PREFIX}{user_id}")
}

/// Extract the room id from a `room:` channel.
///
/// `room:42:messages` and `room:42` both map to `42`. Returns `None` for
/// channels outside the room namespace or with an empty id.
pub fn room_id_of(channel: &str) -> Option<&str> {
    let rest = channel.strip_prefix(ROOM_PREFIX)?;
    let id = rest.split(':').next().unwrap_or_default();
    (!id.is_empty()).then_some(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_channels_map_to_room_id() {
        assert_eq!(room_id_of("room:42:messages"), Some("42"));
        assert_eq!(room_id_of("room:42"), Some("42"));
        assert_eq!(room_id_of(&room_messages_channel("abc")), Some("abc"));
    }

    #[test]
    fn other_channels_carry_no_room() {
        assert_eq!(room_id_of("user:7"), None);
        assert_eq!(room_id_of("room:"), None);
        assert_eq!(room_id_of("room::messages"), None);
        assert_eq!(room_id_of("rooms:1"), None);
        assert_eq!(room_id_of(&user_channel("7")), None);
    }
}
