use std::collections::HashSet;

use ::redis::aio::ConnectionManager;
use ::redis::{AsyncCommands, Client};
use async_trait::async_trait;

use roomcast_core::error::{Result, RoomcastError};

use super::PresenceStore;

/// Presence backed by one Redis set per room (`<prefix><room_id>`).
///
/// Every add refreshes the key's expiry so entries left behind by a crashed
/// instance age out instead of living forever.
pub struct RedisPresence {
    conn: ConnectionManager,
    key_prefix: String,
    ttl_secs: u64,
}

impl RedisPresence {
    pub async fn connect(url: &str, key_prefix: String, ttl_secs: u64) -> Result<Self> {
        let client = Client::open(url)
            .map_err(|e| RoomcastError::Presence(format!("invalid redis url: {e}")))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| RoomcastError::Presence(format!("connect to redis failed: {e}")))?;

        tracing::info!(%url, %key_prefix, ttl_secs, "redis presence connected");
        Ok(Self {
            conn,
            key_prefix,
            ttl_secs,
        })
    }

    fn key_for_room(&self, room: &str) -> String {
        format!("{}{}", self.key_prefix, room)
    }
}

#[async_trait]
impl PresenceStore for RedisPresence {
    async fn add(&self, room: &str, user: &str) -> Result<()> {
        let key = self.key_for_room(room);
        let mut conn = self.conn.clone();

        let mut pipe = ::redis::pipe();
        pipe.sadd(&key, user).ignore();
        if self.ttl_secs > 0 {
            pipe.expire(&key, self.ttl_secs as i64).ignore();
        }
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| RoomcastError::Presence(format!("SADD {key} failed: {e}")))?;
        Ok(())
    }

    async fn remove(&self, room: &str, user: &str) -> Result<()> {
        let key = self.key_for_room(room);
        let mut conn = self.conn.clone();
        let _removed: i64 = conn
            .srem(&key, user)
            .await
            .map_err(|e| RoomcastError::Presence(format!("SREM {key} failed: {e}")))?;
        Ok(())
    }

    async fn list_online(&self, room: &str) -> Result<HashSet<String>> {
        let key = self.key_for_room(room);
        let mut conn = self.conn.clone();
        conn.smembers(&key)
            .await
            .map_err(|e| RoomcastError::Presence(format!("SMEMBERS {key} failed: {e}")))
    }
}
