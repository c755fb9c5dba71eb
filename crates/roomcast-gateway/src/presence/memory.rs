use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};

use roomcast_core::error::Result;

use super::PresenceStore;

/// Number of add/remove calls seen for one (room, user) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresenceCalls {
    pub adds: u64,
    pub removes: u64,
}

/// Room presence: room -> users, plus a per-pair call ledger.
#[derive(Default)]
pub struct MemoryPresence {
    room_to_users: DashMap<String, DashSet<String>>,
    calls: DashMap<(String, String), PresenceCalls>,
}

impl MemoryPresence {
    pub fn new() -> Self {
        Self {
            room_to_users: DashMap::new(),
            calls: DashMap::new(),
        }
    }

    pub fn calls(&self, room: &str, user: &str) -> PresenceCalls {
        self.calls
            .get(&(room.to_string(), user.to_string()))
            .map(|c| *c)
            .unwrap_or_default()
    }

    pub fn contains(&self, room: &str, user: &str) -> bool {
        self.room_to_users
            .get(room)
            .map(|set| set.contains(user))
            .unwrap_or(false)
    }

    fn record(&self, room: &str, user: &str, f: impl FnOnce(&mut PresenceCalls)) {
        let mut entry = self
            .calls
            .entry((room.to_string(), user.to_string()))
            .or_default();
        f(entry.value_mut());
    }
}

#[async_trait]
impl PresenceStore for MemoryPresence {
    async fn add(&self, room: &str, user: &str) -> Result<()> {
        self.record(room, user, |c| c.adds += 1);
        self.room_to_users
            .entry(room.to_string())
            .or_insert_with(DashSet::new)
            .insert(user.to_string());
        Ok(())
    }

    async fn remove(&self, room: &str, user: &str) -> Result<()> {
        self.record(room, user, |c| c.removes += 1);
        if let Some(set) = self.room_to_users.get(room) {
            set.remove(user);
            if set.is_empty() {
                drop(set);
                self.room_to_users.remove_if(room, |_, set| set.is_empty());
            }
        }
        Ok(())
    }

    async fn list_online(&self, room: &str) -> Result<HashSet<String>> {
        Ok(self
            .room_to_users
            .get(room)
            .map(|set| set.iter().map(|u| u.key().to_string()).collect())
            .unwrap_or_default())
    }
}
