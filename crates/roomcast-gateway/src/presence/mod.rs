//! Room presence boundary.
//!
//! The presence store is shared by every gateway instance and owned by
//! neither. The hub only writes through `PresenceWriter`, which applies
//! operations in issue order off the hub's own task.

mod memory;
mod redis;
mod writer;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use roomcast_core::error::Result;

pub use self::memory::{MemoryPresence, PresenceCalls};
pub use self::redis::RedisPresence;
pub use self::writer::{PresenceOp, PresenceWriter};

use crate::config::{BackendKind, PresenceSection};

/// Room-scoped online sets. `add` is idempotent; removing a non-member is a no-op.
#[async_trait]
pub trait PresenceStore: Send + Sync {
    async fn add(&self, room: &str, user: &str) -> Result<()>;
    async fn remove(&self, room: &str, user: &str) -> Result<()>;
    async fn list_online(&self, room: &str) -> Result<HashSet<String>>;
}

/// Build the configured presence store.
pub async fn connect(cfg: &PresenceSection) -> Result<Arc<dyn PresenceStore>> {
    match cfg.kind {
        BackendKind::Memory => Ok(Arc::new(MemoryPresence::new())),
        BackendKind::Redis => Ok(Arc::new(
            RedisPresence::connect(&cfg.redis_url, cfg.key_prefix.clone(), cfg.ttl_secs).await?,
        )),
    }
}
