//! Publish/subscribe broker boundary.
//!
//! Producers (domain services) publish; the hub only subscribes. A
//! subscription is a lazy stream that ends when its scope is cancelled or the
//! underlying connection goes away. It is never restarted internally; callers
//! that want to resume must subscribe again.

mod memory;
mod redis;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use roomcast_core::error::Result;
use roomcast_core::protocol::Envelope;

pub use self::memory::MemoryBroker;
pub use self::redis::RedisBroker;

use crate::config::{BackendKind, BrokerSection};

/// One delivery from a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub channel: String,
    pub payload: Bytes,
}

/// Stream of deliveries for one subscription.
pub type BrokerStream = BoxStream<'static, BrokerMessage>;

#[async_trait]
pub trait Broker: Send + Sync {
    /// Publish `payload` to `channel`. Fire-and-forget for the producer.
    async fn publish(&self, channel: &str, payload: Bytes) -> Result<()>;

    /// Open one subscription covering every channel in `channels`.
    ///
    /// Returns once the subscription is established; messages published
    /// before that point are never delivered.
    async fn subscribe(&self, scope: CancellationToken, channels: &[String])
        -> Result<BrokerStream>;
}

/// Publish a `{type, payload}` event the way producers do.
pub async fn publish_event<T: Serialize + Sync>(
    broker: &dyn Broker,
    channel: &str,
    event_type: &str,
    payload: &T,
) -> Result<()> {
    let wire = Envelope::encode(event_type, payload)?;
    broker.publish(channel, Bytes::from(wire)).await
}

/// Build the configured broker.
pub async fn connect(cfg: &BrokerSection) -> Result<Arc<dyn Broker>> {
    match cfg.kind {
        BackendKind::Memory => Ok(Arc::new(MemoryBroker::new())),
        BackendKind::Redis => Ok(Arc::new(RedisBroker::connect(&cfg.redis_url).await?)),
    }
}
