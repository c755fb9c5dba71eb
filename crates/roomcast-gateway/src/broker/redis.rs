use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use ::redis::aio::ConnectionManager;
use ::redis::{AsyncCommands, Client};
use tokio_util::sync::CancellationToken;

use roomcast_core::error::{Result, RoomcastError};

use super::{Broker, BrokerMessage, BrokerStream};

/// Redis pub/sub broker.
///
/// Publishing shares one multiplexed, auto-reconnecting connection. Every
/// subscription opens its own pub/sub connection, which is closed when the
/// returned stream is dropped.
pub struct RedisBroker {
    client: Client,
    publisher: ConnectionManager,
}

impl RedisBroker {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url)
            .map_err(|e| RoomcastError::Broker(format!("invalid redis url: {e}")))?;
        let publisher = client
            .get_connection_manager()
            .await
            .map_err(|e| RoomcastError::Broker(format!("connect to redis failed: {e}")))?;

        tracing::info!(%url, "redis broker connected");
        Ok(Self { client, publisher })
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn publish(&self, channel: &str, payload: Bytes) -> Result<()> {
        let mut conn = self.publisher.clone();
        let _receivers: i64 = conn
            .publish(channel, payload.as_ref())
            .await
            .map_err(|e| RoomcastError::Broker(format!("publish to {channel} failed: {e}")))?;
        Ok(())
    }

    async fn subscribe(
        &self,
        scope: CancellationToken,
        channels: &[String],
    ) -> Result<BrokerStream> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| RoomcastError::Broker(format!("open pubsub connection failed: {e}")))?;

        // SUBSCRIBE is acknowledged before this returns.
        pubsub
            .subscribe(channels.to_vec())
            .await
            .map_err(|e| RoomcastError::Broker(format!("subscribe {channels:?} failed: {e}")))?;

        tracing::debug!(channels = ?channels, "redis subscription established");

        let stream = pubsub
            .into_on_message()
            .map(|msg| BrokerMessage {
                channel: msg.get_channel_name().to_string(),
                payload: Bytes::copy_from_slice(msg.get_payload_bytes()),
            })
            .take_until(scope.cancelled_owned());

        Ok(stream.boxed())
    }
}
