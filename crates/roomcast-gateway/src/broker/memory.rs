use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use roomcast_core::error::Result;

use super::{Broker, BrokerMessage, BrokerStream};

type SubscriberId = u64;
type Subscribers = DashMap<String, Vec<(SubscriberId, mpsc::UnboundedSender<BrokerMessage>)>>;

/// In-process broker: channel -> live subscriptions.
///
/// Each subscription owns one unbounded queue; a publish is copied into the
/// queue of every subscription listening on that channel. Dropping a
/// subscription's stream removes it from every channel it covered.
#[derive(Default)]
pub struct MemoryBroker {
    channels: Arc<Subscribers>,
    seq: AtomicU64,
}

/// Unregisters one subscription when its stream is dropped.
struct SubscriptionGuard {
    channels: Arc<Subscribers>,
    id: SubscriberId,
    names: Vec<String>,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        for name in &self.names {
            if let Some(mut subs) = self.channels.get_mut(name) {
                subs.retain(|(sid, _)| *sid != self.id);
            }
            self.channels.remove_if(name, |_, subs| subs.is_empty());
        }
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            seq: AtomicU64::new(1),
        }
    }

    /// Number of open subscriptions currently listening on `channel`.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .get(channel)
            .map(|subs| subs.iter().filter(|(_, tx)| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn publish(&self, channel: &str, payload: Bytes) -> Result<()> {
        let Some(mut subs) = self.channels.get_mut(channel) else {
            return Ok(());
        };

        let msg = BrokerMessage {
            channel: channel.to_string(),
            payload,
        };
        subs.retain(|(_, tx)| tx.send(msg.clone()).is_ok());
        if subs.is_empty() {
            drop(subs);
            self.channels.remove_if(channel, |_, subs| subs.is_empty());
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        scope: CancellationToken,
        channels: &[String],
    ) -> Result<BrokerStream> {
        let id = self.seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();

        for channel in channels {
            let mut subs = self.channels.entry(channel.clone()).or_default();
            if !subs.iter().any(|(sid, _)| *sid == id) {
                subs.push((id, tx.clone()));
            }
        }

        let guard = SubscriptionGuard {
            channels: Arc::clone(&self.channels),
            id,
            names: channels.to_vec(),
        };

        let stream = futures_util::stream::unfold((rx, guard), |(mut rx, guard)| async move {
            rx.recv().await.map(|msg| (msg, (rx, guard)))
        })
        .take_until(scope.cancelled_owned());

        Ok(stream.boxed())
    }
}
