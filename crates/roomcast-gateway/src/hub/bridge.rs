//! Broker subscription -> client outbound queue.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::broker::{Broker, BrokerMessage};
use crate::config::SlowConsumerPolicy;
use crate::obs::metrics::GatewayMetrics;

use super::client::{Client, ClientId, Frame, PushError};

/// Everything a bridge needs besides its client and channels.
#[derive(Clone)]
pub(crate) struct BridgeContext {
    pub broker: Arc<dyn Broker>,
    pub metrics: Arc<GatewayMetrics>,
    pub unregister_tx: mpsc::UnboundedSender<ClientId>,
    pub slow_consumer: SlowConsumerPolicy,
}

#[derive(Debug, PartialEq, Eq)]
enum BridgeExit {
    Cancelled,
    ClientClosed,
    SlowConsumer,
    StreamEnded,
    SubscribeFailed,
}

impl BridgeContext {
    /// Spawn one bridge over `channels`, bound to `scope`.
    pub fn spawn(
        &self,
        client: Arc<Client>,
        channels: Vec<String>,
        scope: CancellationToken,
    ) -> JoinHandle<()> {
        let ctx = self.clone();
        self.metrics.bridges_spawned.inc(&[]);
        self.metrics.bridges_active.inc(&[]);

        tokio::spawn(async move {
            let exit = ctx.forward(&client, &channels, &scope).await;
            ctx.metrics.bridges_active.dec(&[]);

            match exit {
                BridgeExit::Cancelled | BridgeExit::ClientClosed => {
                    tracing::debug!(client_id = client.id(), channels = ?channels, ?exit, "bridge stopped");
                }
                BridgeExit::SlowConsumer | BridgeExit::StreamEnded | BridgeExit::SubscribeFailed => {
                    // The hub answers by cancelling the client scope.
                    let _ = ctx.unregister_tx.send(client.id());
                }
            }
        })
    }

    async fn forward(
        &self,
        client: &Client,
        channels: &[String],
        scope: &CancellationToken,
    ) -> BridgeExit {
        let subscribed = tokio::select! {
            biased;
            _ = scope.cancelled() => return BridgeExit::Cancelled,
            r = self.broker.subscribe(scope.clone(), channels) => r,
        };

        let mut stream = match subscribed {
            Ok(stream) => stream,
            Err(e) => {
                self.metrics.broker_errors.inc(&[("op", "subscribe")]);
                tracing::error!(
                    client_id = client.id(),
                    user_id = %client.user_id(),
                    channels = ?channels,
                    error = %e,
                    "broker subscribe failed; tearing client down"
                );
                return BridgeExit::SubscribeFailed;
            }
        };

        tracing::debug!(client_id = client.id(), channels = ?channels, "bridge subscribed");

        loop {
            let next = tokio::select! {
                biased;
                _ = scope.cancelled() => return BridgeExit::Cancelled,
                next = stream.next() => next,
            };

            let Some(BrokerMessage { channel, payload }) = next else {
                break;
            };

            match client.outbound().push(Frame::new(payload)) {
                Ok(()) => self.metrics.frames_delivered.inc(&[]),
                Err(PushError::Closed) => {
                    self.metrics.frames_dropped.inc(&[("reason", "closed")]);
                    return BridgeExit::ClientClosed;
                }
                Err(PushError::Full) => {
                    self.metrics.frames_dropped.inc(&[("reason", "queue_full")]);
                    match self.slow_consumer {
                        SlowConsumerPolicy::DropNewest => {
                            tracing::warn!(
                                client_id = client.id(),
                                user_id = %client.user_id(),
                                %channel,
                                "outbound queue full; frame dropped"
                            );
                        }
                        SlowConsumerPolicy::Disconnect => {
                            tracing::warn!(
                                client_id = client.id(),
                                user_id = %client.user_id(),
                                %channel,
                                "outbound queue full; disconnecting slow consumer"
                            );
                            return BridgeExit::SlowConsumer;
                        }
                    }
                }
            }
        }

        // Cancellation also ends the stream.
        if scope.is_cancelled() {
            return BridgeExit::Cancelled;
        }

        self.metrics.broker_errors.inc(&[("op", "stream_end")]);
        tracing::warn!(
            client_id = client.id(),
            user_id = %client.user_id(),
            channels = ?channels,
            "broker stream ended; tearing client down"
        );
        BridgeExit::StreamEnded
    }
}
