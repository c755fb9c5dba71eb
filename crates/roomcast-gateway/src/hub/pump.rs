//! Socket pumps: one reader and one writer task per connection.
//!
//! Both are generic over the socket halves so they run the same against an
//! axum `WebSocket` split and against in-memory channels.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use roomcast_core::error::{Result, RoomcastError};
use roomcast_core::protocol::Event;

use crate::config::GatewaySection;
use crate::obs::metrics::GatewayMetrics;
use crate::transport::codec::{decode, Inbound};

use super::client::{Client, Frame};
use super::hub::{HubHandle, SubscriptionKind, SubscriptionRequest};

#[derive(Debug, Clone, Copy)]
pub struct PumpSettings {
    /// Max silence from the peer before the reader gives up.
    pub pong_wait: Duration,
    pub ping_period: Duration,
    /// Upper bound on a single socket write.
    pub write_wait: Duration,
}

impl PumpSettings {
    pub fn from_config(gw: &GatewaySection) -> Self {
        Self {
            pong_wait: gw.pong_wait(),
            ping_period: gw.ping_period(),
            write_wait: gw.write_wait(),
        }
    }
}

/// Read frames until the peer goes away, then ask the hub to unregister.
///
/// `conn_closed` fires when the write side is gone, which unblocks a reader
/// parked on a socket that will never produce another frame.
pub async fn read_pump<S, E>(
    client: Arc<Client>,
    mut stream: S,
    hub: HubHandle,
    conn_closed: CancellationToken,
    settings: PumpSettings,
    metrics: Arc<GatewayMetrics>,
) where
    S: Stream<Item = std::result::Result<Message, E>> + Unpin,
    E: Display,
{
    let client_id = client.id();

    loop {
        let next = tokio::select! {
            biased;
            _ = conn_closed.cancelled() => {
                tracing::debug!(client_id, "connection closed; reader exiting");
                break;
            }
            next = tokio::time::timeout(settings.pong_wait, stream.next()) => next,
        };

        let msg = match next {
            Err(_) => {
                tracing::info!(client_id, "read timeout");
                break;
            }
            Ok(None) => {
                tracing::debug!(client_id, "peer went away");
                break;
            }
            Ok(Some(Err(e))) => {
                tracing::debug!(client_id, error = %e, "read failed");
                break;
            }
            Ok(Some(Ok(msg))) => msg,
        };

        let event = match decode(msg) {
            Ok(Inbound::Event(event)) => event,
            Ok(Inbound::Control) => continue,
            Ok(Inbound::Close) => {
                tracing::debug!(client_id, "close frame received");
                break;
            }
            Err(e) => {
                metrics.decode_errors.inc(&[]);
                tracing::warn!(client_id, error = %e, "dropping malformed frame");
                continue;
            }
        };

        let (kind, payload) = match event {
            Event::Subscribe(p) => (SubscriptionKind::Subscribe, p),
            Event::Unsubscribe(p) => (SubscriptionKind::Unsubscribe, p),
            other => {
                tracing::debug!(client_id, event_type = other.event_type(), "ignoring event");
                continue;
            }
        };

        let req = SubscriptionRequest {
            client_id,
            channels: payload.channels,
            kind,
        };
        if let Err(e) = hub.subscribe(req).await {
            tracing::warn!(client_id, error = %e, "subscription not delivered");
            break;
        }
    }

    hub.unregister(client_id);
}

/// Flush the outbound queue to the socket and keep the peer alive with pings.
///
/// Exits when the client scope is cancelled, the queue is closed, or a write
/// fails. On exit `conn_closed` is cancelled.
pub async fn write_pump<K>(
    client: Arc<Client>,
    mut outbound: mpsc::Receiver<Frame>,
    mut sink: K,
    conn_closed: CancellationToken,
    settings: PumpSettings,
) where
    K: Sink<Message> + Unpin,
    K::Error: Display,
{
    let client_id = client.id();
    let scope = client.scope().clone();

    let mut ping = interval_at(Instant::now() + settings.ping_period, settings.ping_period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = scope.cancelled() => {
                tracing::debug!(client_id, "scope cancelled; writer exiting");
                break;
            }
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    let _ = write(&mut sink, Message::Close(None), settings.write_wait).await;
                    tracing::debug!(client_id, "outbound queue closed");
                    break;
                };
                if let Err(e) = write(&mut sink, frame.to_ws_message(), settings.write_wait).await {
                    tracing::debug!(client_id, error = %e, "write failed");
                    break;
                }
            }
            _ = ping.tick() => {
                if let Err(e) = write(&mut sink, Message::Ping(Vec::new()), settings.write_wait).await {
                    tracing::debug!(client_id, error = %e, "ping failed");
                    break;
                }
            }
        }
    }

    conn_closed.cancel();
    let _ = tokio::time::timeout(settings.write_wait, sink.close()).await;
}

async fn write<K>(sink: &mut K, msg: Message, wait: Duration) -> Result<()>
where
    K: Sink<Message> + Unpin,
    K::Error: Display,
{
    match tokio::time::timeout(wait, sink.send(msg)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(RoomcastError::Internal(format!("socket write failed: {e}"))),
        Err(_) => Err(RoomcastError::Internal("socket write timed out".into())),
    }
}
