use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use roomcast_core::error::{Result, RoomcastError};
use roomcast_core::protocol::room_id_of;

use crate::broker::Broker;
use crate::config::{GatewaySection, SlowConsumerPolicy};
use crate::obs::metrics::GatewayMetrics;
use crate::presence::PresenceWriter;

use super::bridge::BridgeContext;
use super::client::{Client, ClientId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    Subscribe,
    Unsubscribe,
}

/// A batch of channels to add to or remove from one client, applied atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRequest {
    pub client_id: ClientId,
    pub channels: Vec<String>,
    pub kind: SubscriptionKind,
}

#[derive(Debug, Clone, Copy)]
pub struct HubSettings {
    /// Capacity of the register and subscribe channels.
    pub register_buffer: usize,
    pub slow_consumer: SlowConsumerPolicy,
}

impl HubSettings {
    pub fn from_config(gw: &GatewaySection) -> Self {
        Self {
            register_buffer: gw.register_buffer,
            slow_consumer: gw.slow_consumer,
        }
    }
}

impl Default for HubSettings {
    fn default() -> Self {
        Self::from_config(&GatewaySection::default())
    }
}

type Registration = (Arc<Client>, oneshot::Sender<()>);

/// Sending side of the hub. Cheap to clone.
#[derive(Clone)]
pub struct HubHandle {
    register_tx: mpsc::Sender<Registration>,
    unregister_tx: mpsc::UnboundedSender<ClientId>,
    subscribe_tx: mpsc::Sender<SubscriptionRequest>,
}

impl HubHandle {
    /// Hand a client to the hub and wait until it is in the registry.
    ///
    /// Anything sent for this client after `register` returns is processed
    /// after the registration. Waits while the register channel is full.
    pub async fn register(&self, client: Arc<Client>) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.register_tx
            .send((client, ack_tx))
            .await
            .map_err(|_| RoomcastError::Internal("hub is not running".into()))?;
        ack_rx
            .await
            .map_err(|_| RoomcastError::Internal("hub stopped before registering".into()))
    }

    /// Request teardown. Never blocks; safe to call any number of times.
    pub fn unregister(&self, client_id: ClientId) {
        if self.unregister_tx.send(client_id).is_err() {
            tracing::debug!(client_id, "hub gone; unregister dropped");
        }
    }

    pub async fn subscribe(&self, req: SubscriptionRequest) -> Result<()> {
        self.subscribe_tx
            .send(req)
            .await
            .map_err(|_| RoomcastError::Internal("hub is not running".into()))
    }
}

struct Bridge {
    channels: BTreeSet<String>,
    scope: CancellationToken,
}

struct ClientEntry {
    client: Arc<Client>,
    channels: BTreeSet<String>,
    bridges: Vec<Bridge>,
}

impl ClientEntry {
    fn in_room(&self, room: &str) -> bool {
        self.channels.iter().any(|c| room_id_of(c) == Some(room))
    }

    fn rooms(&self) -> BTreeSet<&str> {
        self.channels.iter().filter_map(|c| room_id_of(c)).collect()
    }
}

/// Single coordinator for client lifecycle and subscriptions.
///
/// The registry is owned by the task running [`Hub::run`] and touched by
/// nothing else, so it needs no lock. Registration is acknowledged and a
/// client's pumps start only after the ack, so nothing about a client can be
/// processed before the client itself. The three input channels are polled
/// fairly.
pub struct Hub {
    registry: HashMap<ClientId, ClientEntry>,
    register_rx: mpsc::Receiver<Registration>,
    unregister_rx: mpsc::UnboundedReceiver<ClientId>,
    subscribe_rx: mpsc::Receiver<SubscriptionRequest>,
    bridges: BridgeContext,
    presence: PresenceWriter,
    base_scope: CancellationToken,
    metrics: Arc<GatewayMetrics>,
}

impl Hub {
    pub fn new(
        broker: Arc<dyn Broker>,
        presence: PresenceWriter,
        base_scope: CancellationToken,
        settings: HubSettings,
        metrics: Arc<GatewayMetrics>,
    ) -> (Self, HubHandle) {
        let (register_tx, register_rx) = mpsc::channel(settings.register_buffer);
        let (unregister_tx, unregister_rx) = mpsc::unbounded_channel();
        let (subscribe_tx, subscribe_rx) = mpsc::channel(settings.register_buffer);

        let hub = Self {
            registry: HashMap::new(),
            register_rx,
            unregister_rx,
            subscribe_rx,
            bridges: BridgeContext {
                broker,
                metrics: metrics.clone(),
                unregister_tx: unregister_tx.clone(),
                slow_consumer: settings.slow_consumer,
            },
            presence,
            base_scope,
            metrics,
        };
        let handle = HubHandle {
            register_tx,
            unregister_tx,
            subscribe_tx,
        };
        (hub, handle)
    }

    /// Process requests until the base scope is cancelled, then tear down
    /// every remaining client.
    pub async fn run(mut self) {
        tracing::info!("hub started");
        while !self.base_scope.is_cancelled() {
            tokio::select! {
                _ = self.base_scope.cancelled() => break,
                Some((client, ack)) = self.register_rx.recv() => {
                    let id = client.id();
                    self.handle_register(client);
                    if ack.send(()).is_err() {
                        // The caller gave up; no pumps will ever run for it.
                        self.handle_unregister(id);
                    }
                }
                Some(id) = self.unregister_rx.recv() => self.handle_unregister(id),
                Some(req) = self.subscribe_rx.recv() => self.handle_subscribe(req),
                else => break,
            }
        }
        self.shutdown();
    }

    fn handle_register(&mut self, client: Arc<Client>) {
        let id = client.id();
        tracing::info!(client_id = id, user_id = %client.user_id(), "client registered");
        self.metrics.clients_active.inc(&[]);
        self.registry.insert(
            id,
            ClientEntry {
                client,
                channels: BTreeSet::new(),
                bridges: Vec::new(),
            },
        );
    }

    fn handle_unregister(&mut self, id: ClientId) {
        let Some(entry) = self.registry.remove(&id) else {
            tracing::debug!(client_id = id, "unregister for unknown client ignored");
            return;
        };

        entry.client.scope().cancel();

        let user = entry.client.user_id();
        for room in entry.rooms() {
            self.presence.remove(room, user);
        }

        entry.client.outbound().close();
        self.metrics.clients_active.dec(&[]);

        tracing::info!(
            client_id = id,
            user_id = %user,
            channels = entry.channels.len(),
            "client unregistered"
        );
    }

    fn handle_subscribe(&mut self, req: SubscriptionRequest) {
        let Some(entry) = self.registry.get_mut(&req.client_id) else {
            tracing::debug!(client_id = req.client_id, "subscription for unknown client ignored");
            return;
        };

        match req.kind {
            SubscriptionKind::Subscribe => {
                let mut fresh = Vec::new();
                for channel in req.channels {
                    if entry.channels.contains(&channel) {
                        continue;
                    }
                    if let Some(room) = room_id_of(&channel) {
                        if !entry.in_room(room) {
                            self.presence.add(room, entry.client.user_id());
                        }
                    }
                    entry.channels.insert(channel.clone());
                    fresh.push(channel);
                }

                if fresh.is_empty() {
                    tracing::debug!(client_id = req.client_id, "subscribe added no new channels");
                    return;
                }

                tracing::info!(
                    client_id = req.client_id,
                    user_id = %entry.client.user_id(),
                    channels = ?fresh,
                    "subscribed"
                );
                let scope = entry.client.scope().child_token();
                entry.bridges.push(Bridge {
                    channels: fresh.iter().cloned().collect(),
                    scope: scope.clone(),
                });
                self.bridges.spawn(entry.client.clone(), fresh, scope);
            }
            SubscriptionKind::Unsubscribe => {
                let removed: BTreeSet<String> = req
                    .channels
                    .into_iter()
                    .filter(|c| entry.channels.remove(c))
                    .collect();

                if removed.is_empty() {
                    return;
                }

                let left_rooms: BTreeSet<&str> = removed.iter().filter_map(|c| room_id_of(c)).collect();
                for room in left_rooms {
                    if !entry.in_room(room) {
                        self.presence.remove(room, entry.client.user_id());
                    }
                }

                // Stop every bridge that carried a removed channel and
                // re-bridge whatever else it carried. Publishes on the kept
                // channels between the cancel and the new subscription are
                // not delivered (no backlog), same as for a fresh SUBSCRIBE.
                let mut respawn = Vec::new();
                entry.bridges.retain(|bridge| {
                    if bridge.channels.is_disjoint(&removed) {
                        return true;
                    }
                    bridge.scope.cancel();
                    let rest: Vec<String> = bridge.channels.difference(&removed).cloned().collect();
                    if !rest.is_empty() {
                        respawn.push(rest);
                    }
                    false
                });

                for rest in respawn {
                    let scope = entry.client.scope().child_token();
                    entry.bridges.push(Bridge {
                        channels: rest.iter().cloned().collect(),
                        scope: scope.clone(),
                    });
                    self.bridges.spawn(entry.client.clone(), rest, scope);
                }

                tracing::info!(
                    client_id = req.client_id,
                    user_id = %entry.client.user_id(),
                    channels = ?removed,
                    "unsubscribed"
                );
            }
        }
    }

    fn shutdown(&mut self) {
        let ids: Vec<ClientId> = self.registry.keys().copied().collect();
        tracing::info!(clients = ids.len(), "hub shutting down");
        for id in ids {
            self.handle_unregister(id);
        }
    }
}
