#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use roomcast_core::error::{Result, RoomcastError};
use roomcast_gateway::app_state::{AppState, Collaborators};
use roomcast_gateway::auth::JwtVerifier;
use roomcast_gateway::broker::{Broker, BrokerStream, MemoryBroker};
use roomcast_gateway::config::{self, SlowConsumerPolicy};
use roomcast_gateway::hub::{
    Client, Frame, Hub, HubHandle, HubSettings, SubscriptionKind, SubscriptionRequest,
};
use roomcast_gateway::obs::metrics::GatewayMetrics;
use roomcast_gateway::presence::{MemoryPresence, PresenceWriter};
use roomcast_gateway::router::build_router;

pub const SECRET: &str = "test-secret";

/// Poll `cond` until it holds, panicking after two seconds.
pub async fn eventually(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for: {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Broker whose subscriptions always fail.
pub struct FailingBroker;

#[async_trait]
impl Broker for FailingBroker {
    async fn publish(&self, _channel: &str, _payload: Bytes) -> Result<()> {
        Err(RoomcastError::Broker("down".into()))
    }

    async fn subscribe(&self, _scope: CancellationToken, _channels: &[String]) -> Result<BrokerStream> {
        Err(RoomcastError::Broker("down".into()))
    }
}

/// Broker whose subscriptions end immediately, as after a lost connection.
pub struct EndingBroker;

#[async_trait]
impl Broker for EndingBroker {
    async fn publish(&self, _channel: &str, _payload: Bytes) -> Result<()> {
        Ok(())
    }

    async fn subscribe(&self, _scope: CancellationToken, _channels: &[String]) -> Result<BrokerStream> {
        Ok(stream::empty().boxed())
    }
}

pub struct TestHub {
    pub handle: HubHandle,
    pub broker: Arc<MemoryBroker>,
    pub presence: Arc<MemoryPresence>,
    pub metrics: Arc<GatewayMetrics>,
    pub base: CancellationToken,
    pub hub_task: JoinHandle<()>,
    pub writer_task: JoinHandle<()>,
}

impl TestHub {
    pub fn start(policy: SlowConsumerPolicy) -> Self {
        let broker = Arc::new(MemoryBroker::new());
        Self::start_with(broker.clone(), broker, policy)
    }

    pub fn start_with(
        memory: Arc<MemoryBroker>,
        broker: Arc<dyn Broker>,
        policy: SlowConsumerPolicy,
    ) -> Self {
        let presence = Arc::new(MemoryPresence::new());
        let metrics = Arc::new(GatewayMetrics::default());
        let base = CancellationToken::new();

        let (writer, writer_task) =
            PresenceWriter::spawn(presence.clone(), Duration::from_secs(1), metrics.clone());
        let settings = HubSettings {
            register_buffer: 16,
            slow_consumer: policy,
        };
        let (hub, handle) = Hub::new(broker, writer, base.clone(), settings, metrics.clone());
        let hub_task = tokio::spawn(hub.run());

        Self {
            handle,
            broker: memory,
            presence,
            metrics,
            base,
            hub_task,
            writer_task,
        }
    }

    pub async fn connect(&self, user: &str, capacity: usize) -> (Arc<Client>, mpsc::Receiver<Frame>) {
        let (client, rx) = Client::new(user, self.base.child_token(), capacity);
        self.handle.register(client.clone()).await.unwrap();
        (client, rx)
    }

    pub async fn subscribe(&self, client: &Client, channels: &[&str]) {
        self.request(client, channels, SubscriptionKind::Subscribe).await;
    }

    pub async fn unsubscribe(&self, client: &Client, channels: &[&str]) {
        self.request(client, channels, SubscriptionKind::Unsubscribe).await;
    }

    async fn request(&self, client: &Client, channels: &[&str], kind: SubscriptionKind) {
        self.handle
            .subscribe(SubscriptionRequest {
                client_id: client.id(),
                channels: channels.iter().map(|c| c.to_string()).collect(),
                kind,
            })
            .await
            .unwrap();
    }

    pub async fn publish(&self, channel: &str, payload: &'static [u8]) {
        self.broker
            .publish(channel, Bytes::from_static(payload))
            .await
            .unwrap();
    }
}

pub async fn recv_frame(rx: &mut mpsc::Receiver<Frame>) -> Option<Frame> {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .ok()
        .flatten()
}

/// Assert nothing more arrives within a short window.
pub async fn assert_quiet(rx: &mut mpsc::Receiver<Frame>) {
    let got = tokio::time::timeout(Duration::from_millis(150), rx.recv()).await;
    assert!(got.is_err(), "unexpected frame: {got:?}");
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub broker: Arc<MemoryBroker>,
    pub presence: Arc<MemoryPresence>,
    pub jwt: JwtVerifier,
    pub base: CancellationToken,
}

impl TestServer {
    pub async fn start() -> Self {
        let cfg = config::load_from_str(&format!("version: 1\nauth:\n  jwt_secret: {SECRET}\n"))
            .expect("config");

        let broker = Arc::new(MemoryBroker::new());
        let presence = Arc::new(MemoryPresence::new());
        let collaborators = Collaborators {
            verifier: Arc::new(JwtVerifier::new(SECRET)),
            broker: broker.clone(),
            presence: presence.clone(),
        };

        let base = CancellationToken::new();
        let (state, background) = AppState::new(cfg, collaborators, base.clone());
        tokio::spawn(background.hub.run());

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let app = build_router(state.clone());
        let shutdown = base.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await
                .ok();
        });

        Self {
            addr,
            state,
            broker,
            presence,
            jwt: JwtVerifier::new(SECRET),
            base,
        }
    }

    pub fn token(&self, user: &str) -> String {
        self.jwt.issue(user, Duration::from_secs(300)).expect("token")
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/v1/ws", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.base.cancel();
    }
}
