//! Shared application state and startup wiring.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use roomcast_core::error::Result;

use crate::auth::{JwtVerifier, TokenVerifier};
use crate::broker::{self, Broker};
use crate::config::GatewayConfig;
use crate::hub::{Hub, HubHandle, HubSettings};
use crate::obs::metrics::GatewayMetrics;
use crate::presence::{self, PresenceStore, PresenceWriter};

/// External collaborators the gateway talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub verifier: Arc<dyn TokenVerifier>,
    pub broker: Arc<dyn Broker>,
    pub presence: Arc<dyn PresenceStore>,
}

impl Collaborators {
    /// Build collaborators from config (JWT secret, broker and presence backends).
    pub async fn connect(cfg: &GatewayConfig) -> Result<Self> {
        Ok(Self {
            verifier: Arc::new(JwtVerifier::new(&cfg.auth.jwt_secret)),
            broker: broker::connect(&cfg.broker).await?,
            presence: presence::connect(&cfg.presence).await?,
        })
    }
}

/// Background tasks the caller must drive: the hub loop and the presence writer.
pub struct Background {
    pub hub: Hub,
    /// Finishes once the hub has exited and every queued presence op is applied.
    pub presence_writer: JoinHandle<()>,
}

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: GatewayConfig,
    hub: HubHandle,
    collaborators: Collaborators,
    metrics: Arc<GatewayMetrics>,
    base_scope: CancellationToken,
}

impl AppState {
    /// Wire state around `collaborators`. Cancelling `base_scope` drains the gateway.
    pub fn new(
        cfg: GatewayConfig,
        collaborators: Collaborators,
        base_scope: CancellationToken,
    ) -> (Self, Background) {
        let metrics = Arc::new(GatewayMetrics::default());
        let (writer, presence_writer) = PresenceWriter::spawn(
            Arc::clone(&collaborators.presence),
            cfg.presence.op_timeout(),
            Arc::clone(&metrics),
        );
        let (hub, handle) = Hub::new(
            Arc::clone(&collaborators.broker),
            writer,
            base_scope.clone(),
            HubSettings::from_config(&cfg.gateway),
            Arc::clone(&metrics),
        );

        let state = Self {
            inner: Arc::new(AppStateInner {
                cfg,
                hub: handle,
                collaborators,
                metrics,
                base_scope,
            }),
        };
        (
            state,
            Background {
                hub,
                presence_writer,
            },
        )
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn hub(&self) -> HubHandle {
        self.inner.hub.clone()
    }

    pub fn verifier(&self) -> Arc<dyn TokenVerifier> {
        Arc::clone(&self.inner.collaborators.verifier)
    }

    /// Broker for in-process producers.
    pub fn broker(&self) -> Arc<dyn Broker> {
        Arc::clone(&self.inner.collaborators.broker)
    }

    pub fn presence(&self) -> Arc<dyn PresenceStore> {
        Arc::clone(&self.inner.collaborators.presence)
    }

    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    pub fn base_scope(&self) -> &CancellationToken {
        &self.inner.base_scope
    }

    pub fn is_draining(&self) -> bool {
        self.inner.base_scope.is_cancelled()
    }
}
