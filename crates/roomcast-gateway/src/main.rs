//! roomcast gateway binary.
//!
//! - Real-time endpoint: /v1/ws (token via `access_token` cookie or `?token=`)
//! - Ctrl-C drains: readiness flips, the hub tears every client down, and
//!   queued presence removals are flushed before exit.

use std::net::SocketAddr;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, EnvFilter};

use roomcast_core::error::{Result, RoomcastError};
use roomcast_gateway::{
    app_state::{AppState, Collaborators},
    config, router,
};

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = config::load()?;
    let listen: SocketAddr = cfg
        .gateway
        .listen
        .parse()
        .map_err(|e| RoomcastError::BadRequest(format!("gateway.listen is not a socket address: {e}")))?;

    let collaborators = Collaborators::connect(&cfg).await?;
    let base_scope = CancellationToken::new();
    let (state, background) = AppState::new(cfg, collaborators, base_scope.clone());

    let hub = tokio::spawn(background.hub.run());
    let app = router::build_router(state);

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| RoomcastError::Internal(format!("bind {listen} failed: {e}")))?;
    tracing::info!(%listen, "roomcast-gateway starting");

    let shutdown = base_scope.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "ctrl-c handler failed");
            }
            tracing::info!("shutdown requested; draining");
            shutdown.cancel();
        })
        .await
        .map_err(|e| RoomcastError::Internal(format!("server failed: {e}")))?;

    base_scope.cancel();
    if let Err(e) = hub.await {
        tracing::error!(error = %e, "hub task failed");
    }
    if let Err(e) = background.presence_writer.await {
        tracing::error!(error = %e, "presence writer failed");
    }
    tracing::info!("roomcast-gateway stopped");
    Ok(())
}
