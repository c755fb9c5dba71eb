//! Axum router wiring.

use axum::{routing::get, Router};

use crate::{app_state::AppState, ops, rooms, transport};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/ws", get(transport::ws::ws_upgrade))
        .route("/v1/rooms/:room_id/online", get(rooms::online))
        .route("/healthz", get(ops::healthz))
        .route("/readyz", get(ops::readyz))
        .route("/metrics", get(ops::metrics))
        .with_state(state)
}
