//! WebSocket upgrade handler.
//!
//! Authenticates before upgrading, then hands the connection to the hub and
//! starts its two pumps.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{ws::WebSocket, ws::WebSocketUpgrade, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures_util::StreamExt;
use tracing::Instrument;

use roomcast_core::error::RoomcastError;

use crate::app_state::AppState;
use crate::auth::{extract_token, Principal};
use crate::error::HttpError;
use crate::hub::{read_pump, write_pump, Client, PumpSettings};

pub async fn ws_upgrade(
    State(app): State<AppState>,
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let metrics = app.metrics();
    let auth = &app.cfg().auth;

    let Some(token) = extract_token(&headers, &query, &auth.cookie_name, &auth.query_param) else {
        metrics.ws_upgrades.inc(&[("result", "unauthenticated")]);
        return HttpError::from(RoomcastError::Unauthenticated).into_response();
    };

    let principal = match app.verifier().verify(&token).await {
        Ok(p) => p,
        Err(e) => {
            metrics.ws_upgrades.inc(&[("result", "auth_failed")]);
            tracing::info!(error = %e, "websocket auth rejected");
            return HttpError::from(e).into_response();
        }
    };

    let failed = Arc::clone(&metrics);
    let span = tracing::info_span!("ws_session", user_id = %principal.user_id, client_id = tracing::field::Empty);

    ws.max_message_size(app.cfg().gateway.max_message_bytes)
        .on_failed_upgrade(move |e| {
            failed.ws_upgrades.inc(&[("result", "failed")]);
            tracing::warn!(error = %e, "websocket upgrade failed");
        })
        .on_upgrade(move |socket| run_session(app, principal, socket).instrument(span))
}

async fn run_session(app: AppState, principal: Principal, socket: WebSocket) {
    let gw = &app.cfg().gateway;
    let metrics = app.metrics();

    let (client, outbound) = Client::new(
        principal.user_id,
        app.base_scope().child_token(),
        gw.outbound_queue_capacity,
    );
    tracing::Span::current().record("client_id", client.id());

    let hub = app.hub();
    if let Err(e) = hub.register(Arc::clone(&client)).await {
        metrics.ws_upgrades.inc(&[("result", "failed")]);
        tracing::warn!(error = %e, "register failed; dropping connection");
        return;
    }
    metrics.ws_upgrades.inc(&[("result", "ok")]);

    let (sink, stream) = socket.split();
    let conn_closed = client.scope().child_token();
    let settings = PumpSettings::from_config(gw);
    let span = tracing::Span::current();

    tokio::spawn(
        write_pump(Arc::clone(&client), outbound, sink, conn_closed.clone(), settings)
            .instrument(span.clone()),
    );
    tokio::spawn(
        read_pump(client, stream, hub, conn_closed, settings, metrics).instrument(span),
    );
}
