//! Room read endpoints backed by the presence store.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::app_state::AppState;
use crate::error::HttpError;

#[derive(Debug, Serialize)]
pub struct OnlineUsers {
    pub room_id: String,
    pub user_ids: Vec<String>,
}

/// `GET /v1/rooms/:room_id/online`
pub async fn online(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<OnlineUsers>, HttpError> {
    let mut user_ids: Vec<String> = state
        .presence()
        .list_online(&room_id)
        .await?
        .into_iter()
        .collect();
    user_ids.sort();

    Ok(Json(OnlineUsers { room_id, user_ids }))
}
