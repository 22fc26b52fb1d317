//! Notification-channel endpoints.

use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::notify;
use crate::routes::rooms::WsQuery;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notify/{user_id}/ws", get(ws_upgrade))
        .route(
            "/notify/{user_id}/broadcast-notification",
            post(broadcast_notification),
        )
}

// ---------------------------------------------------------------------------
// GET /notify/{user_id}/ws
// ---------------------------------------------------------------------------

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Path(user_id): Path<String>,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let handle = state.registry.notifier(&user_id);
    let config = state.config.clone();
    ws.on_upgrade(move |socket| {
        notify::run_connection(socket, user_id, handle, config, query.token)
    })
}

// ---------------------------------------------------------------------------
// POST /notify/{user_id}/broadcast-notification
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PushRequest {
    #[serde(rename = "type")]
    pub type_: String,
    pub payload: Value,
}

async fn broadcast_notification(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<PushRequest>,
) -> Result<Json<Value>, ApiError> {
    let delivered = state
        .registry
        .notifier(&user_id)
        .push(json!({ "type": body.type_, "payload": body.payload }))
        .await?;
    Ok(Json(json!({ "delivered": delivered })))
}
