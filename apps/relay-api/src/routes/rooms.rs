//! Room endpoints: the WebSocket upgrade and the HTTP control surface.

use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::models::alert::Alert;
use crate::models::message::MessageKind;
use crate::room::events::{CallEndPayload, CallSignal};
use crate::room::socket;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms/{room}/ws", get(ws_upgrade))
        // Call UIs connect through their own path but land in the same room.
        .route("/call/{room}/ws", get(ws_upgrade))
        .route("/rooms/{room}/broadcast", post(broadcast_alert))
        .route("/rooms/{room}/call-end", post(call_end))
        .route("/rooms/{room}/call-invitation", post(call_invitation))
        .route("/rooms/{room}/event", post(room_event))
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

// ---------------------------------------------------------------------------
// GET /rooms/{room}/ws
// ---------------------------------------------------------------------------

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Path(room): Path<String>,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let handle = state.registry.room(&room);
    ws.on_upgrade(move |socket| socket::run_connection(socket, handle, query.token))
}

// ---------------------------------------------------------------------------
// POST /rooms/{room}/broadcast
// ---------------------------------------------------------------------------

async fn broadcast_alert(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let alert: Alert = serde_json::from_value(body.get("alert").cloned().unwrap_or(Value::Null))
        .map_err(|_| ApiError::bad_request("Alert requires a createdBy id"))?;
    let delivered = state.registry.room(&room).broadcast_alert(alert).await?;
    Ok(Json(json!({ "delivered": delivered })))
}

// ---------------------------------------------------------------------------
// POST /rooms/{room}/call-end
// ---------------------------------------------------------------------------

async fn call_end(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Json(body): Json<CallEndPayload>,
) -> Result<Json<Value>, ApiError> {
    state
        .registry
        .room(&room)
        .end_call(body.call_id, body.duration)
        .await?;
    Ok(Json(json!({ "ok": true })))
}

// ---------------------------------------------------------------------------
// POST /rooms/{room}/call-invitation
// ---------------------------------------------------------------------------

async fn call_invitation(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Json(body): Json<CallSignal>,
) -> Result<Json<Value>, ApiError> {
    state
        .registry
        .room(&room)
        .call_signal(MessageKind::CallInvitation, body)
        .await?;
    Ok(Json(json!({ "ok": true })))
}

// ---------------------------------------------------------------------------
// POST /rooms/{room}/event — generic typed body, same semantics as the
// dedicated routes.
// ---------------------------------------------------------------------------

async fn room_event(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let handle = state.registry.room(&room);
    match body.get("type").and_then(Value::as_str) {
        Some("call_end") => {
            let payload: CallEndPayload = serde_json::from_value(body.clone())
                .map_err(|_| ApiError::bad_request("Malformed call_end body"))?;
            handle.end_call(payload.call_id, payload.duration).await?;
        }
        Some("call_invitation") => {
            let signal: CallSignal = serde_json::from_value(body.clone())
                .map_err(|_| ApiError::bad_request("Malformed call_invitation body"))?;
            handle
                .call_signal(MessageKind::CallInvitation, signal)
                .await?;
        }
        Some("call_join") => {
            let signal: CallSignal = serde_json::from_value(body.clone())
                .map_err(|_| ApiError::bad_request("Malformed call_join body"))?;
            handle.call_signal(MessageKind::CallJoin, signal).await?;
        }
        _ => return Err(ApiError::bad_request("Unsupported event type")),
    }
    Ok(Json(json!({ "ok": true })))
}
