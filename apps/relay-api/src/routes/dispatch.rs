//! Router-level alert dispatch, guarded by the shared internal key.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::dispatch::{dispatch, DispatchRequest, DISPATCH_KEY_HEADER};
use crate::error::ApiError;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/broadcast-alert", post(broadcast_alert))
}

async fn broadcast_alert(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<DispatchRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let presented = headers
        .get(DISPATCH_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    if presented != Some(state.config.dispatch_key.as_str()) {
        return Err(ApiError::unauthorized("Missing or invalid dispatch key"));
    }

    let results = dispatch(&state.registry, request).await;
    Ok((StatusCode::ACCEPTED, Json(json!({ "results": results }))))
}
