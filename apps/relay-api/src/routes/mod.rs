pub mod dispatch;
pub mod health;
pub mod notify;
pub mod rooms;

use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(rooms::router())
        .merge(notify::router())
        .merge(dispatch::router())
}
