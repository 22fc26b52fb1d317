pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod history;
pub mod models;
pub mod notify;
pub mod registry;
pub mod room;
pub mod routes;
pub mod store;

use std::sync::Arc;

use config::Config;
use registry::ActorRegistry;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<ActorRegistry>,
}
