//! Shared helpers for integration tests: a real listening server, token
//! minting, and WebSocket plumbing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::time;
use tokio_tungstenite::tungstenite;

use relay_api::config::Config;
use relay_api::registry::ActorRegistry;
use relay_api::store::{CallSessionStore, MemoryCallStore, MemoryMessageStore, MessageStore};
use relay_api::AppState;

pub const TEST_SECRET: &str = "test-ward-secret";
pub const TEST_DISPATCH_KEY: &str = "test-dispatch-key";

pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Everything a test needs to poke at the server from the outside and the
/// stores from the inside.
pub struct TestContext {
    pub state: AppState,
    pub call_sessions: Arc<MemoryCallStore>,
    pub messages: Arc<MemoryMessageStore>,
}

pub fn test_state() -> TestContext {
    let config = Arc::new(Config {
        token_secret: TEST_SECRET.to_string(),
        dispatch_key: TEST_DISPATCH_KEY.to_string(),
        port: 0,
    });
    let call_sessions = Arc::new(MemoryCallStore::new());
    let messages = Arc::new(MemoryMessageStore::new());
    let registry = Arc::new(ActorRegistry::new(
        config.clone(),
        call_sessions.clone() as Arc<dyn CallSessionStore>,
        messages.clone() as Arc<dyn MessageStore>,
    ));
    TestContext {
        state: AppState { config, registry },
        call_sessions,
        messages,
    }
}

/// Start an actual TCP server for WebSocket testing. The server runs in the
/// background.
pub async fn start_server() -> (SocketAddr, TestContext) {
    let ctx = test_state();
    let app = relay_api::routes::router().with_state(ctx.state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, ctx)
}

/// Mint a token the verifier accepts, signed with the raw test secret.
pub fn mint_token(user_id: &str, display_name: &str) -> String {
    let claims = serde_json::json!({
        "id": user_id,
        "displayName": display_name,
        "exp": chrono::Utc::now().timestamp() + 3600,
    });
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("sign token")
}

/// Connect a WebSocket to a room, optionally with a `token` query parameter.
pub async fn connect_room(addr: SocketAddr, room: &str, token: Option<&str>) -> WsStream {
    let url = match token {
        Some(token) => format!("ws://{addr}/rooms/{room}/ws?token={token}"),
        None => format!("ws://{addr}/rooms/{room}/ws"),
    };
    let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");
    ws_stream
}

/// Connect a WebSocket to a user's notification channel.
pub async fn connect_notify(addr: SocketAddr, user_id: &str, token: Option<&str>) -> WsStream {
    let url = match token {
        Some(token) => format!("ws://{addr}/notify/{user_id}/ws?token={token}"),
        None => format!("ws://{addr}/notify/{user_id}/ws"),
    };
    let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");
    ws_stream
}

/// Send a JSON frame.
pub async fn send_json(ws: &mut WsStream, frame: &serde_json::Value) {
    ws.send(tungstenite::Message::Text(frame.to_string().into()))
        .await
        .expect("send frame");
}

/// Read the next text frame as JSON, skipping pings. Panics after 5 seconds.
pub async fn next_json(ws: &mut WsStream) -> serde_json::Value {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for frame")
            .expect("stream ended")
            .expect("ws read error");
        match msg {
            tungstenite::Message::Text(text) => {
                return serde_json::from_str(&text).expect("parse frame")
            }
            tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// Read frames until the server closes the socket; returns the close code.
pub async fn expect_close(ws: &mut WsStream, within: Duration) -> u16 {
    loop {
        let msg = time::timeout(within, ws.next())
            .await
            .expect("timeout waiting for close")
            .expect("stream ended without close frame")
            .expect("ws read error");
        if let tungstenite::Message::Close(frame) = msg {
            return frame.map(|f| u16::from(f.code)).unwrap_or_default();
        }
    }
}
