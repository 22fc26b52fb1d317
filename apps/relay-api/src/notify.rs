//! Per-user notification channels.
//!
//! A notification actor is a simpler sibling of the room actor: it keeps no
//! history and tracks no presence, it only forwards notification payloads to
//! every open, authenticated socket belonging to one user. Authentication is
//! enforced by the connection task before a socket ever reaches the actor.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time;

use wardline_common::id::{prefix, prefixed_ulid};

use crate::auth;
use crate::config::Config;
use crate::error::ApiError;
use crate::room::events::{self, AuthPayload, CLOSE_AUTH_FAILED, CLOSE_AUTH_TIMEOUT};
use crate::room::session::Outbound;

/// Window for receiving a valid `auth` frame after connecting (seconds).
pub const AUTH_TIMEOUT_SECS: u64 = 10;

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum NotifyCommand {
    Attach {
        session_id: String,
        handle: mpsc::UnboundedSender<Outbound>,
    },
    Detach {
        session_id: String,
    },
    /// Forward a notification body verbatim to every attached socket.
    /// Responds with the delivered socket count.
    Push {
        body: Value,
        respond_to: oneshot::Sender<usize>,
    },
}

/// Cloneable handle to a notification actor's mailbox.
#[derive(Clone)]
pub struct NotifyHandle {
    tx: mpsc::Sender<NotifyCommand>,
}

impl NotifyHandle {
    async fn send(&self, command: NotifyCommand) -> Result<(), ApiError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| ApiError::internal("Notification actor unavailable"))
    }

    pub async fn attach(
        &self,
        session_id: String,
        handle: mpsc::UnboundedSender<Outbound>,
    ) -> Result<(), ApiError> {
        self.send(NotifyCommand::Attach { session_id, handle }).await
    }

    pub async fn detach(&self, session_id: String) -> Result<(), ApiError> {
        self.send(NotifyCommand::Detach { session_id }).await
    }

    pub async fn push(&self, body: Value) -> Result<usize, ApiError> {
        let (respond_to, response) = oneshot::channel();
        self.send(NotifyCommand::Push { body, respond_to }).await?;
        response
            .await
            .map_err(|_| ApiError::internal("Notification actor dropped the request"))
    }
}

pub struct NotifyActor {
    user_id: String,
    rx: mpsc::Receiver<NotifyCommand>,
    sockets: Vec<(String, mpsc::UnboundedSender<Outbound>)>,
}

impl NotifyActor {
    pub fn spawn(user_id: String) -> NotifyHandle {
        let (tx, rx) = mpsc::channel(64);
        let actor = Self {
            user_id,
            rx,
            sockets: Vec::new(),
        };
        tokio::spawn(actor.run());
        NotifyHandle { tx }
    }

    async fn run(mut self) {
        tracing::info!(user_id = %self.user_id, "notification actor started");
        while let Some(command) = self.rx.recv().await {
            match command {
                NotifyCommand::Attach { session_id, handle } => {
                    self.sockets.push((session_id, handle));
                }
                NotifyCommand::Detach { session_id } => {
                    self.sockets.retain(|(id, _)| *id != session_id);
                }
                NotifyCommand::Push { body, respond_to } => {
                    let text = body.to_string();
                    self.sockets
                        .retain(|(_, tx)| tx.send(Outbound::Frame(text.clone())).is_ok());
                    let _ = respond_to.send(self.sockets.len());
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Connection task
// ---------------------------------------------------------------------------

enum AuthPhase {
    Authenticated,
    Rejected,
    TimedOut,
    Gone,
}

/// Drive one notification socket: authenticate within the window, attach to
/// the actor, then forward pushes until the socket closes.
pub async fn run_connection(
    socket: WebSocket,
    user_id: String,
    handle: NotifyHandle,
    config: Arc<Config>,
    token: Option<String>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    match authenticate(&mut ws_tx, &mut ws_rx, &user_id, &config, token).await {
        AuthPhase::Authenticated => {}
        AuthPhase::Rejected => {
            let _ = send_close(&mut ws_tx, CLOSE_AUTH_FAILED, "authentication failed").await;
            return;
        }
        AuthPhase::TimedOut => {
            tracing::debug!(user_id = %user_id, "notification auth window expired");
            let _ = send_close(&mut ws_tx, CLOSE_AUTH_TIMEOUT, "authentication timeout").await;
            return;
        }
        AuthPhase::Gone => return,
    }

    let session_id = prefixed_ulid(prefix::SESSION);
    let (tx, mut rx) = mpsc::unbounded_channel();
    if handle.attach(session_id.clone(), tx).await.is_err() {
        return;
    }
    tracing::info!(user_id = %user_id, session_id = %session_id, "notification socket attached");

    loop {
        tokio::select! {
            out = rx.recv() => match out {
                Some(Outbound::Frame(text)) => {
                    if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Some(Outbound::Close { code, reason }) => {
                    let _ = send_close(&mut ws_tx, code, reason).await;
                    break;
                }
                None => break,
            },
            msg = ws_rx.next() => match msg {
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(err)) => {
                    tracing::debug!(user_id = %user_id, ?err, "notification socket read error");
                    break;
                }
            },
        }
    }

    let _ = handle.detach(session_id.clone()).await;
    tracing::info!(user_id = %user_id, session_id = %session_id, "notification socket detached");
}

/// Resolve the socket's identity: a query-parameter token wins, otherwise the
/// first `auth` frame within the window. The identity must be the channel
/// owner's.
async fn authenticate(
    ws_tx: &mut SplitSink<WebSocket, WsMessage>,
    ws_rx: &mut SplitStream<WebSocket>,
    user_id: &str,
    config: &Config,
    token: Option<String>,
) -> AuthPhase {
    let identity = if let Some(token) = token {
        match auth::verify(&token, &config.token_secret) {
            Ok(identity) => identity,
            Err(err) => {
                tracing::debug!(user_id = %user_id, %err, "upgrade token rejected");
                let _ = send_frame(ws_tx, &events::error_frame("authentication failed")).await;
                return AuthPhase::Rejected;
            }
        }
    } else {
        match time::timeout(
            Duration::from_secs(AUTH_TIMEOUT_SECS),
            wait_for_auth(ws_rx, config),
        )
        .await
        {
            Ok(Some(Ok(identity))) => identity,
            Ok(Some(Err(()))) => {
                let _ = send_frame(ws_tx, &events::error_frame("authentication failed")).await;
                return AuthPhase::Rejected;
            }
            Ok(None) => return AuthPhase::Gone,
            Err(_timeout) => return AuthPhase::TimedOut,
        }
    };

    if identity.id == user_id {
        AuthPhase::Authenticated
    } else {
        tracing::debug!(
            user_id = %user_id,
            presented = %identity.id,
            "notification auth for a different user"
        );
        let _ = send_frame(ws_tx, &events::error_frame("authentication failed")).await;
        AuthPhase::Rejected
    }
}

/// Read frames until a parseable `auth` frame arrives. `None` means the
/// socket went away first.
async fn wait_for_auth(
    ws_rx: &mut SplitStream<WebSocket>,
    config: &Config,
) -> Option<Result<auth::Identity, ()>> {
    while let Some(msg) = ws_rx.next().await {
        let text = match msg {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        };
        let Ok(frame) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        if frame.get("type").and_then(Value::as_str) != Some("auth") {
            continue;
        }
        let Ok(payload) = serde_json::from_value::<AuthPayload>(frame) else {
            continue;
        };
        return Some(auth::verify(&payload.token, &config.token_secret).map_err(|_| ()));
    }
    None
}

async fn send_frame(
    ws_tx: &mut SplitSink<WebSocket, WsMessage>,
    frame: &Value,
) -> Result<(), axum::Error> {
    ws_tx.send(WsMessage::Text(frame.to_string().into())).await
}

async fn send_close(
    ws_tx: &mut SplitSink<WebSocket, WsMessage>,
    code: u16,
    reason: &str,
) -> Result<(), axum::Error> {
    let close = WsMessage::Close(Some(axum::extract::ws::CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close).await
}
