//! Per-connection session state, owned by the actor it was created in.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::auth::Identity;

/// What the actor pushes down a connection's outbound channel.
#[derive(Debug)]
pub enum Outbound {
    Frame(String),
    Close { code: u16, reason: &'static str },
}

/// One connected socket plus an optional authenticated identity.
pub struct Session {
    pub id: String,
    pub identity: Option<Identity>,
    pub connected_at: DateTime<Utc>,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl Session {
    pub fn new(id: String, tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            id,
            identity: None,
            connected_at: Utc::now(),
            tx,
        }
    }

    /// Send a frame. Returns `false` when the connection is gone, in which
    /// case the owner drops the session.
    pub fn send(&self, frame: &Value) -> bool {
        self.send_text(frame.to_string())
    }

    pub fn send_text(&self, text: String) -> bool {
        self.tx.send(Outbound::Frame(text)).is_ok()
    }

    /// Ask the connection task to close the socket. Best-effort.
    pub fn close(&self, code: u16, reason: &'static str) {
        let _ = self.tx.send(Outbound::Close { code, reason });
    }

    pub fn user_id(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.id.as_str())
    }
}
