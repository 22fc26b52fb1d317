//! Wire-format frames exchanged with room and notification sockets.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::alert::Alert;
use crate::models::message::Message;
use crate::room::presence::PresenceEntry;

/// Close codes (4000-range for application-level).
pub const CLOSE_AUTH_FAILED: u16 = 4004;
pub const CLOSE_AUTH_TIMEOUT: u16 = 4009;

// ---------------------------------------------------------------------------
// Client → Server payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AuthPayload {
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    #[serde(default)]
    pub thread_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Value>,
    #[serde(default)]
    pub reply_to_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionToggle {
    pub message_id: String,
    pub emoji: String,
    pub user_id: String,
    pub user_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMessagePayload {
    pub message_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdatePayload {
    pub message_id: String,
    pub status: String,
}

/// A `call_invitation` or `call_join` signal, from a socket or the HTTP
/// control surface.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSignal {
    pub call_id: String,
    pub caller_name: String,
    #[serde(default)]
    pub timestamp: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEndPayload {
    pub call_id: String,
    pub duration: u64,
}

// ---------------------------------------------------------------------------
// Server → Client frames
// ---------------------------------------------------------------------------

/// Full-history frame, sent once on connect.
pub fn messages_frame<'a>(messages: impl Iterator<Item = &'a Message>) -> Value {
    json!({ "type": "messages", "messages": messages.collect::<Vec<_>>() })
}

/// Wholesale presence snapshot.
pub fn presence_frame(online_users: &[PresenceEntry]) -> Value {
    json!({ "type": "presence", "onlineUsers": online_users })
}

pub fn message_updated_frame(message: &Message) -> Value {
    json!({ "type": "message_updated", "payload": message })
}

pub fn message_status_update_frame(message_id: &str, status: &str) -> Value {
    json!({
        "type": "message_status_update",
        "payload": { "messageId": message_id, "status": status }
    })
}

pub fn reaction_frame(toggle: &ReactionToggle) -> Value {
    json!({ "type": "reaction", "payload": toggle })
}

pub fn call_session_started_frame(call_session_id: &str) -> Value {
    json!({ "type": "call-session-started", "callSessionId": call_session_id })
}

/// Lightweight alert event: the envelope only, not a full Message.
pub fn alert_notification_frame(alert: &Alert) -> Value {
    json!({ "type": "alert_notification", "alert": alert })
}

/// Error frame preceding an authentication-failure close.
pub fn error_frame(message: &str) -> Value {
    json!({ "error": message })
}
