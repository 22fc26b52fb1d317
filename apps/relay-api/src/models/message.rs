use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::Identity;

/// Content written over a message when it is deleted.
pub const TOMBSTONE_TEXT: &str = "This message was deleted";

/// Message categories. Serialized as the `type` field of the wire envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Plain,
    Alert,
    CallInvitation,
    CallJoin,
}

/// A user recorded inside an emoji's reaction set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionUser {
    pub user_id: String,
    pub user_name: String,
}

/// Deletion marker. Once set, the original content is gone for good.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tombstone {
    pub by: String,
    pub at: DateTime<Utc>,
}

/// Call-signal details carried by `call_invitation` / `call_join` messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallInfo {
    pub call_id: String,
    pub caller_name: String,
    pub timestamp: i64,
    pub ended: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

/// A room message. Serializes as the bare wire envelope sent to clients
/// (`type` = kind), so new-message broadcasts need no wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sender: Identity,
    pub delivery_status: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reactions: BTreeMap<String, Vec<ReactionUser>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tombstone: Option<Tombstone>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call: Option<CallInfo>,
}

impl Message {
    /// Build a plain chat message with `deliveryStatus: "sent"`.
    pub fn plain(
        id: String,
        sender: Identity,
        content: String,
        thread_id: Option<String>,
        attachments: Vec<Value>,
        reply_to_id: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind: MessageKind::Plain,
            thread_id,
            content,
            attachments,
            reply_to_id,
            created_at,
            sender,
            delivery_status: "sent".to_string(),
            reactions: BTreeMap::new(),
            tombstone: None,
            call: None,
        }
    }

    /// Build an alert-category message from a dispatched alert.
    pub fn alert(id: String, sender: Identity, content: String, created_at: DateTime<Utc>) -> Self {
        Self {
            kind: MessageKind::Alert,
            ..Self::plain(id, sender, content, None, Vec::new(), None, created_at)
        }
    }

    /// Build a call-signal message (`call_invitation` or `call_join`).
    pub fn call_signal(
        id: String,
        kind: MessageKind,
        sender: Identity,
        call: CallInfo,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            call: Some(call),
            ..Self::plain(id, sender, String::new(), None, Vec::new(), None, created_at)
        }
    }

    /// Toggle `{user_id, user_name}` in the given emoji's reaction set.
    /// Adds when absent, removes when present; the emoji key is dropped when
    /// its set becomes empty. Returns `true` when the user was added.
    pub fn toggle_reaction(&mut self, emoji: &str, user_id: &str, user_name: &str) -> bool {
        let set = self.reactions.entry(emoji.to_string()).or_default();
        if let Some(pos) = set.iter().position(|r| r.user_id == user_id) {
            set.remove(pos);
            if set.is_empty() {
                self.reactions.remove(emoji);
            }
            false
        } else {
            set.push(ReactionUser {
                user_id: user_id.to_string(),
                user_name: user_name.to_string(),
            });
            true
        }
    }

    /// Replace the content with the tombstone marker and clear attachments.
    /// Idempotent: a second delete leaves the tombstone untouched.
    pub fn delete(&mut self, by: &str, at: DateTime<Utc>) {
        if self.tombstone.is_some() {
            return;
        }
        self.tombstone = Some(Tombstone {
            by: by.to_string(),
            at,
        });
        self.content = TOMBSTONE_TEXT.to_string();
        self.attachments.clear();
    }

    /// Mark the call carried by this message as ended.
    pub fn end_call(&mut self, duration: u64) {
        if let Some(call) = self.call.as_mut() {
            call.ended = true;
            call.duration = Some(duration);
        }
    }
}
