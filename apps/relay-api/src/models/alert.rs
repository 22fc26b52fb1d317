use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use wardline_common::id::{prefix, prefixed_ulid};

use crate::auth::Identity;
use crate::models::message::Message;

/// Whoever raised an alert. An `id` is mandatory; everything else rides along.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertAuthor {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// An alert envelope as received from the dispatcher or a control request.
/// Transient: it exists only for the duration of a dispatch. Unknown fields
/// are preserved and forwarded verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    pub created_by: AlertAuthor,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Alert {
    /// Make sure the alert carries an id, synthesizing one when absent.
    pub fn ensure_id(&mut self) -> &str {
        if self.id.is_none() {
            self.id = Some(prefixed_ulid(prefix::ALERT));
        }
        self.id.as_deref().unwrap_or_default()
    }

    /// Snapshot the alert into an alert-category room message.
    pub fn to_message(&self, created_at: DateTime<Utc>) -> Message {
        let display_name = self
            .created_by
            .name
            .clone()
            .unwrap_or_else(|| self.created_by.id.clone());
        let sender = Identity {
            id: self.created_by.id.clone(),
            display_name,
            avatar_ref: None,
            role: None,
            org_id: None,
        };
        Message::alert(
            self.id.clone().unwrap_or_default(),
            sender,
            self.message.clone(),
            created_at,
        )
    }
}
