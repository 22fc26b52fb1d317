//! External persistence collaborators, specified at their interface boundary.
//!
//! The wider system owns call-session records and long-term message storage
//! in its document database; the relay only talks to them through these
//! traits. Backed by in-memory maps here, the document-store client in
//! production.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wardline_common::id::{prefix, prefixed_ulid};

use crate::error::ApiError;
use crate::models::message::Message;

/// The database-backed record of a call's start and end, referenced from a
/// room only by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSessionRecord {
    pub id: String,
    pub room: String,
    pub participants: Vec<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait CallSessionStore: Send + Sync {
    /// Create a call-session record for a room.
    async fn create(
        &self,
        room: &str,
        participants: Vec<String>,
    ) -> Result<CallSessionRecord, ApiError>;

    /// Set the record's end time.
    async fn close(&self, id: &str, ended_at: DateTime<Utc>) -> Result<(), ApiError>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message or alert for a room. Best-effort from the caller's
    /// point of view.
    async fn persist(&self, room: &str, message: &Message) -> Result<(), ApiError>;
}

// ---------------------------------------------------------------------------
// In-memory implementations (for Phase 1 / tests)
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryCallStore {
    records: Mutex<HashMap<String, CallSessionRecord>>,
}

impl MemoryCallStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<CallSessionRecord> {
        self.records.lock().unwrap().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl CallSessionStore for MemoryCallStore {
    async fn create(
        &self,
        room: &str,
        participants: Vec<String>,
    ) -> Result<CallSessionRecord, ApiError> {
        let record = CallSessionRecord {
            id: prefixed_ulid(prefix::CALL),
            room: room.to_string(),
            participants,
            started_at: Utc::now(),
            ended_at: None,
        };
        self.records
            .lock()
            .unwrap()
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn close(&self, id: &str, ended_at: DateTime<Utc>) -> Result<(), ApiError> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(id)
            .ok_or_else(|| ApiError::not_found("Call session not found"))?;
        record.ended_at = Some(ended_at);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryMessageStore {
    data: Mutex<HashMap<String, Vec<Message>>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn room_messages(&self, room: &str) -> Vec<Message> {
        self.data
            .lock()
            .unwrap()
            .get(room)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn persist(&self, room: &str, message: &Message) -> Result<(), ApiError> {
        self.data
            .lock()
            .unwrap()
            .entry(room.to_string())
            .or_default()
            .push(message.clone());
        Ok(())
    }
}
