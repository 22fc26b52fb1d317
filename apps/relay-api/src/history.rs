//! Bounded, category-aware room history.
//!
//! Two tiers share one implementation: the main history (cap 500) protects
//! threaded replies and call/alert messages from eviction, while the alert
//! store (cap 50) is a plain FIFO window.

use std::collections::VecDeque;

use crate::models::message::{Message, MessageKind};

/// Main history cap per room.
pub const MAIN_HISTORY_CAP: usize = 500;

/// Alert-store cap per room.
pub const ALERT_HISTORY_CAP: usize = 50;

/// Predicate used by the main history: threaded replies and alert/call
/// messages are preferentially retained.
pub fn is_protected(message: &Message) -> bool {
    message.thread_id.is_some()
        || matches!(
            message.kind,
            MessageKind::Alert | MessageKind::CallInvitation | MessageKind::CallJoin
        )
}

fn nothing_protected(_: &Message) -> bool {
    false
}

/// An ordered, size-capped message sequence with a pluggable eviction shield.
pub struct BoundedHistory {
    entries: VecDeque<Message>,
    cap: usize,
    protected: fn(&Message) -> bool,
}

impl BoundedHistory {
    pub fn new(cap: usize, protected: fn(&Message) -> bool) -> Self {
        Self {
            entries: VecDeque::new(),
            cap,
            protected,
        }
    }

    /// The main chat history for a room.
    pub fn main() -> Self {
        Self::new(MAIN_HISTORY_CAP, is_protected)
    }

    /// The alert-only store: smaller cap, straight FIFO.
    pub fn alerts() -> Self {
        Self::new(ALERT_HISTORY_CAP, nothing_protected)
    }

    /// Append a message and prune back under the cap.
    pub fn append(&mut self, message: Message) {
        self.entries.push_back(message);
        self.prune();
    }

    /// Evict until `len <= cap`: oldest unprotected entry first, falling back
    /// to the absolute oldest when everything left is protected.
    pub fn prune(&mut self) {
        while self.entries.len() > self.cap {
            match self.entries.iter().position(|m| !(self.protected)(m)) {
                Some(idx) => {
                    self.entries.remove(idx);
                }
                None => {
                    self.entries.pop_front();
                }
            }
        }
    }

    pub fn find(&self, id: &str) -> Option<&Message> {
        self.entries.iter().find(|m| m.id == id)
    }

    /// Mutate a message in place, returning a borrow of the updated message.
    pub fn update_in_place<F>(&mut self, id: &str, mutate: F) -> Option<&Message>
    where
        F: FnOnce(&mut Message),
    {
        let message = self.entries.iter_mut().find(|m| m.id == id)?;
        mutate(message);
        Some(message)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Identity;
    use chrono::Utc;

    fn sender() -> Identity {
        Identity {
            id: "u1".to_string(),
            display_name: "Alice".to_string(),
            avatar_ref: None,
            role: None,
            org_id: None,
        }
    }

    fn plain(id: &str) -> Message {
        Message::plain(
            id.to_string(),
            sender(),
            format!("content {id}"),
            None,
            Vec::new(),
            None,
            Utc::now(),
        )
    }

    fn threaded(id: &str) -> Message {
        Message::plain(
            id.to_string(),
            sender(),
            format!("content {id}"),
            Some("thread-1".to_string()),
            Vec::new(),
            None,
            Utc::now(),
        )
    }

    #[test]
    fn cap_holds_after_every_append() {
        let mut history = BoundedHistory::new(5, is_protected);
        for i in 0..20 {
            history.append(plain(&format!("msg_{i}")));
            assert!(history.len() <= 5);
        }
    }

    #[test]
    fn appending_501_plain_messages_keeps_the_newest_500() {
        let mut history = BoundedHistory::main();
        for i in 0..501 {
            history.append(plain(&format!("msg_{i}")));
        }
        assert_eq!(history.len(), 500);
        assert!(history.find("msg_0").is_none());
        assert!(history.find("msg_1").is_some());
        assert!(history.find("msg_500").is_some());
    }

    #[test]
    fn eviction_skips_protected_entries() {
        let mut history = BoundedHistory::new(3, is_protected);
        history.append(threaded("thread_reply"));
        history.append(plain("old_plain"));
        history.append(plain("new_plain"));
        history.append(plain("newest_plain"));

        // The threaded reply is older but survives; the oldest plain goes.
        assert_eq!(history.len(), 3);
        assert!(history.find("thread_reply").is_some());
        assert!(history.find("old_plain").is_none());
    }

    #[test]
    fn protected_entries_evicted_only_when_nothing_else_remains() {
        let mut history = BoundedHistory::new(2, is_protected);
        history.append(threaded("t1"));
        history.append(threaded("t2"));
        history.append(threaded("t3"));

        assert_eq!(history.len(), 2);
        assert!(history.find("t1").is_none());
        assert!(history.find("t2").is_some());
        assert!(history.find("t3").is_some());
    }

    #[test]
    fn alert_store_is_plain_fifo() {
        let mut alerts = BoundedHistory::alerts();
        for i in 0..(ALERT_HISTORY_CAP + 10) {
            let mut msg = plain(&format!("alrt_{i}"));
            msg.kind = MessageKind::Alert;
            alerts.append(msg);
        }
        assert_eq!(alerts.len(), ALERT_HISTORY_CAP);
        // Alert kind is protected in the main store but not here.
        assert!(alerts.find("alrt_9").is_none());
        assert!(alerts.find("alrt_10").is_some());
    }

    #[test]
    fn update_in_place_mutates_and_returns_message() {
        let mut history = BoundedHistory::main();
        history.append(plain("msg_1"));

        let updated = history
            .update_in_place("msg_1", |m| m.delivery_status = "read".to_string())
            .unwrap();
        assert_eq!(updated.delivery_status, "read");
        assert!(history.update_in_place("missing", |_| {}).is_none());
    }
}
