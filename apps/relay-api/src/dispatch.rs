//! The alert dispatcher: fans one alert out to rooms and notification
//! channels, concurrently, with a per-target outcome so partial failure is
//! observable by the caller.

use std::collections::BTreeSet;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::models::alert::Alert;
use crate::registry::ActorRegistry;

/// Header carrying the shared internal dispatch key.
pub const DISPATCH_KEY_HEADER: &str = "x-dispatch-key";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    pub notification: Alert,
    pub recipients: Vec<String>,
    #[serde(default)]
    pub original_recipients: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub target: String,
    pub kind: &'static str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A user's own degenerate room: the id sorted and joined with itself, the
/// same naming rule direct-message rooms use for a pair of ids.
pub fn self_room(user_id: &str) -> String {
    let mut pair = [user_id, user_id];
    pair.sort_unstable();
    pair.join("-")
}

/// Fan the alert out to every target room and notification channel. All
/// dispatches run concurrently and are all attempted; each produces its own
/// outcome, failures included.
pub async fn dispatch(registry: &ActorRegistry, request: DispatchRequest) -> Vec<DispatchOutcome> {
    // Rooms come from the original recipient list: `channel:` entries name a
    // room directly, plain user ids address that user's self room. Without an
    // original list, the resolved recipients' self rooms are targeted.
    let mut rooms: BTreeSet<String> = BTreeSet::new();
    if request.original_recipients.is_empty() {
        rooms.extend(request.recipients.iter().map(|r| self_room(r)));
    } else {
        for original in &request.original_recipients {
            match original.strip_prefix("channel:") {
                Some(name) => rooms.insert(name.to_string()),
                None => rooms.insert(self_room(original)),
            };
        }
    }
    let users: BTreeSet<String> = request.recipients.into_iter().collect();

    let notification = request.notification;
    let push_body = json!({ "type": "alert_notification", "payload": notification.clone() });

    let room_dispatches = rooms.into_iter().map(|room| {
        let alert = notification.clone();
        let handle = registry.room(&room);
        async move {
            match handle.broadcast_alert(alert).await {
                Ok(delivered) => {
                    tracing::debug!(room = %room, delivered, "alert dispatched to room");
                    DispatchOutcome {
                        target: room,
                        kind: "room",
                        ok: true,
                        error: None,
                    }
                }
                Err(err) => {
                    tracing::warn!(room = %room, ?err, "alert dispatch to room failed");
                    DispatchOutcome {
                        target: room,
                        kind: "room",
                        ok: false,
                        error: Some(err.message),
                    }
                }
            }
        }
    });

    let user_dispatches = users.into_iter().map(|user_id| {
        let body = push_body.clone();
        let handle = registry.notifier(&user_id);
        async move {
            match handle.push(body).await {
                Ok(delivered) => {
                    tracing::debug!(user_id = %user_id, delivered, "alert dispatched to user");
                    DispatchOutcome {
                        target: user_id,
                        kind: "user",
                        ok: true,
                        error: None,
                    }
                }
                Err(err) => {
                    tracing::warn!(user_id = %user_id, ?err, "alert dispatch to user failed");
                    DispatchOutcome {
                        target: user_id,
                        kind: "user",
                        ok: false,
                        error: Some(err.message),
                    }
                }
            }
        }
    });

    let (mut outcomes, user_outcomes) =
        tokio::join!(join_all(room_dispatches), join_all(user_dispatches));
    outcomes.extend(user_outcomes);
    outcomes
}
