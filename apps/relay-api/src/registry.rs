//! Explicit actor registry: the single place a name resolves to an actor.
//!
//! Constructed once per process and handed to every route via `AppState`.
//! The same name always resolves to the same actor; instances are spawned on
//! first use and handed their configuration and store handles explicitly.

use std::sync::Arc;

use dashmap::DashMap;

use crate::config::Config;
use crate::notify::{NotifyActor, NotifyHandle};
use crate::room::actor::RoomActor;
use crate::room::commands::RoomHandle;
use crate::store::{CallSessionStore, MessageStore};

pub struct ActorRegistry {
    config: Arc<Config>,
    call_sessions: Arc<dyn CallSessionStore>,
    messages: Arc<dyn MessageStore>,
    rooms: DashMap<String, RoomHandle>,
    notifiers: DashMap<String, NotifyHandle>,
}

impl ActorRegistry {
    pub fn new(
        config: Arc<Config>,
        call_sessions: Arc<dyn CallSessionStore>,
        messages: Arc<dyn MessageStore>,
    ) -> Self {
        Self {
            config,
            call_sessions,
            messages,
            rooms: DashMap::new(),
            notifiers: DashMap::new(),
        }
    }

    /// Resolve the room actor for a name, spawning it on first use.
    pub fn room(&self, name: &str) -> RoomHandle {
        self.rooms
            .entry(name.to_string())
            .or_insert_with(|| {
                RoomActor::spawn(
                    name.to_string(),
                    self.config.clone(),
                    self.call_sessions.clone(),
                    self.messages.clone(),
                )
            })
            .clone()
    }

    /// Resolve the notification actor for a user id, spawning it on first use.
    pub fn notifier(&self, user_id: &str) -> NotifyHandle {
        self.notifiers
            .entry(user_id.to_string())
            .or_insert_with(|| NotifyActor::spawn(user_id.to_string()))
            .clone()
    }
}
