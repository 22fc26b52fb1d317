//! The room actor: one task per room, owning history, presence, and call
//! state. All mutations happen strictly in turn on the command loop, so the
//! actor needs no locks; concurrency comes from having many rooms.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::mpsc;

use wardline_common::id::{prefix, prefixed_ulid};

use crate::auth::{self, Identity};
use crate::config::Config;
use crate::error::ApiError;
use crate::history::BoundedHistory;
use crate::models::message::{CallInfo, Message, MessageKind};
use crate::room::call::CallLifecycle;
use crate::room::commands::{RoomCommand, RoomHandle};
use crate::room::events::{
    self, AuthPayload, CallEndPayload, CallSignal, DeleteMessagePayload, MessagePayload,
    ReactionToggle, StatusUpdatePayload, CLOSE_AUTH_FAILED,
};
use crate::room::presence::PresenceTracker;
use crate::room::session::{Outbound, Session};
use crate::store::{CallSessionStore, MessageStore};

/// Command mailbox depth per room.
const MAILBOX_CAPACITY: usize = 64;

pub struct RoomActor {
    name: String,
    config: Arc<Config>,
    call_sessions: Arc<dyn CallSessionStore>,
    messages: Arc<dyn MessageStore>,
    rx: mpsc::Receiver<RoomCommand>,
    self_tx: mpsc::Sender<RoomCommand>,
    sessions: Vec<Session>,
    history: BoundedHistory,
    alerts: BoundedHistory,
    presence: PresenceTracker,
    call: CallLifecycle,
}

impl RoomActor {
    /// Spawn the actor task and return its handle.
    pub fn spawn(
        name: String,
        config: Arc<Config>,
        call_sessions: Arc<dyn CallSessionStore>,
        messages: Arc<dyn MessageStore>,
    ) -> RoomHandle {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let actor = Self {
            name,
            config,
            call_sessions,
            messages,
            rx,
            self_tx: tx.clone(),
            sessions: Vec::new(),
            history: BoundedHistory::main(),
            alerts: BoundedHistory::alerts(),
            presence: PresenceTracker::new(),
            call: CallLifecycle::new(),
        };
        tokio::spawn(actor.run());
        RoomHandle::new(tx)
    }

    async fn run(mut self) {
        tracing::info!(room = %self.name, "room actor started");
        while let Some(command) = self.rx.recv().await {
            self.handle(command).await;
        }
    }

    async fn handle(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Connect {
                session_id,
                handle,
                token,
            } => self.on_connect(session_id, handle, token),
            RoomCommand::Frame { session_id, frame } => self.on_frame(session_id, frame).await,
            RoomCommand::Disconnect { session_id } => self.on_disconnect(&session_id),
            RoomCommand::BroadcastAlert {
                mut alert,
                respond_to,
            } => {
                alert.ensure_id();
                let message = alert.to_message(Utc::now());
                self.persist(&message).await;
                self.alerts.append(message);
                self.broadcast(&events::alert_notification_frame(&alert));
                let _ = respond_to.send(self.sessions.len());
            }
            RoomCommand::EndCall {
                call_id,
                duration,
                respond_to,
            } => {
                let _ = respond_to.send(self.end_call_message(&call_id, duration));
            }
            RoomCommand::CallSignal {
                kind,
                signal,
                respond_to,
            } => {
                self.record_call_signal(kind, signal, None).await;
                let _ = respond_to.send(());
            }
            RoomCommand::RecordCreated { result } => match result {
                Ok(record) => {
                    if self.call.record_created(record.id.clone()) {
                        tracing::info!(
                            room = %self.name,
                            call_session_id = %record.id,
                            "call session started"
                        );
                        self.broadcast(&events::call_session_started_frame(&record.id));
                        // The room may have emptied while the create was in
                        // flight.
                        self.maybe_end_call();
                    } else {
                        tracing::warn!(
                            room = %self.name,
                            call_session_id = %record.id,
                            state = ?self.call.state(),
                            "call record created outside of Starting"
                        );
                    }
                }
                Err(err) => {
                    self.call.create_failed();
                    tracing::warn!(room = %self.name, ?err, "call session create failed");
                }
            },
            RoomCommand::RecordClosed {
                call_session_id,
                result,
            } => match result {
                Ok(()) => {
                    self.call.close_complete();
                    tracing::info!(
                        room = %self.name,
                        call_session_id = %call_session_id,
                        "call session closed"
                    );
                }
                Err(err) => {
                    // Keep the reference rather than silently losing it.
                    self.call.close_failed();
                    tracing::warn!(
                        room = %self.name,
                        call_session_id = %call_session_id,
                        ?err,
                        "call session close failed"
                    );
                }
            },
        }
    }

    // -----------------------------------------------------------------------
    // Socket lifecycle
    // -----------------------------------------------------------------------

    fn on_connect(
        &mut self,
        session_id: String,
        handle: mpsc::UnboundedSender<Outbound>,
        token: Option<String>,
    ) {
        let mut session = Session::new(session_id, handle);

        // A token supplied at upgrade time authenticates before any frame can
        // arrive, closing the race where messages precede the auth frame.
        if let Some(token) = token {
            match auth::verify(&token, &self.config.token_secret) {
                Ok(identity) => session.identity = Some(identity),
                Err(err) => {
                    tracing::debug!(room = %self.name, %err, "upgrade token rejected");
                    session.send(&events::error_frame("authentication failed"));
                    session.close(CLOSE_AUTH_FAILED, "authentication failed");
                    return;
                }
            }
        }

        tracing::info!(
            room = %self.name,
            session_id = %session.id,
            authenticated = session.identity.is_some(),
            "room session established"
        );

        session.send(&events::messages_frame(self.history.iter()));
        let identity = session.identity.clone();
        self.sessions.push(session);

        match identity {
            Some(identity) => {
                self.presence.add(&identity);
                self.broadcast_presence();
            }
            None => {
                let frame = events::presence_frame(&self.presence.snapshot());
                if let Some(session) = self.sessions.last() {
                    session.send(&frame);
                }
            }
        }
    }

    fn on_disconnect(&mut self, session_id: &str) {
        let Some(idx) = self.sessions.iter().position(|s| s.id == session_id) else {
            return;
        };
        let session = self.sessions.remove(idx);
        tracing::info!(room = %self.name, session_id = %session.id, "room session ended");
        self.after_session_removed(session.identity);
    }

    // -----------------------------------------------------------------------
    // Inbound frames
    // -----------------------------------------------------------------------

    async fn on_frame(&mut self, session_id: String, frame: Value) {
        let Some(idx) = self.sessions.iter().position(|s| s.id == session_id) else {
            return;
        };

        let kind = frame
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if kind == "auth" {
            let Ok(payload) = serde_json::from_value::<AuthPayload>(frame) else {
                return;
            };
            self.on_auth(idx, &payload.token);
            return;
        }

        // Everything else requires prior authentication.
        let Some(identity) = self.sessions[idx].identity.clone() else {
            self.sessions[idx].send(&events::error_frame("not authenticated"));
            return;
        };

        match kind.as_str() {
            "message" => {
                let payload: MessagePayload = match serde_json::from_value(frame) {
                    Ok(p) => p,
                    Err(err) => {
                        tracing::debug!(room = %self.name, %err, "malformed message payload");
                        return;
                    }
                };
                let message = Message::plain(
                    prefixed_ulid(prefix::MESSAGE),
                    identity,
                    payload.content,
                    payload.thread_id,
                    payload.attachments,
                    payload.reply_to_id,
                    Utc::now(),
                );
                let envelope = serde_json::to_value(&message).unwrap();
                self.history.append(message.clone());
                self.persist(&message).await;
                self.broadcast(&envelope);
            }
            "reaction" => {
                let toggle: ReactionToggle =
                    match serde_json::from_value(frame["payload"].clone()) {
                        Ok(p) => p,
                        Err(err) => {
                            tracing::debug!(room = %self.name, %err, "malformed reaction payload");
                            return;
                        }
                    };
                self.history.update_in_place(&toggle.message_id, |m| {
                    m.toggle_reaction(&toggle.emoji, &toggle.user_id, &toggle.user_name);
                });
                // Relay the raw toggle only; clients recompute reaction state.
                self.broadcast(&events::reaction_frame(&toggle));
            }
            "delete_message" => {
                let payload: DeleteMessagePayload =
                    match serde_json::from_value(frame["payload"].clone()) {
                        Ok(p) => p,
                        Err(_) => return,
                    };
                let updated = self
                    .history
                    .update_in_place(&payload.message_id, |m| {
                        m.delete(&identity.id, Utc::now())
                    })
                    .map(events::message_updated_frame);
                if let Some(frame) = updated {
                    self.broadcast(&frame);
                }
            }
            "message_status_update" => {
                let payload: StatusUpdatePayload =
                    match serde_json::from_value(frame["payload"].clone()) {
                        Ok(p) => p,
                        Err(_) => return,
                    };
                let updated = self
                    .history
                    .update_in_place(&payload.message_id, |m| {
                        m.delivery_status = payload.status.clone();
                    })
                    .is_some();
                if updated {
                    self.broadcast(&events::message_status_update_frame(
                        &payload.message_id,
                        &payload.status,
                    ));
                }
            }
            // Stateless relays: the room never inspects these.
            "typing" | "call" => self.broadcast(&frame),
            "call-start" => self.on_call_start(idx),
            "call_invitation" => {
                if let Ok(signal) = serde_json::from_value::<CallSignal>(frame) {
                    self.record_call_signal(MessageKind::CallInvitation, signal, Some(identity))
                        .await;
                }
            }
            "call_join" => {
                if let Ok(signal) = serde_json::from_value::<CallSignal>(frame) {
                    self.record_call_signal(MessageKind::CallJoin, signal, Some(identity))
                        .await;
                }
            }
            "call_end" => {
                if let Ok(payload) = serde_json::from_value::<CallEndPayload>(frame) {
                    if let Err(err) = self.end_call_message(&payload.call_id, payload.duration) {
                        tracing::debug!(room = %self.name, ?err, "call_end for unknown call");
                    }
                }
            }
            other => {
                tracing::debug!(room = %self.name, kind = %other, "unknown frame type");
            }
        }
    }

    fn on_auth(&mut self, idx: usize, token: &str) {
        match auth::verify(token, &self.config.token_secret) {
            Ok(identity) => {
                tracing::info!(
                    room = %self.name,
                    session_id = %self.sessions[idx].id,
                    user_id = %identity.id,
                    "session authenticated"
                );
                self.sessions[idx].identity = Some(identity.clone());
                self.presence.add(&identity);
                self.broadcast_presence();
            }
            Err(err) => {
                let session = self.sessions.remove(idx);
                tracing::debug!(room = %self.name, session_id = %session.id, %err, "auth failed");
                session.send(&events::error_frame("authentication failed"));
                session.close(CLOSE_AUTH_FAILED, "authentication failed");
                self.after_session_removed(None);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Calls
    // -----------------------------------------------------------------------

    fn on_call_start(&mut self, idx: usize) {
        // Guard synchronously before any I/O: a second call-start while
        // Starting or Active must not create a duplicate record.
        if !self.call.try_start() {
            self.sessions[idx].send(&events::error_frame("call already in progress"));
            return;
        }

        let participants = self.presence.user_ids();
        let store = self.call_sessions.clone();
        let room = self.name.clone();
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            let result = store.create(&room, participants).await;
            let _ = tx.send(RoomCommand::RecordCreated { result }).await;
        });
    }

    /// Record a `call_invitation` / `call_join` signal as a protected-category
    /// message, independent of the call state machine. Deduplicated by id.
    async fn record_call_signal(
        &mut self,
        kind: MessageKind,
        signal: CallSignal,
        sender: Option<Identity>,
    ) {
        let id = match kind {
            MessageKind::CallInvitation => signal.call_id.clone(),
            _ => format!("{}_join_{}", signal.call_id, signal.caller_name),
        };
        if self.history.find(&id).is_some() {
            return;
        }

        let sender = sender.unwrap_or_else(|| Identity {
            id: signal.caller_name.clone(),
            display_name: signal.caller_name.clone(),
            avatar_ref: None,
            role: None,
            org_id: None,
        });
        let call = CallInfo {
            call_id: signal.call_id.clone(),
            caller_name: signal.caller_name.clone(),
            timestamp: signal.timestamp,
            ended: false,
            duration: None,
        };
        let message = Message::call_signal(id, kind, sender, call, Utc::now());
        let envelope = serde_json::to_value(&message).unwrap();
        self.history.append(message.clone());
        self.persist(&message).await;
        self.broadcast(&envelope);
    }

    /// Mark a call invitation ended with its duration.
    fn end_call_message(&mut self, call_id: &str, duration: u64) -> Result<(), ApiError> {
        let updated = self
            .history
            .update_in_place(call_id, |m| m.end_call(duration))
            .map(events::message_updated_frame);
        match updated {
            Some(frame) => {
                self.broadcast(&frame);
                Ok(())
            }
            None => Err(ApiError::not_found("Call invitation not found")),
        }
    }

    /// Close the tracked call session once the room is empty.
    fn maybe_end_call(&mut self) {
        if !self.sessions.is_empty() {
            return;
        }
        if let Some(id) = self.call.begin_ending() {
            let store = self.call_sessions.clone();
            let tx = self.self_tx.clone();
            tokio::spawn(async move {
                let result = store.close(&id, Utc::now()).await;
                let _ = tx
                    .send(RoomCommand::RecordClosed {
                        call_session_id: id,
                        result,
                    })
                    .await;
            });
        }
    }

    // -----------------------------------------------------------------------
    // Fan-out
    // -----------------------------------------------------------------------

    /// Send a frame to every session. A session whose channel is gone is
    /// dropped on the spot; the room never crashes on a dead socket.
    fn broadcast(&mut self, frame: &Value) {
        let text = frame.to_string();
        let mut dropped: Vec<Option<Identity>> = Vec::new();
        self.sessions.retain(|session| {
            if session.send_text(text.clone()) {
                true
            } else {
                dropped.push(session.identity.clone());
                false
            }
        });
        for identity in dropped {
            self.after_session_removed(identity);
        }
    }

    fn broadcast_presence(&mut self) {
        let frame = events::presence_frame(&self.presence.snapshot());
        self.broadcast(&frame);
    }

    /// Shared cleanup after a session leaves, however it left.
    fn after_session_removed(&mut self, identity: Option<Identity>) {
        if let Some(identity) = identity {
            let still_connected = self
                .sessions
                .iter()
                .any(|s| s.user_id() == Some(identity.id.as_str()));
            if !still_connected && self.presence.remove(&identity.id) {
                self.broadcast_presence();
            }
        }
        self.maybe_end_call();
    }

    async fn persist(&self, message: &Message) {
        if let Err(err) = self.messages.persist(&self.name, message).await {
            tracing::warn!(
                room = %self.name,
                message_id = %message.id,
                ?err,
                "message persist failed"
            );
        }
    }
}
