//! Command protocol for room actors.
//!
//! Everything that touches room state goes through the actor's mailbox;
//! request-reply commands carry a `oneshot` response channel.

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::error::ApiError;
use crate::models::alert::Alert;
use crate::models::message::MessageKind;
use crate::room::events::CallSignal;
use crate::room::session::Outbound;
use crate::store::CallSessionRecord;

#[derive(Debug)]
pub enum RoomCommand {
    /// A socket finished its upgrade. `token` is the optional pre-auth query
    /// parameter.
    Connect {
        session_id: String,
        handle: mpsc::UnboundedSender<Outbound>,
        token: Option<String>,
    },
    /// An inbound frame from a connected socket, already parsed to JSON.
    Frame { session_id: String, frame: Value },
    Disconnect { session_id: String },

    /// HTTP control surface: fan an alert out to every session in the room.
    /// Responds with the delivered session count.
    BroadcastAlert {
        alert: Alert,
        respond_to: oneshot::Sender<usize>,
    },
    /// HTTP control surface: mark a call invitation ended.
    EndCall {
        call_id: String,
        duration: u64,
        respond_to: oneshot::Sender<Result<(), ApiError>>,
    },
    /// HTTP control surface: record a `call_invitation` / `call_join` signal.
    CallSignal {
        kind: MessageKind,
        signal: CallSignal,
        respond_to: oneshot::Sender<()>,
    },

    /// Internal: the external call-session create finished.
    RecordCreated {
        result: Result<CallSessionRecord, ApiError>,
    },
    /// Internal: the external call-session close finished.
    RecordClosed {
        call_session_id: String,
        result: Result<(), ApiError>,
    },
}

/// Cloneable handle to a room actor's mailbox.
#[derive(Clone)]
pub struct RoomHandle {
    tx: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub(crate) fn new(tx: mpsc::Sender<RoomCommand>) -> Self {
        Self { tx }
    }

    pub(crate) async fn send(&self, command: RoomCommand) -> Result<(), ApiError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| ApiError::internal("Room actor unavailable"))
    }

    pub async fn connect(
        &self,
        session_id: String,
        handle: mpsc::UnboundedSender<Outbound>,
        token: Option<String>,
    ) -> Result<(), ApiError> {
        self.send(RoomCommand::Connect {
            session_id,
            handle,
            token,
        })
        .await
    }

    pub async fn frame(&self, session_id: String, frame: Value) -> Result<(), ApiError> {
        self.send(RoomCommand::Frame { session_id, frame }).await
    }

    pub async fn disconnect(&self, session_id: String) -> Result<(), ApiError> {
        self.send(RoomCommand::Disconnect { session_id }).await
    }

    pub async fn broadcast_alert(&self, alert: Alert) -> Result<usize, ApiError> {
        let (respond_to, response) = oneshot::channel();
        self.send(RoomCommand::BroadcastAlert { alert, respond_to })
            .await?;
        response
            .await
            .map_err(|_| ApiError::internal("Room actor dropped the request"))
    }

    pub async fn end_call(&self, call_id: String, duration: u64) -> Result<(), ApiError> {
        let (respond_to, response) = oneshot::channel();
        self.send(RoomCommand::EndCall {
            call_id,
            duration,
            respond_to,
        })
        .await?;
        response
            .await
            .map_err(|_| ApiError::internal("Room actor dropped the request"))?
    }

    pub async fn call_signal(&self, kind: MessageKind, signal: CallSignal) -> Result<(), ApiError> {
        let (respond_to, response) = oneshot::channel();
        self.send(RoomCommand::CallSignal {
            kind,
            signal,
            respond_to,
        })
        .await?;
        response
            .await
            .map_err(|_| ApiError::internal("Room actor dropped the request"))
    }
}
