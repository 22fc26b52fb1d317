//! WebSocket plumbing for room connections: upgrade, then shuttle frames
//! between the socket and the room actor's mailbox.

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;

use wardline_common::id::{prefix, prefixed_ulid};

use crate::room::commands::RoomHandle;
use crate::room::session::Outbound;

/// Drive one room socket. The connection task owns the socket; all room state
/// lives in the actor.
pub async fn run_connection(socket: WebSocket, room: RoomHandle, token: Option<String>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let session_id = prefixed_ulid(prefix::SESSION);

    let (tx, mut rx) = mpsc::unbounded_channel();
    if room
        .connect(session_id.clone(), tx, token)
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            out = rx.recv() => match out {
                Some(Outbound::Frame(text)) => {
                    if ws_tx.send(WsMessage::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Some(Outbound::Close { code, reason }) => {
                    let _ = send_close(&mut ws_tx, code, reason).await;
                    break;
                }
                None => break,
            },
            msg = ws_rx.next() => match msg {
                Some(Ok(WsMessage::Text(text))) => {
                    match serde_json::from_str::<Value>(&text) {
                        Ok(frame) => {
                            if room.frame(session_id.clone(), frame).await.is_err() {
                                break;
                            }
                        }
                        Err(err) => {
                            tracing::debug!(session_id = %session_id, %err, "invalid frame json");
                        }
                    }
                }
                Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => continue,
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Err(err)) => {
                    tracing::debug!(session_id = %session_id, ?err, "room socket read error");
                    break;
                }
                _ => continue,
            },
        }
    }

    let _ = room.disconnect(session_id).await;
}

async fn send_close(
    ws_tx: &mut SplitSink<WebSocket, WsMessage>,
    code: u16,
    reason: &str,
) -> Result<(), axum::Error> {
    let close = WsMessage::Close(Some(axum::extract::ws::CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close).await
}
