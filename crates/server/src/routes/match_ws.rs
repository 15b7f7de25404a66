/// WebSocket match route.
///
/// One socket per participant. Client commands go to the match context;
/// events from the match bus and snapshot publications come back out.
/// The session ends when the socket closes, and leaving the registry is the
/// only cleanup it needs.

use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::Path,
    response::IntoResponse,
    Extension,
};
use chess_core::protocol::{ClientMessage, ServerMessage};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use crate::error::AppError;
use crate::game::registry::{self, MatchRegistry, Membership};

type Sender = futures::stream::SplitSink<WebSocket, Message>;

// ---- WebSocket handler ----

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(match_id): Path<String>,
    Extension(registry): Extension<Arc<MatchRegistry>>,
) -> Result<impl IntoResponse, AppError> {
    registry::validate_match_id(&match_id).map_err(AppError::BadRequest)?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, registry, match_id)))
}

async fn handle_socket(socket: WebSocket, registry: Arc<MatchRegistry>, match_id: String) {
    let (mut sender, mut receiver) = socket.split();
    let mut membership = registry.join(&match_id).await;
    let participant = membership.participant;

    // The welcome already carries the current snapshot.
    membership.snapshots.borrow_and_update();
    if let Err(e) = send_msg(&mut sender, &membership.welcome.to_message()).await {
        tracing::warn!(%match_id, %participant, "Failed to send welcome: {e}");
        registry.leave(membership).await;
        return;
    }

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(t))) => t.to_string(),
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };
                if let Err(e) = handle_client_text(&mut sender, &membership, &text).await {
                    tracing::warn!(%match_id, %participant, "Socket write failed: {e}");
                    break;
                }
            }
            event = membership.events.recv() => {
                let msg = match event {
                    Ok(event) => match event.to_message(participant) {
                        Some(msg) => msg,
                        None => continue,
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        // Missed events cannot be replayed; resend full state instead.
                        tracing::warn!(%match_id, %participant, skipped, "Subscriber lagged, resyncing");
                        membership.context.welcome(participant).await.to_message()
                    }
                    Err(RecvError::Closed) => break,
                };
                if send_msg(&mut sender, &msg).await.is_err() {
                    break;
                }
            }
            changed = membership.snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let fen = membership.snapshots.borrow_and_update().snapshot.as_str().to_string();
                if send_msg(&mut sender, &ServerMessage::Snapshot { fen }).await.is_err() {
                    break;
                }
            }
        }
    }

    let reset = registry.leave(membership).await;
    tracing::info!(%match_id, %participant, reset, "Socket closed");
}

async fn handle_client_text(sender: &mut Sender, membership: &Membership, text: &str) -> Result<()> {
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            return send_msg(
                sender,
                &ServerMessage::Error {
                    message: format!("Invalid message: {}", e),
                },
            )
            .await;
        }
    };

    let context = &membership.context;
    let participant = membership.participant;

    match client_msg {
        ClientMessage::Move { from, to } => {
            if let Err(e) = context.submit_move(participant, &from, &to).await {
                tracing::debug!(match_id = context.id(), %participant, %from, %to, "Move rejected: {e}");
                send_msg(
                    sender,
                    &ServerMessage::MoveRejected {
                        from,
                        to,
                        reason: e.reason().to_string(),
                    },
                )
                .await?;
            }
        }
        ClientMessage::Resign => {
            context.resign(participant).await;
        }
        ClientMessage::NewMatch => {
            if context.side_of(participant).await.is_none() {
                return send_msg(sender, &seated_only("start a new match")).await;
            }
            context.new_match().await;
        }
        ClientMessage::SavePosition => {
            if let Err(e) = context.save_position().await {
                tracing::error!(match_id = context.id(), "Save failed: {e}");
                send_msg(sender, &ServerMessage::Error { message: e.to_string() }).await?;
            }
        }
        ClientMessage::LoadPosition => {
            if context.side_of(participant).await.is_none() {
                return send_msg(sender, &seated_only("load a position")).await;
            }
            if let Err(e) = context.load_position().await {
                tracing::warn!(match_id = context.id(), "Load failed: {e}");
                send_msg(sender, &ServerMessage::Error { message: e.to_string() }).await?;
            }
        }
    }
    Ok(())
}

fn seated_only(action: &str) -> ServerMessage {
    ServerMessage::Error {
        message: format!("Only seated players can {action}"),
    }
}

// ---- Helper: send a message ----

async fn send_msg(sender: &mut Sender, msg: &ServerMessage) -> Result<()> {
    let json = serde_json::to_string(msg)?;
    sender.send(Message::Text(json.into())).await?;
    Ok(())
}
