use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};

use studyhall_types::events::{ClientEvent, ServerEvent};
use studyhall_types::models::Room;

use crate::access::RoomAccess;
use crate::auth::Identity;
use crate::broker::Broker;
use crate::dispatcher::{ConnId, Dispatcher};
use crate::error::ChatError;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
const MAX_MISSED_PONGS: u8 = 2;

/// Drive one authenticated WebSocket connection until either side goes away.
/// The credential was already checked at the upgrade, so the connection is
/// subscribed to its initial rooms right away.
pub async fn handle_connection(
    socket: WebSocket,
    identity: Identity,
    dispatcher: Dispatcher,
    broker: Broker,
) {
    let rooms = [Room::General, identity.semester_room(), identity.private_room()];
    let (conn_id, mut rx) = dispatcher.register(identity.user_id, &rooms).await;

    info!("{} ({}) connected to gateway", identity.name, identity.user_id);

    dispatcher
        .send_to(
            conn_id,
            ServerEvent::Ready {
                user_id: identity.user_id,
                user_name: identity.name.clone(),
                semester: identity.semester,
                rooms: rooms.to_vec(),
            },
        )
        .await;
    dispatcher
        .publish_except(
            &identity.semester_room(),
            ServerEvent::UserConnected {
                user_id: identity.user_id,
                user_name: identity.name.clone(),
            },
            conn_id,
        )
        .await;

    let (mut sender, mut receiver) = socket.split();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received;

    // Everything bound for this client (room fan-out, scoped errors, pushes)
    // arrives on the connection's own channel.
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_pongs: u8 = 0;

        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            error!("Failed to encode {} event: {}", event.name(), e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_pongs = 0;
                    } else {
                        missed_pongs += 1;
                        if missed_pongs >= MAX_MISSED_PONGS {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_pongs);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let recv_identity = identity.clone();
    let recv_dispatcher = dispatcher.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let event = match serde_json::from_str::<ClientEvent>(&text) {
                        Ok(event) => event,
                        Err(e) => {
                            warn!(
                                "{} ({}) bad event: {} -- raw: {}",
                                recv_identity.name,
                                recv_identity.user_id,
                                e,
                                text.chars().take(200).collect::<String>()
                            );
                            recv_dispatcher
                                .send_to(conn_id, ServerEvent::error("malformed event"))
                                .await;
                            continue;
                        }
                    };

                    if let Err(e) =
                        handle_event(&broker, &recv_dispatcher, &recv_identity, conn_id, event).await
                    {
                        report(&recv_dispatcher, &recv_identity, conn_id, e).await;
                    }
                }
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.unregister(conn_id).await;
    dispatcher
        .publish(
            &identity.semester_room(),
            ServerEvent::UserDisconnected {
                user_id: identity.user_id,
                user_name: identity.name.clone(),
            },
        )
        .await;
    info!("{} ({}) disconnected from gateway", identity.name, identity.user_id);
}

/// Apply one client event on behalf of `conn_id`. Errors are meant for the
/// calling connection only.
pub async fn handle_event(
    broker: &Broker,
    dispatcher: &Dispatcher,
    identity: &Identity,
    conn_id: ConnId,
    event: ClientEvent,
) -> Result<(), ChatError> {
    match event {
        ClientEvent::JoinRoom(raw) => {
            // Unknown or foreign rooms are ignored without an error
            match raw.parse::<Room>() {
                Ok(room) if identity.can_access(&room) => {
                    dispatcher.join(conn_id, room).await;
                }
                _ => debug!("{} ignored join of '{}'", identity.name, raw),
            }
        }

        ClientEvent::LeaveRoom(raw) => {
            if let Ok(room) = raw.parse::<Room>() {
                dispatcher.leave(conn_id, &room).await;
            }
        }

        ClientEvent::SendMessage {
            room,
            message,
            message_type,
            reply_to,
        } => {
            broker.send(identity, &room, &message, message_type, reply_to).await?;
        }

        ClientEvent::EditMessage {
            message_id,
            new_message,
        } => {
            broker.edit(identity, message_id, &new_message).await?;
        }

        ClientEvent::DeleteMessage { message_id } => {
            broker.delete(identity, message_id).await?;
        }

        ClientEvent::AddReaction { message_id, emoji } => {
            broker.react(identity, message_id, &emoji).await?;
        }

        ClientEvent::TypingStart { room } => broker.typing(identity, conn_id, &room, true).await?,

        ClientEvent::TypingStop { room } => broker.typing(identity, conn_id, &room, false).await?,

        ClientEvent::MarkRead { message_id } => {
            broker.mark_read(identity, message_id).await?;
        }
    }
    Ok(())
}

async fn report(dispatcher: &Dispatcher, identity: &Identity, conn_id: ConnId, err: ChatError) {
    match &err {
        ChatError::Storage(cause) => {
            error!("Event from {} ({}) failed: {:#}", identity.name, identity.user_id, cause);
        }
        other => debug!("Rejected event from {}: {}", identity.name, other),
    }
    dispatcher.send_to(conn_id, ServerEvent::error(err.to_string())).await;
}
