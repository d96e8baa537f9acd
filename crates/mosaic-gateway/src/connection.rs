use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use chrono::{SecondsFormat, Utc};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};
use uuid::Uuid;

use mosaic_db::Database;
use mosaic_types::events::{GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Handle a pre-authenticated WebSocket connection. The JWT was already
/// validated at the HTTP upgrade layer, so we go straight to Ready and the
/// event loop. Presence is persisted on connect and disconnect.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    db: Arc<Database>,
    user_id: Uuid,
    username: String,
) {
    let (mut sender, mut receiver) = socket.split();

    info!("{} ({}) connected to gateway", username, user_id);

    // Persist the online flag before anything is delivered.
    {
        let db = db.clone();
        let uid = user_id.to_string();
        match tokio::task::spawn_blocking(move || db.set_online(&uid, true, None)).await {
            Ok(Err(e)) => warn!("presence write failed for {}: {}", user_id, e),
            Err(e) => warn!("presence write join error: {}", e),
            Ok(Ok(())) => {}
        }
    }

    // Send Ready event
    let ready = GatewayEvent::Ready {
        user_id,
        username: username.clone(),
    };
    if sender
        .send(Message::Text(serde_json::to_string(&ready).unwrap().into()))
        .await
        .is_err()
    {
        return;
    }

    let (conn_id, mut user_rx) = dispatcher.register_connection(user_id).await;

    // Subscribe to global broadcasts and relay both streams to this client
    let mut broadcast_rx = dispatcher.subscribe();
    let dispatcher_clone = dispatcher.clone();

    // Shared flag for heartbeat
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} events", n);
                            continue;
                        }
                        Err(_) => break,
                    };
                    let text = serde_json::to_string(&event).unwrap();
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                result = user_rx.recv() => {
                    let event = match result {
                        Some(event) => event,
                        None => break,
                    };
                    let text = serde_json::to_string(&event).unwrap();
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let username_recv = username.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(&dispatcher_clone, user_id, &username_recv, cmd).await;
                    }
                    Err(e) => {
                        warn!(
                            "{} ({}) bad command: {} -- raw: {}",
                            username_recv,
                            user_id,
                            e,
                            &text[..text.len().min(200)]
                        );
                    }
                },
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

    // Only the connection that still owns the slot persists offline state
    // and broadcasts it; a reconnect racing this teardown wins.
    if dispatcher.disconnect(user_id, conn_id).await {
        let last_seen = Utc::now();
        let db = db.clone();
        let uid = user_id.to_string();
        let seen = last_seen.to_rfc3339_opts(SecondsFormat::Micros, true);
        match tokio::task::spawn_blocking(move || db.set_online(&uid, false, Some(seen.as_str()))).await
        {
            Ok(Err(e)) => warn!("presence write failed for {}: {}", user_id, e),
            Err(e) => warn!("presence write join error: {}", e),
            Ok(Ok(())) => {}
        }

        dispatcher.broadcast(GatewayEvent::UserOffline { user_id, last_seen });
    }

    info!("{} ({}) disconnected from gateway", username, user_id);
}

async fn handle_command(
    dispatcher: &Dispatcher,
    user_id: Uuid,
    username: &str,
    cmd: GatewayCommand,
) {
    match cmd {
        GatewayCommand::JoinConversation { conversation_id } => {
            info!("{} ({}) joined conversation {}", username, user_id, conversation_id);
            dispatcher.join_room(conversation_id, user_id).await;
        }

        GatewayCommand::LeaveConversation { conversation_id } => {
            dispatcher.leave_room(conversation_id, user_id).await;
        }

        GatewayCommand::Typing { conversation_id } => {
            dispatcher
                .send_to_room_except(
                    conversation_id,
                    user_id,
                    GatewayEvent::UserTyping {
                        conversation_id,
                        user_id,
                    },
                )
                .await;
        }

        GatewayCommand::StopTyping { conversation_id } => {
            dispatcher
                .send_to_room_except(
                    conversation_id,
                    user_id,
                    GatewayEvent::UserStopTyping {
                        conversation_id,
                        user_id,
                    },
                )
                .await;
        }
    }
}
