use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, mpsc};
use uuid::Uuid;

use mosaic_types::events::GatewayEvent;

/// Manages all connected clients, their conversation rooms, and event
/// delivery. One connection per user; a reconnect takes the slot over.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Broadcast channel for global events — all connected clients receive them
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// Per-user targeted send channels: user_id -> (conn_id, sender)
    user_channels: RwLock<HashMap<Uuid, (Uuid, mpsc::UnboundedSender<GatewayEvent>)>>,

    /// Room membership: conversation_id -> set of users currently joined
    rooms: RwLock<HashMap<Uuid, HashSet<Uuid>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                user_channels: RwLock::new(HashMap::new()),
                rooms: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to global events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Route an event by its scope: conversation-scoped events go to the
    /// members present in that room, global events to everyone.
    pub async fn dispatch(&self, event: GatewayEvent) {
        match event.conversation_id() {
            Some(conversation_id) => self.send_to_room(conversation_id, event).await,
            None => self.broadcast(event),
        }
    }

    /// Register a connection for a user. Returns (conn_id, receiver).
    /// A newer registration displaces any existing one for the same user.
    pub async fn register_connection(
        &self,
        user_id: Uuid,
    ) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .user_channels
            .write()
            .await
            .insert(user_id, (conn_id, tx));
        (conn_id, rx)
    }

    /// Tear down a connection, but only if conn_id still owns the slot.
    /// Returns true when this call actually disconnected the user — the
    /// caller should then persist offline state and broadcast it. A stale
    /// connection racing a reconnect returns false and touches nothing.
    pub async fn disconnect(&self, user_id: Uuid, conn_id: Uuid) -> bool {
        {
            let mut channels = self.inner.user_channels.write().await;
            match channels.get(&user_id) {
                Some((stored, _)) if *stored == conn_id => {
                    channels.remove(&user_id);
                }
                _ => return false,
            }
        }

        let mut rooms = self.inner.rooms.write().await;
        rooms.retain(|_, members| {
            members.remove(&user_id);
            !members.is_empty()
        });

        true
    }

    /// Send a targeted event to a specific user.
    pub async fn send_to_user(&self, user_id: Uuid, event: GatewayEvent) {
        let channels = self.inner.user_channels.read().await;
        if let Some((_, tx)) = channels.get(&user_id) {
            let _ = tx.send(event);
        }
    }

    pub async fn join_room(&self, conversation_id: Uuid, user_id: Uuid) {
        self.inner
            .rooms
            .write()
            .await
            .entry(conversation_id)
            .or_default()
            .insert(user_id);
    }

    pub async fn leave_room(&self, conversation_id: Uuid, user_id: Uuid) {
        let mut rooms = self.inner.rooms.write().await;
        if let Some(members) = rooms.get_mut(&conversation_id) {
            members.remove(&user_id);
            if members.is_empty() {
                rooms.remove(&conversation_id);
            }
        }
    }

    /// Deliver an event to every member present in a conversation's room.
    pub async fn send_to_room(&self, conversation_id: Uuid, event: GatewayEvent) {
        let rooms = self.inner.rooms.read().await;
        let Some(members) = rooms.get(&conversation_id) else {
            return;
        };
        let channels = self.inner.user_channels.read().await;
        for uid in members {
            if let Some((_, tx)) = channels.get(uid) {
                let _ = tx.send(event.clone());
            }
        }
    }

    /// Same as `send_to_room` but skips the originating user — typing
    /// indicators are not echoed back.
    pub async fn send_to_room_except(
        &self,
        conversation_id: Uuid,
        sender_id: Uuid,
        event: GatewayEvent,
    ) {
        let rooms = self.inner.rooms.read().await;
        let Some(members) = rooms.get(&conversation_id) else {
            return;
        };
        let channels = self.inner.user_channels.read().await;
        for uid in members {
            if *uid == sender_id {
                continue;
            }
            if let Some((_, tx)) = channels.get(uid) {
                let _ = tx.send(event.clone());
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn typing(conversation_id: Uuid, user_id: Uuid) -> GatewayEvent {
        GatewayEvent::UserTyping {
            conversation_id,
            user_id,
        }
    }

    #[tokio::test]
    async fn room_events_reach_joined_members_only() {
        let dispatcher = Dispatcher::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let carol = Uuid::new_v4();
        let conversation = Uuid::new_v4();

        let (_, mut alice_rx) = dispatcher.register_connection(alice).await;
        let (_, mut bob_rx) = dispatcher.register_connection(bob).await;
        let (_, mut carol_rx) = dispatcher.register_connection(carol).await;

        dispatcher.join_room(conversation, alice).await;
        dispatcher.join_room(conversation, bob).await;

        dispatcher
            .send_to_room(conversation, typing(conversation, alice))
            .await;

        assert!(alice_rx.try_recv().is_ok());
        assert!(bob_rx.try_recv().is_ok());
        assert!(carol_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn typing_is_not_echoed_to_sender() {
        let dispatcher = Dispatcher::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let conversation = Uuid::new_v4();

        let (_, mut alice_rx) = dispatcher.register_connection(alice).await;
        let (_, mut bob_rx) = dispatcher.register_connection(bob).await;
        dispatcher.join_room(conversation, alice).await;
        dispatcher.join_room(conversation, bob).await;

        dispatcher
            .send_to_room_except(conversation, alice, typing(conversation, alice))
            .await;

        assert!(alice_rx.try_recv().is_err());
        assert!(bob_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn leave_room_stops_delivery() {
        let dispatcher = Dispatcher::new();
        let alice = Uuid::new_v4();
        let conversation = Uuid::new_v4();

        let (_, mut alice_rx) = dispatcher.register_connection(alice).await;
        dispatcher.join_room(conversation, alice).await;
        dispatcher.leave_room(conversation, alice).await;

        dispatcher
            .send_to_room(conversation, typing(conversation, alice))
            .await;
        assert!(alice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stale_disconnect_does_not_clobber_newer_connection() {
        let dispatcher = Dispatcher::new();
        let alice = Uuid::new_v4();

        let (old_conn, _old_rx) = dispatcher.register_connection(alice).await;
        let (new_conn, mut new_rx) = dispatcher.register_connection(alice).await;

        // The old connection's teardown must not disconnect the new one.
        assert!(!dispatcher.disconnect(alice, old_conn).await);
        dispatcher.send_to_user(alice, typing(Uuid::new_v4(), alice)).await;
        assert!(new_rx.try_recv().is_ok());

        assert!(dispatcher.disconnect(alice, new_conn).await);
    }

    #[tokio::test]
    async fn global_events_are_broadcast_by_dispatch() {
        let dispatcher = Dispatcher::new();
        let mut rx = dispatcher.subscribe();

        let event = GatewayEvent::UserOffline {
            user_id: Uuid::new_v4(),
            last_seen: Utc::now(),
        };
        dispatcher.dispatch(event).await;

        assert!(matches!(rx.try_recv(), Ok(GatewayEvent::UserOffline { .. })));
    }
}
