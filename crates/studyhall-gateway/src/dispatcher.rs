use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::debug;
use uuid::Uuid;

use studyhall_types::events::ServerEvent;
use studyhall_types::models::Room;

/// Identifier of one live WebSocket connection.
pub type ConnId = Uuid;

struct ConnectionEntry {
    tx: mpsc::UnboundedSender<ServerEvent>,
    rooms: HashSet<Room>,
}

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnId, ConnectionEntry>,
    /// Reverse index: room -> member connections
    rooms: HashMap<Room, HashSet<ConnId>>,
}

impl Registry {
    fn add_member(&mut self, conn_id: ConnId, room: Room) -> bool {
        let Some(conn) = self.connections.get_mut(&conn_id) else {
            return false;
        };
        conn.rooms.insert(room);
        self.rooms.entry(room).or_default().insert(conn_id);
        true
    }

    fn remove_member(&mut self, conn_id: ConnId, room: &Room) -> bool {
        let Some(conn) = self.connections.get_mut(&conn_id) else {
            return false;
        };
        if !conn.rooms.remove(room) {
            return false;
        }
        if let Some(members) = self.rooms.get_mut(room) {
            members.remove(&conn_id);
            if members.is_empty() {
                self.rooms.remove(room);
            }
        }
        true
    }
}

/// Connection registry and room fan-out. This is the only shared in-memory
/// state of the gateway; delivery is best-effort and at-most-once.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<RwLock<Registry>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection subscribed to `rooms`. Returns (conn_id, receiver).
    pub async fn register(
        &self,
        user_id: Uuid,
        rooms: &[Room],
    ) -> (ConnId, mpsc::UnboundedReceiver<ServerEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut registry = self.inner.write().await;
        registry.connections.insert(
            conn_id,
            ConnectionEntry {
                tx,
                rooms: HashSet::new(),
            },
        );
        for room in rooms {
            registry.add_member(conn_id, *room);
        }
        debug!("Registered connection {} for {} in {} rooms", conn_id, user_id, rooms.len());

        (conn_id, rx)
    }

    /// Drop a connection and all of its room memberships.
    pub async fn unregister(&self, conn_id: ConnId) {
        let mut registry = self.inner.write().await;
        let Some(conn) = registry.connections.remove(&conn_id) else {
            return;
        };
        for room in conn.rooms {
            if let Some(members) = registry.rooms.get_mut(&room) {
                members.remove(&conn_id);
                if members.is_empty() {
                    registry.rooms.remove(&room);
                }
            }
        }
    }

    pub async fn join(&self, conn_id: ConnId, room: Room) -> bool {
        self.inner.write().await.add_member(conn_id, room)
    }

    /// Returns false if the connection did not hold the room.
    pub async fn leave(&self, conn_id: ConnId, room: &Room) -> bool {
        self.inner.write().await.remove_member(conn_id, room)
    }

    pub async fn rooms_of(&self, conn_id: ConnId) -> Vec<Room> {
        self.inner
            .read()
            .await
            .connections
            .get(&conn_id)
            .map(|c| c.rooms.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Send to every connection in `room`. Returns how many were handed the event.
    pub async fn publish(&self, room: &Room, event: ServerEvent) -> usize {
        self.fan_out(room, event, None).await
    }

    /// Send to every connection in `room` except `except`.
    pub async fn publish_except(&self, room: &Room, event: ServerEvent, except: ConnId) -> usize {
        self.fan_out(room, event, Some(except)).await
    }

    /// Send to one connection only (scoped errors, ready).
    pub async fn send_to(&self, conn_id: ConnId, event: ServerEvent) -> bool {
        let registry = self.inner.read().await;
        registry
            .connections
            .get(&conn_id)
            .is_some_and(|c| c.tx.send(event).is_ok())
    }

    /// Deliver to all of a user's connections through their private room.
    pub async fn send_to_user(&self, user_id: Uuid, event: ServerEvent) -> usize {
        self.publish(&Room::User(user_id), event).await
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    async fn fan_out(&self, room: &Room, event: ServerEvent, except: Option<ConnId>) -> usize {
        let registry = self.inner.read().await;
        let Some(members) = registry.rooms.get(room) else {
            return 0;
        };

        let mut delivered = 0;
        for conn_id in members {
            if Some(*conn_id) == except {
                continue;
            }
            if let Some(conn) = registry.connections.get(conn_id) {
                // A closed receiver means the connection is going away
                if conn.tx.send(event.clone()).is_ok() {
                    delivered += 1;
                }
            }
        }
        delivered
    }
}
