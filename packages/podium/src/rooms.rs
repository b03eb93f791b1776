//! Room Multiplexer
//!
//! Connections subscribe to typed rooms; publishing to a room pushes the event
//! onto each member's outbound queue. Each connection has exactly one FIFO
//! queue, so events from one publisher arrive in the order they were sent.

use std::collections::HashMap;
use std::fmt;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::broker::ServerEvent;
use crate::session::{MultiplexId, RemoteId};

/// Unique per accepted connection.
pub type ConnectionId = Uuid;

/// Room address. Each audience is its own variant, so a remote id can never
/// collide with a multiplex id even if their strings match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoomKey {
    /// The presenter itself; remote controllers publish commands here
    Presenter(RemoteId),
    /// Remote controllers of a session; the presenter publishes status here
    Remote(RemoteId),
    /// Followers mirroring a session
    Multiplex(MultiplexId),
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Presenter(id) => write!(f, "presenter-{id}"),
            Self::Remote(id) => write!(f, "remote-{id}"),
            Self::Multiplex(id) => write!(f, "multiplex-{id}"),
        }
    }
}

/// Outcome of a publish, for metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    /// Members whose queue was full or already closed
    pub dropped: usize,
}

type Members = HashMap<ConnectionId, mpsc::Sender<ServerEvent>>;

#[derive(Default)]
pub struct RoomHub {
    rooms: RwLock<HashMap<RoomKey, Members>>,
}

impl RoomHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room. Joining twice is a no-op.
    pub async fn join(&self, room: RoomKey, conn: ConnectionId, tx: mpsc::Sender<ServerEvent>) {
        debug!(conn_id = %conn, room = %room, "Joined room");
        self.rooms
            .write()
            .await
            .entry(room)
            .or_default()
            .entry(conn)
            .or_insert(tx);
    }

    /// Remove a connection from every room it is in. Empty rooms are dropped.
    /// Returns how many rooms it left.
    pub async fn leave_all(&self, conn: ConnectionId) -> usize {
        let mut rooms = self.rooms.write().await;
        let mut left = 0;
        rooms.retain(|_, members| {
            if members.remove(&conn).is_some() {
                left += 1;
            }
            !members.is_empty()
        });
        left
    }

    /// Deliver `event` to every member of `room`, except `exclude`.
    ///
    /// Never waits on a slow member: a full queue drops the event for that
    /// member only.
    pub async fn publish(
        &self,
        room: &RoomKey,
        event: ServerEvent,
        exclude: Option<ConnectionId>,
    ) -> Delivery {
        let targets: Vec<(ConnectionId, mpsc::Sender<ServerEvent>)> = {
            let rooms = self.rooms.read().await;
            match rooms.get(room) {
                Some(members) => members
                    .iter()
                    .filter(|(id, _)| Some(**id) != exclude)
                    .map(|(id, tx)| (*id, tx.clone()))
                    .collect(),
                None => Vec::new(),
            }
        };

        let mut delivery = Delivery::default();
        for (id, tx) in targets {
            match tx.try_send(event.clone()) {
                Ok(()) => delivery.delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(conn_id = %id, room = %room, "Outbound queue full, dropping event");
                    delivery.dropped += 1;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    delivery.dropped += 1;
                }
            }
        }
        delivery
    }

    pub async fn member_count(&self, room: &RoomKey) -> usize {
        self.rooms
            .read()
            .await
            .get(room)
            .map(|m| m.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rid(s: &str) -> RemoteId {
        RemoteId::new(s).unwrap()
    }

    #[test]
    fn room_names() {
        assert_eq!(RoomKey::Presenter(rid("a")).to_string(), "presenter-a");
        assert_eq!(RoomKey::Remote(rid("a")).to_string(), "remote-a");
        assert_eq!(
            RoomKey::Multiplex(MultiplexId::new("a").unwrap()).to_string(),
            "multiplex-a"
        );
    }

    #[test]
    fn same_string_different_audience() {
        let a = RoomKey::Remote(rid("x"));
        let b = RoomKey::Multiplex(MultiplexId::new("x").unwrap());
        let c = RoomKey::Presenter(rid("x"));
        assert_ne!(a, c);
        assert_ne!(format!("{a:?}"), format!("{b:?}"));
    }

    #[tokio::test]
    async fn publish_excludes_sender() {
        let hub = RoomHub::new();
        let room = RoomKey::Remote(rid("r"));
        let (a_tx, mut a_rx) = mpsc::channel(4);
        let (b_tx, mut b_rx) = mpsc::channel(4);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        hub.join(room.clone(), a, a_tx).await;
        hub.join(room.clone(), b, b_tx).await;

        let delivery = hub
            .publish(&room, ServerEvent::StateChanged(json!(1)), Some(a))
            .await;
        assert_eq!(delivery.delivered, 1);
        assert_eq!(b_rx.recv().await, Some(ServerEvent::StateChanged(json!(1))));
        assert!(a_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_to_empty_room() {
        let hub = RoomHub::new();
        let delivery = hub
            .publish(
                &RoomKey::Presenter(rid("nobody")),
                ServerEvent::ClientConnected {},
                None,
            )
            .await;
        assert_eq!(delivery, Delivery::default());
    }

    #[tokio::test]
    async fn rooms_are_isolated() {
        let hub = RoomHub::new();
        let (tx, mut rx) = mpsc::channel(4);
        hub.join(RoomKey::Remote(rid("one")), Uuid::new_v4(), tx).await;

        hub.publish(
            &RoomKey::Remote(rid("two")),
            ServerEvent::StateChanged(json!(2)),
            None,
        )
        .await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_queue_drops_without_blocking() {
        let hub = RoomHub::new();
        let room = RoomKey::Remote(rid("r"));
        let (tx, _rx) = mpsc::channel(1);
        hub.join(room.clone(), Uuid::new_v4(), tx).await;

        let first = hub.publish(&room, ServerEvent::StateChanged(json!(1)), None).await;
        let second = hub.publish(&room, ServerEvent::StateChanged(json!(2)), None).await;
        assert_eq!(first.delivered, 1);
        assert_eq!(second.dropped, 1);
    }

    #[tokio::test]
    async fn leave_all_removes_membership() {
        let hub = RoomHub::new();
        let conn = Uuid::new_v4();
        let (tx, _rx) = mpsc::channel(4);
        hub.join(RoomKey::Remote(rid("r")), conn, tx.clone()).await;
        hub.join(RoomKey::Presenter(rid("r")), conn, tx).await;

        assert_eq!(hub.leave_all(conn).await, 2);
        assert_eq!(hub.member_count(&RoomKey::Remote(rid("r"))).await, 0);
        assert_eq!(hub.leave_all(conn).await, 0);
    }

    #[tokio::test]
    async fn order_is_preserved_per_publisher() {
        let hub = RoomHub::new();
        let room = RoomKey::Remote(rid("r"));
        let (tx, mut rx) = mpsc::channel(16);
        hub.join(room.clone(), Uuid::new_v4(), tx).await;
        for i in 0..10 {
            hub.publish(&room, ServerEvent::StateChanged(json!(i)), None).await;
        }
        for i in 0..10 {
            assert_eq!(rx.recv().await, Some(ServerEvent::StateChanged(json!(i))));
        }
    }
}
