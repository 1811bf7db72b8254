use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::auth::Identity;

use super::events::ServerEvent;

pub type ConnId = Uuid;

struct Session {
    identity: Identity,
    tx: UnboundedSender<ServerEvent>,
    rooms: HashSet<i64>,
}

/// Live-connection bookkeeping: which identity owns each connection and
/// which rooms it is subscribed to. Purely in-memory; destroyed state
/// never comes back.
#[derive(Default)]
pub struct Registry {
    sessions: HashMap<ConnId, Session>,
    rooms: HashMap<i64, HashSet<ConnId>>,
}

impl Registry {
    pub fn bind(&mut self, identity: Identity, tx: UnboundedSender<ServerEvent>) -> ConnId {
        let conn = Uuid::now_v7();
        self.sessions.insert(
            conn,
            Session {
                identity,
                tx,
                rooms: HashSet::new(),
            },
        );
        conn
    }

    pub fn identity(&self, conn: ConnId) -> Option<&Identity> {
        self.sessions.get(&conn).map(|session| &session.identity)
    }

    /// Returns true if this created a new subscription.
    pub fn subscribe(&mut self, conn: ConnId, room_id: i64) -> bool {
        let Some(session) = self.sessions.get_mut(&conn) else {
            return false;
        };
        if !session.rooms.insert(room_id) {
            return false;
        }
        self.rooms.entry(room_id).or_default().insert(conn);
        true
    }

    /// Returns true if a subscription was removed.
    pub fn unsubscribe(&mut self, conn: ConnId, room_id: i64) -> bool {
        let Some(session) = self.sessions.get_mut(&conn) else {
            return false;
        };
        if !session.rooms.remove(&room_id) {
            return false;
        }
        self.forget_subscriber(room_id, conn);
        true
    }

    pub fn is_subscribed(&self, conn: ConnId, room_id: i64) -> bool {
        self.sessions
            .get(&conn)
            .is_some_and(|session| session.rooms.contains(&room_id))
    }

    pub fn subscribers_of(&self, room_id: i64) -> Vec<(ConnId, UnboundedSender<ServerEvent>)> {
        self.rooms
            .get(&room_id)
            .map(|subs| {
                subs.iter()
                    .filter_map(|conn| {
                        self.sessions
                            .get(conn)
                            .map(|session| (*conn, session.tx.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn rooms_of(&self, conn: ConnId) -> Vec<i64> {
        self.sessions
            .get(&conn)
            .map(|session| session.rooms.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn sender_to(&self, conn: ConnId) -> Option<UnboundedSender<ServerEvent>> {
        self.sessions.get(&conn).map(|session| session.tx.clone())
    }

    /// Deletes all state for a connection and returns the rooms it was
    /// subscribed to, so the caller can announce the departure.
    pub fn drop_session(&mut self, conn: ConnId) -> Vec<i64> {
        let Some(session) = self.sessions.remove(&conn) else {
            return Vec::new();
        };
        let mut rooms: Vec<i64> = session.rooms.into_iter().collect();
        rooms.sort_unstable();
        for room_id in &rooms {
            self.forget_subscriber(*room_id, conn);
        }
        rooms
    }

    fn forget_subscriber(&mut self, room_id: i64, conn: ConnId) {
        if let Some(subs) = self.rooms.get_mut(&room_id) {
            subs.remove(&conn);
            if subs.is_empty() {
                self.rooms.remove(&room_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn identity(id: i64) -> Identity {
        Identity {
            id,
            username: format!("user{id}"),
        }
    }

    #[test]
    fn subscribe_is_idempotent() {
        let mut registry = Registry::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = registry.bind(identity(1), tx);

        assert!(registry.subscribe(conn, 10));
        assert!(!registry.subscribe(conn, 10));
        assert_eq!(registry.subscribers_of(10).len(), 1);
    }

    #[test]
    fn drop_session_reports_rooms_and_clears_state() {
        let mut registry = Registry::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = registry.bind(identity(1), tx);
        registry.subscribe(conn, 10);
        registry.subscribe(conn, 20);

        assert_eq!(registry.drop_session(conn), vec![10, 20]);
        assert!(registry.identity(conn).is_none());
        assert!(registry.subscribers_of(10).is_empty());
        assert!(registry.subscribers_of(20).is_empty());
        assert!(registry.drop_session(conn).is_empty());
    }

    #[test]
    fn unsubscribe_only_removes_existing_subscription() {
        let mut registry = Registry::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = registry.bind(identity(1), tx);

        assert!(!registry.unsubscribe(conn, 10));
        registry.subscribe(conn, 10);
        assert!(registry.unsubscribe(conn, 10));
        assert!(!registry.is_subscribed(conn, 10));
        assert!(registry.rooms_of(conn).is_empty());
    }
}
