pub mod events;
pub mod registry;
pub mod ws;

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use sqlx::SqlitePool;
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    AppError, AppResult,
    auth::Identity,
    rooms::{directory, store},
};

use self::events::{PresenceKind, ServerEvent};
use self::registry::{ConnId, Registry};

pub const RECENT_HISTORY_LIMIT: i64 = 20;

/// Protocol state machine for the channel: join, send, leave, disconnect.
///
/// Operations touching the same room are serialized through that room's
/// lock, which is held across the membership check, the store write and
/// the broadcast, so every subscriber observes the same per-room event
/// order. The registry mutex is only held for map lookups, never across
/// an await.
pub struct Coordinator {
    db: SqlitePool,
    registry: Mutex<Registry>,
    room_locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl Coordinator {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            registry: Mutex::new(Registry::default()),
            room_locks: Mutex::new(HashMap::new()),
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn room_lock(&self, room_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .room_locks
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        // clients can name arbitrary room ids; drop entries no task holds
        // so the map doesn't grow with every bogus id ever seen
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(room_id).or_default().clone()
    }

    fn identity_of(&self, conn: ConnId) -> AppResult<Identity> {
        self.registry()
            .identity(conn)
            .cloned()
            .ok_or(AppError::Unauthenticated)
    }

    /// Binds a verified identity to a fresh connection id. The returned
    /// sender's receiver is the connection's outbound event queue.
    pub fn connect(&self, identity: Identity, tx: UnboundedSender<ServerEvent>) -> ConnId {
        self.registry().bind(identity, tx)
    }

    pub async fn join(&self, conn: ConnId, room_id: i64) -> AppResult<()> {
        let identity = self.identity_of(conn)?;
        let lock = self.room_lock(room_id);
        let _serial = lock.lock().await;

        let Some(room) = directory::find_room_by_id(&self.db, room_id).await? else {
            return Err(AppError::NotFound("room not found".into()));
        };
        if room.is_private {
            if !directory::is_member(&self.db, room_id, identity.id).await? {
                return Err(AppError::Forbidden(
                    "not authorized for this private room".into(),
                ));
            }
        } else {
            directory::add_member_if_absent(&self.db, room_id, identity.id).await?;
        }

        // re-joining a room is safe: history is re-delivered, but no new
        // subscription means no presence announcement
        let newly_subscribed = self.registry().subscribe(conn, room_id);

        self.unicast(conn, ServerEvent::Joined {
            room_id,
            room_name: room.name.clone(),
        });
        let messages = store::recent_history(&self.db, room_id, RECENT_HISTORY_LIMIT).await?;
        self.unicast(conn, ServerEvent::History { messages });

        if newly_subscribed {
            log::info!("{} joined room {} ({room_id})", identity.username, room.name);
            self.presence(room_id, PresenceKind::Joined, &identity.username, Some(conn));
        }
        Ok(())
    }

    pub async fn send(&self, conn: ConnId, room_id: i64, content: &str) -> AppResult<()> {
        let identity = self.identity_of(conn)?;
        if content.trim().is_empty() {
            // dropped without persisting, without broadcasting and
            // without an error frame
            return Ok(());
        }
        let lock = self.room_lock(room_id);
        let _serial = lock.lock().await;

        if !self.registry().is_subscribed(conn, room_id) {
            return Err(AppError::Forbidden("join the room before sending".into()));
        }

        let message = store::append(&self.db, room_id, &identity, content).await?;
        self.broadcast(room_id, ServerEvent::NewMessage { message }, None);
        Ok(())
    }

    pub async fn leave(&self, conn: ConnId, room_id: i64) -> AppResult<()> {
        let identity = self.identity_of(conn)?;
        let lock = self.room_lock(room_id);
        let _serial = lock.lock().await;

        if self.registry().unsubscribe(conn, room_id) {
            log::info!("{} left room {room_id}", identity.username);
            self.presence(room_id, PresenceKind::Left, &identity.username, Some(conn));
        }
        Ok(())
    }

    /// Implicit leave of every subscribed room, then full session
    /// teardown. Safe to call for an unknown connection.
    pub async fn disconnect(&self, conn: ConnId) {
        let (identity, rooms) = {
            let mut registry = self.registry();
            let identity = registry.identity(conn).cloned();
            (identity, registry.drop_session(conn))
        };
        let Some(identity) = identity else {
            return;
        };
        for room_id in rooms {
            let lock = self.room_lock(room_id);
            let _serial = lock.lock().await;
            self.presence(
                room_id,
                PresenceKind::Disconnected,
                &identity.username,
                Some(conn),
            );
        }
    }

    /// Reports an intent failure to the connection that caused it.
    pub fn report(&self, conn: ConnId, err: AppError) {
        self.unicast(conn, ServerEvent::ErrorMessage {
            message: err.client_message(),
        });
    }

    fn presence(&self, room_id: i64, kind: PresenceKind, username: &str, exclude: Option<ConnId>) {
        let event = ServerEvent::Presence {
            room_id,
            kind,
            username: username.to_owned(),
            message: kind.describe(username),
        };
        self.broadcast(room_id, event, exclude);
    }

    /// Best-effort fan-out: the recipient list is whatever the registry
    /// holds right now, and a closed queue never fails the operation that
    /// triggered the broadcast.
    fn broadcast(&self, room_id: i64, event: ServerEvent, exclude: Option<ConnId>) {
        let subscribers = self.registry().subscribers_of(room_id);
        for (conn, tx) in subscribers {
            if Some(conn) == exclude {
                continue;
            }
            let _ = tx.send(event.clone());
        }
    }

    fn unicast(&self, conn: ConnId, event: ServerEvent) {
        if let Some(tx) = self.registry().sender_to(conn) {
            let _ = tx.send(event);
        }
    }
}
