use serde::Serialize;
use sqlx::SqlitePool;

use crate::{AppError, AppResult, db::Room};

pub const UNKNOWN_MEMBER: &str = "Unknown User";

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PublicRoomEntry {
    pub id: i64,
    pub name: String,
    pub creator_username: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrivateRoomEntry {
    pub id: i64,
    pub name: String,
    pub other_member_username: String,
}

/// Canonical private-room name for a pair of users; order-independent.
fn private_room_name(a: i64, b: i64) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("private_{lo}_{hi}")
}

pub async fn find_room_by_id(pool: &SqlitePool, room_id: i64) -> AppResult<Option<Room>> {
    Ok(sqlx::query_as(
        "SELECT id, name, is_private, creator_id, created_at FROM rooms WHERE id = ?",
    )
    .bind(room_id)
    .fetch_optional(pool)
    .await?)
}

async fn find_room_by_name(
    pool: &SqlitePool,
    name: &str,
    is_private: bool,
) -> AppResult<Option<Room>> {
    Ok(sqlx::query_as(
        "SELECT id, name, is_private, creator_id, created_at FROM rooms WHERE name = ? AND is_private = ?",
    )
    .bind(name)
    .bind(is_private)
    .fetch_optional(pool)
    .await?)
}

pub async fn find_user_by_username(
    pool: &SqlitePool,
    username: &str,
) -> AppResult<Option<(i64, String)>> {
    Ok(
        sqlx::query_as("SELECT id, username FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await?,
    )
}

/// Creates a public room with `creator_id` as its first member. The name
/// must be unique among public rooms.
pub async fn create_public_room(
    pool: &SqlitePool,
    name: &str,
    creator_id: i64,
) -> AppResult<Room> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidRequest("room name must not be empty".into()));
    }
    if find_room_by_name(pool, name, false).await?.is_some() {
        return Err(AppError::Conflict("public room already exists".into()));
    }

    let mut tx = pool.begin().await?;
    let insert = sqlx::query("INSERT INTO rooms (name, is_private, creator_id) VALUES (?, 0, ?)")
        .bind(name)
        .bind(creator_id)
        .execute(&mut *tx)
        .await;
    let room_id = match insert {
        Ok(done) => done.last_insert_rowid(),
        // lost a create race; the unique index is the backstop
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            return Err(AppError::Conflict("public room already exists".into()));
        }
        Err(err) => return Err(err.into()),
    };
    sqlx::query("INSERT OR IGNORE INTO room_members (room_id, user_id) VALUES (?, ?)")
        .bind(room_id)
        .bind(creator_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    find_room_by_id(pool, room_id)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("room vanished after insert")))
}

pub async fn list_public_rooms(pool: &SqlitePool) -> AppResult<Vec<PublicRoomEntry>> {
    Ok(sqlx::query_as(
        "SELECT r.id, r.name, u.username AS creator_username
         FROM rooms r LEFT JOIN users u ON r.creator_id = u.id
         WHERE r.is_private = 0
         ORDER BY r.id",
    )
    .fetch_all(pool)
    .await?)
}

/// Resolves the private room between two users, creating it with both
/// memberships in one transaction on first request. Order-independent:
/// (a, b) and (b, a) resolve to the same room.
pub async fn get_or_create_private_room(
    pool: &SqlitePool,
    user_a: i64,
    user_b: i64,
) -> AppResult<Room> {
    if user_a == user_b {
        return Err(AppError::InvalidRequest(
            "cannot create a private chat with yourself".into(),
        ));
    }

    let name = private_room_name(user_a, user_b);
    if let Some(room) = find_room_by_name(pool, &name, true).await? {
        return Ok(room);
    }

    let mut tx = pool.begin().await?;
    let insert = sqlx::query("INSERT INTO rooms (name, is_private, creator_id) VALUES (?, 1, ?)")
        .bind(&name)
        .bind(user_a)
        .execute(&mut *tx)
        .await;
    let room_id = match insert {
        Ok(done) => done.last_insert_rowid(),
        // a concurrent request created it; hand back the winner's room
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            drop(tx);
            return find_room_by_name(pool, &name, true).await?.ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!("private room lost after conflict"))
            });
        }
        Err(err) => return Err(err.into()),
    };
    for user_id in [user_a, user_b] {
        sqlx::query("INSERT OR IGNORE INTO room_members (room_id, user_id) VALUES (?, ?)")
            .bind(room_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    find_room_by_id(pool, room_id)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("room vanished after insert")))
}

/// Private rooms `user_id` belongs to, each with the counterpart's
/// username. A counterpart that cannot be resolved becomes a sentinel
/// rather than failing the listing.
pub async fn list_private_rooms_for(
    pool: &SqlitePool,
    user_id: i64,
) -> AppResult<Vec<PrivateRoomEntry>> {
    let rooms: Vec<(i64, String)> = sqlx::query_as(
        "SELECT r.id, r.name
         FROM rooms r JOIN room_members rm ON r.id = rm.room_id
         WHERE rm.user_id = ? AND r.is_private = 1
         ORDER BY r.id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut entries = Vec::with_capacity(rooms.len());
    for (id, name) in rooms {
        let other: Option<(String,)> = sqlx::query_as(
            "SELECT u.username
             FROM users u JOIN room_members rm ON u.id = rm.user_id
             WHERE rm.room_id = ? AND u.id != ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
        entries.push(PrivateRoomEntry {
            id,
            name,
            other_member_username: other.map_or_else(|| UNKNOWN_MEMBER.to_owned(), |(u,)| u),
        });
    }
    Ok(entries)
}

pub async fn is_member(pool: &SqlitePool, room_id: i64, user_id: i64) -> AppResult<bool> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT 1 FROM room_members WHERE room_id = ? AND user_id = ?")
            .bind(room_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.is_some())
}

pub async fn add_member_if_absent(pool: &SqlitePool, room_id: i64, user_id: i64) -> AppResult<()> {
    sqlx::query("INSERT OR IGNORE INTO room_members (room_id, user_id) VALUES (?, ?)")
        .bind(room_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_room_name_is_order_independent() {
        assert_eq!(private_room_name(7, 3), private_room_name(3, 7));
        assert_eq!(private_room_name(3, 7), "private_3_7");
    }
}
