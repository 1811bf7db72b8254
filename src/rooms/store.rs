use sqlx::SqlitePool;

use crate::{AppError, AppResult, auth::Identity, db::Message};

fn unix_millis() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Appends a message to the room's log. Content is trimmed first; an
/// empty result is an `InvalidRequest`, never a stored row.
pub async fn append(
    pool: &SqlitePool,
    room_id: i64,
    sender: &Identity,
    content: &str,
) -> AppResult<Message> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::InvalidRequest(
            "message content must not be empty".into(),
        ));
    }

    let timestamp = unix_millis();
    let id = sqlx::query(
        "INSERT INTO messages (room_id, sender_id, content, timestamp) VALUES (?, ?, ?, ?)",
    )
    .bind(room_id)
    .bind(sender.id)
    .bind(content)
    .bind(timestamp)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(Message {
        id,
        room_id,
        sender_id: sender.id,
        sender_username: sender.username.clone(),
        content: content.to_owned(),
        timestamp,
    })
}

/// Up to `limit` most recent messages, delivered oldest first. The query
/// walks newest-first to apply the window, then reverses.
pub async fn recent_history(
    pool: &SqlitePool,
    room_id: i64,
    limit: i64,
) -> AppResult<Vec<Message>> {
    let mut messages: Vec<Message> = sqlx::query_as(
        "SELECT m.id, m.room_id, m.sender_id, u.username AS sender_username, m.content, m.timestamp
         FROM messages m JOIN users u ON m.sender_id = u.id
         WHERE m.room_id = ?
         ORDER BY m.timestamp DESC, m.id DESC
         LIMIT ?",
    )
    .bind(room_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    messages.reverse();
    Ok(messages)
}

/// The full message log for a room, oldest first.
pub async fn full_history(pool: &SqlitePool, room_id: i64) -> AppResult<Vec<Message>> {
    Ok(sqlx::query_as(
        "SELECT m.id, m.room_id, m.sender_id, u.username AS sender_username, m.content, m.timestamp
         FROM messages m JOIN users u ON m.sender_id = u.id
         WHERE m.room_id = ?
         ORDER BY m.timestamp ASC, m.id ASC",
    )
    .bind(room_id)
    .fetch_all(pool)
    .await?)
}
