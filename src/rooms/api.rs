use axum::{
    Json, debug_handler,
    extract::{Path, State},
};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{
    AppError, AppResult,
    auth::Identity,
    db::{Message, Room},
};

use super::{
    directory,
    directory::{PrivateRoomEntry, PublicRoomEntry},
    store,
};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn list_rooms(
    State(db_pool): State<SqlitePool>,
    _identity: Identity,
) -> AppResult<Json<Vec<PublicRoomEntry>>> {
    Ok(Json(directory::list_public_rooms(&db_pool).await?))
}

#[derive(Deserialize)]
pub(crate) struct NewRoomBody {
    name: String,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn new_room(
    State(db_pool): State<SqlitePool>,
    identity: Identity,
    Json(NewRoomBody { name }): Json<NewRoomBody>,
) -> AppResult<Json<Room>> {
    let room = directory::create_public_room(&db_pool, &name, identity.id).await?;
    log::info!("{} created public room {} ({})", identity.username, room.name, room.id);
    Ok(Json(room))
}

#[derive(Deserialize)]
pub(crate) struct PrivateRoomBody {
    other_username: String,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn private_room(
    State(db_pool): State<SqlitePool>,
    identity: Identity,
    Json(PrivateRoomBody { other_username }): Json<PrivateRoomBody>,
) -> AppResult<Json<Room>> {
    let Some((other_id, _)) = directory::find_user_by_username(&db_pool, &other_username).await?
    else {
        return Err(AppError::NotFound("other user not found".into()));
    };
    let room = directory::get_or_create_private_room(&db_pool, identity.id, other_id).await?;
    Ok(Json(room))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn my_private_rooms(
    State(db_pool): State<SqlitePool>,
    identity: Identity,
) -> AppResult<Json<Vec<PrivateRoomEntry>>> {
    Ok(Json(
        directory::list_private_rooms_for(&db_pool, identity.id).await?,
    ))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn room_messages(
    State(db_pool): State<SqlitePool>,
    identity: Identity,
    Path(room_id): Path<i64>,
) -> AppResult<Json<Vec<Message>>> {
    if directory::find_room_by_id(&db_pool, room_id).await?.is_none() {
        return Err(AppError::NotFound("room not found".into()));
    }
    if !directory::is_member(&db_pool, room_id, identity.id).await? {
        return Err(AppError::Forbidden("not authorized for this room".into()));
    }
    Ok(Json(store::full_history(&db_pool, room_id).await?))
}
