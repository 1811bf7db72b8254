mod api;
pub mod directory;
pub mod store;

use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(api::list_rooms).post(api::new_room))
        .route("/rooms/private", post(api::private_room))
        .route("/rooms/private/my", get(api::my_private_rooms))
        .route("/messages/{room_id}", get(api::room_messages))
}
