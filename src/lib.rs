pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod rooms;

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::SqlitePool;

pub use error::{AppError, AppResult};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub verifier: auth::Verifier,
    pub coordinator: Arc<chat::Coordinator>,
}
