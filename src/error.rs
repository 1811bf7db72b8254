use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

pub type AppResult<T> = Result<T, AppError>;

/// Request-scoped failure kinds. Everything that isn't one of the named
/// kinds collapses into `Internal`, which is logged server-side and never
/// shows storage detail to the client.
#[derive(Debug)]
pub enum AppError {
    Unauthenticated,
    NotFound(String),
    Forbidden(String),
    Conflict(String),
    InvalidRequest(String),
    Internal(anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text safe to hand to the client that caused the failure.
    pub fn client_message(&self) -> String {
        match self {
            Self::Unauthenticated => "authorization denied".to_owned(),
            Self::NotFound(msg)
            | Self::Forbidden(msg)
            | Self::Conflict(msg)
            | Self::InvalidRequest(msg) => msg.clone(),
            Self::Internal(err) => {
                log::error!("internal error: {err:?}");
                "server error".to_owned()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let msg = self.client_message();
        (status, Json(json!({ "msg": msg }))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Internal(err.into())
    }
}
