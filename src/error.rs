use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorBody;

/// Persistence failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("There is already an active delay event")]
    AlreadyActive,
    #[error("No active delay event found")]
    NoActiveEvent,
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by the HTTP handlers, rendered as `{"error": ...}`
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AlreadyActive | StoreError::NoActiveEvent => {
                ApiError::BadRequest(e.to_string())
            }
            StoreError::Sqlite(_) | StoreError::Io(_) => ApiError::internal(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if code.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        (code, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

/// Failures talking to the backend before a usable reply arrived
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("unreadable reply: {0}")]
    Decode(#[from] serde_json::Error),
    /// Non-success status whose body was not a `{error}` reply
    #[error("server answered {status}")]
    Status { status: u16 },
    /// Server-supplied error text on an endpoint without a success/error reply shape
    #[error("{0}")]
    Server(String),
}
