use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use vrl_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid key field: {0}")]
    InvalidKeyField(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Store(e) => match e {
                StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
                StoreError::Submission(_) => StatusCode::BAD_REQUEST,
                StoreError::WriteConflict { .. } => StatusCode::CONFLICT,
                StoreError::LedgerUnavailable(_) | StoreError::Shutdown => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::InvalidKeyField(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Store(e) => match e {
                StoreError::NotFound { .. } => "not_found",
                StoreError::Submission(_) => "submission",
                StoreError::WriteConflict { .. } => "write_conflict",
                StoreError::LedgerUnavailable(_) => "ledger_unavailable",
                StoreError::CursorCorruption(_) => "cursor_corruption",
                StoreError::Shutdown => "shutdown",
                _ => "internal",
            },
            Self::InvalidKeyField(_) => "invalid_key_field",
            Self::BadRequest(_) => "bad_request",
            _ => "internal",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        let body = json!({ "error": self.to_string(), "kind": self.kind() });
        (status, Json(body)).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
