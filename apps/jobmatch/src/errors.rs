use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Classified failure of a match resolution or a guarded mutation.
///
/// Returned as data by the resolver and the job board so callers can pick a
/// user-facing response (prompt for a resume upload, ask to log in again, ignore a
/// duplicate click) without inspecting transport details.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Session expired or missing")]
    Auth,

    #[error("No active resume found")]
    NoActiveResource,

    #[error("Server error (status {status}): {message}")]
    Server { status: u16, message: String },

    #[error("Another operation is already running for {entity_id}")]
    OperationInProgress { entity_id: String },

    #[error("Cached entry is malformed: {0}")]
    CacheCorrupt(String),
}

impl ClientError {
    /// Stable machine-readable code used in HTTP error bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            ClientError::Network(_) => "NETWORK_ERROR",
            ClientError::Auth => "AUTH_ERROR",
            ClientError::NoActiveResource => "NO_ACTIVE_RESOURCE",
            ClientError::Server { .. } => "SERVER_ERROR",
            ClientError::OperationInProgress { .. } => "OPERATION_IN_PROGRESS",
            ClientError::CacheCorrupt(_) => "CACHE_CORRUPT",
        }
    }

    /// Duplicate-click rejections from the mutation guard are not failures.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, ClientError::OperationInProgress { .. })
    }

    /// Ranks errors by how much a user can do about them. When both match
    /// strategies fail, the higher-ranked error is reported.
    pub(crate) fn actionability(&self) -> u8 {
        match self {
            ClientError::Auth => 2,
            ClientError::NoActiveResource => 1,
            _ => 0,
        }
    }
}

/// HTTP-facing error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Client(err) => {
                let status = match err {
                    ClientError::Auth => StatusCode::UNAUTHORIZED,
                    ClientError::NoActiveResource => StatusCode::UNPROCESSABLE_ENTITY,
                    ClientError::OperationInProgress { .. } => StatusCode::CONFLICT,
                    ClientError::Network(_) | ClientError::Server { .. } => {
                        tracing::error!("Upstream error: {err}");
                        StatusCode::BAD_GATEWAY
                    }
                    ClientError::CacheCorrupt(_) => {
                        tracing::error!("Cache error: {err}");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, err.code(), err.to_string())
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
