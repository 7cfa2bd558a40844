use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// Recommendation engine answered non-200 or could not be reached.
    #[error("recommendation engine error (status {status:?}): {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
        retryable: bool,
        timed_out: bool,
    },

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("cache error: {0}")]
    Cache(#[from] redis::RedisError),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Stable machine-checkable kind carried in every error payload.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::Upstream { .. } => "upstream_error",
            AppError::Storage(_) => "storage_error",
            AppError::Cache(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upstream { timed_out: true, .. } => StatusCode::GATEWAY_TIMEOUT,
            AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            AppError::Storage(_) | AppError::Cache(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Upstream { retryable: true, .. })
    }
}

pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_foreign_key_violation())
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            AppError::Validation(msg) | AppError::NotFound(msg) => {
                json!({ "error": self.kind(), "message": msg })
            }
            AppError::Upstream { retryable, .. } => {
                tracing::warn!("{}", self);
                json!({
                    "error": self.kind(),
                    "message": "Recommendation service unavailable",
                    "retryable": retryable,
                })
            }
            AppError::Storage(_) | AppError::Cache(_) => {
                tracing::error!("{}", self);
                json!({ "error": self.kind(), "message": "Internal server error" })
            }
        };

        (status, Json(body)).into_response()
    }
}
