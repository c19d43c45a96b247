use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

pub type AppResult<T> = Result<T, AppError>;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("the resource '{0}' cannot be found")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("the argument '{0}' is missing")]
    MissingArgument(String),
    #[error("the argument '{name}' is invalid: {reason}")]
    InvalidArgument { name: String, reason: String },
    #[error("the action '{0}' couldn't be performed successfully, try again")]
    ActionFailed(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("token error: {0}")]
    Token(String),
    #[error("database error")]
    Database(#[from] sqlx::Error),
    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Grant exists but sits below the level the action needs.
    pub fn insufficient_level(action: &str, held: impl std::fmt::Display, required: impl std::fmt::Display) -> Self {
        Self::Forbidden(format!("{action} requires {required}, caller holds {held}"))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn missing_argument(name: impl Into<String>) -> Self {
        Self::MissingArgument(name.into())
    }

    pub fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn action_failed(action: impl Into<String>) -> Self {
        Self::ActionFailed(action.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn token(err: impl Into<String>) -> Self {
        Self::Token(err.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::MissingArgument(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            AppError::ActionFailed(_) => StatusCode::CONFLICT,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if let AppError::Database(err) = &self {
            tracing::error!(error = %err, "store failure");
        }

        let message = self.to_string();
        let error = match &self {
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::MissingArgument(_) => "missing_argument",
            AppError::InvalidArgument { .. } => "invalid_argument",
            AppError::ActionFailed(_) => "action_failed",
            AppError::Configuration(_) => "configuration",
            AppError::Token(_) => "token",
            AppError::Database(_) => "database",
            AppError::Internal(_) => "internal",
        };

        let payload = ErrorResponse {
            error: error.to_string(),
            message,
        };

        (status, Json(payload)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_failures_do_not_leak_driver_messages() {
        let err = AppError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.to_string(), "database error");
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn argument_errors_are_bad_requests() {
        let missing = AppError::missing_argument("name").into_response();
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let invalid = AppError::invalid_argument("ids", "must not be empty").into_response();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn insufficient_level_reads_both_levels() {
        let err = AppError::insufficient_level("update", "MEMBER", "WRITE");
        assert!(matches!(err, AppError::Forbidden(ref m) if m.contains("MEMBER") && m.contains("WRITE")));
    }
}
