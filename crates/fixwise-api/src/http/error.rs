//! Application error type mapping to HTTP status codes and envelope format.

use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use fixwise_types::error::SessionError;

use super::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Session manager errors.
    Session(SessionError),
    /// Request body failed validation before reaching the engine.
    Validation(String),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        AppError::Session(e)
    }
}

impl AppError {
    /// Envelope error code and message.
    pub fn code_and_message(&self) -> (&'static str, String) {
        match self {
            AppError::Session(SessionError::NotFound(id)) => {
                ("SESSION_NOT_FOUND", format!("Session '{id}' not found"))
            }
            AppError::Session(SessionError::AlreadyExists(id)) => {
                ("SESSION_EXISTS", format!("Session '{id}' already exists"))
            }
            AppError::Session(SessionError::InvalidInput(msg)) => {
                ("VALIDATION_ERROR", msg.clone())
            }
            AppError::Session(SessionError::Storage(e)) => ("STORAGE_ERROR", e.to_string()),
            AppError::Validation(msg) => ("VALIDATION_ERROR", msg.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (code, message) = self.code_and_message();
        if code == "STORAGE_ERROR" {
            tracing::error!(code, %message, "request failed");
        }
        ApiResponse::error(code, &message, Uuid::now_v7().to_string(), 0).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use fixwise_types::error::RepositoryError;
    use fixwise_types::session::SessionId;

    #[test]
    fn session_errors_map_to_statuses() {
        let cases = [
            (SessionError::NotFound(SessionId::from("a")), StatusCode::NOT_FOUND),
            (SessionError::AlreadyExists(SessionId::from("a")), StatusCode::CONFLICT),
            (
                SessionError::InvalidInput("empty".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                SessionError::Storage(RepositoryError::Connection),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn not_found_names_the_session() {
        let (code, message) =
            AppError::from(SessionError::NotFound(SessionId::from("kitchen"))).code_and_message();
        assert_eq!(code, "SESSION_NOT_FOUND");
        assert!(message.contains("kitchen"));
    }
}
