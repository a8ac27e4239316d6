//! Error types for the daemon API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shiftbox_core::CoreError;
use shiftbox_error::CommonError;
use thiserror::Error;

/// Result type alias for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors that can occur in API operations.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Error bubbled up from the core.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Server-side failure (socket, serialization).
    #[error("server error: {0}")]
    Server(String),
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Core(err) if err.is_conflict() => StatusCode::CONFLICT,
            Self::Core(CoreError::Common(CommonError::NotFound(_))) => StatusCode::NOT_FOUND,
            Self::Core(_) | Self::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "message": self.to_string()
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_errors_map_to_409() {
        assert_eq!(
            ApiError::from(CoreError::Busy).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(CoreError::StoppingOrDeleting).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(CoreError::CancelTimeout).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_driver_errors_map_to_500() {
        assert_eq!(
            ApiError::from(CoreError::machine("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_not_found_maps_to_404() {
        assert_eq!(
            ApiError::from(CoreError::not_found("virtual machine")).status_code(),
            StatusCode::NOT_FOUND
        );
    }
}
