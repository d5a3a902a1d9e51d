use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use core_access::CoreAccessError;
use intake::IntakeError;
use serde_json::json;
use tracing::{error, warn};

/// A custom error type for the server application.
///
/// This enum encapsulates different kinds of errors that can occur within the server,
/// allowing them to be converted into appropriate HTTP responses.
pub enum AppError {
    /// Errors originating from the `intake` library.
    Intake(IntakeError),
    /// Errors from the staff identity store.
    Access(CoreAccessError),
    /// The caller is authenticated but not for this patient or form.
    Forbidden(String),
    /// Generic internal server errors.
    Internal(anyhow::Error),
}

impl From<IntakeError> for AppError {
    fn from(err: IntakeError) -> Self {
        AppError::Intake(err)
    }
}

impl From<CoreAccessError> for AppError {
    fn from(err: CoreAccessError) -> Self {
        AppError::Access(err)
    }
}

/// Conversion from `anyhow::Error` to `AppError`.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

const INTERNAL_MESSAGE: &str = "An internal server error occurred.";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status_code, error_message) = match self {
            AppError::Intake(err) => match err {
                IntakeError::Validation(msg) => {
                    warn!("Rejected request: {msg}");
                    (StatusCode::BAD_REQUEST, msg)
                }
                IntakeError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
                IntakeError::Conflict(msg) => (StatusCode::CONFLICT, msg),
                other => {
                    error!("IntakeError: {:?}", other);
                    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
                }
            },
            AppError::Forbidden(msg) => {
                warn!("Forbidden: {msg}");
                (StatusCode::FORBIDDEN, msg)
            }
            AppError::Access(err) => {
                error!("CoreAccessError: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
            }
            AppError::Internal(err) => {
                error!("Internal server error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status_code, body).into_response()
    }
}
