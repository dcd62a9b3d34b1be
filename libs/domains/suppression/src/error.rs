use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SuppressionError {
    #[error("{0}")]
    MissingParameter(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Feedback store is not connected")]
    NotConnected,

    #[error("Suppression config document is missing")]
    ConfigDocumentMissing,

    #[error("Store error: {0}")]
    Store(String),

    #[error("Mail provider error: {0}")]
    Provider(String),

    #[error("Every recipient was suppressed, nothing to send")]
    NoRecipients,

    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error("Failed to start {collaborator}: {reason}")]
    Startup { collaborator: String, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type SuppressionResult<T> = Result<T, SuppressionError>;

/// Convert SuppressionError to AppError for standardized error responses
impl From<SuppressionError> for AppError {
    fn from(err: SuppressionError) -> Self {
        match err {
            SuppressionError::MissingParameter(msg) => AppError::MissingParameter(msg),
            SuppressionError::InvalidPayload(msg) => AppError::BadRequest(msg),
            SuppressionError::NoRecipients => AppError::BadRequest(err.to_string()),
            SuppressionError::NotConnected
            | SuppressionError::ConfigDocumentMissing
            | SuppressionError::Store(_) => AppError::StoreFailure(err.to_string()),
            SuppressionError::Provider(msg) => AppError::BadGateway(msg),
            SuppressionError::InvalidTransition { .. }
            | SuppressionError::Startup { .. }
            | SuppressionError::Internal(_) => AppError::InternalServerError(err.to_string()),
        }
    }
}

impl IntoResponse for SuppressionError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

impl From<mongodb::error::Error> for SuppressionError {
    fn from(err: mongodb::error::Error) -> Self {
        SuppressionError::Store(err.to_string())
    }
}

impl From<database::DatabaseError> for SuppressionError {
    fn from(err: database::DatabaseError) -> Self {
        SuppressionError::Store(err.to_string())
    }
}
