use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
};
use std::time::Duration;

use crate::api::response;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Classifier process failed: {0}")]
    SubprocessError(String),

    #[error("Invalid classifier output: {0}")]
    InvalidOutput(String),

    #[error("Classifier did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::SubprocessError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InvalidOutput(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message sent to the caller. Process details stay in the log.
    pub fn public_message(&self) -> String {
        match self {
            AppError::InvalidInput(msg) => msg.clone(),
            AppError::SubprocessError(_) => "Failed to run the classifier.".to_string(),
            AppError::InvalidOutput(_) => "Classifier output is invalid.".to_string(),
            AppError::Timeout(_) => "Classifier timed out.".to_string(),
            AppError::ConfigError(_) => "Server misconfigured.".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        response::error(self.status(), self.public_message()).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(AppError::InvalidInput("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::SubprocessError("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::InvalidOutput("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Timeout(Duration::from_secs(1)).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn process_details_are_not_exposed() {
        let err = AppError::SubprocessError("exit status 1: Traceback ...".into());
        assert!(!err.public_message().contains("Traceback"));
    }

    #[test]
    fn invalid_output_message_is_neutral() {
        let err = AppError::InvalidOutput("missing verdict (`result` or `status`)".into());
        assert_eq!(err.public_message(), "Classifier output is invalid.");
    }
}
