// Error handling for the Whisper Queue HTTP layer
//
// `HandlerError` is what every route returns on failure. It renders as the JSON
// `ErrorResponse` body with a status code chosen per variant.

use std::io;
use thiserror::Error;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};

use crate::models::ErrorResponse;
use crate::queue::QueueError;

/// Errors that can occur in the Whisper Queue handlers
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Error when processing multipart form data
    #[error("Form error: {0}")]
    FormError(String),

    /// Error when reading or writing file data
    #[error("File error: {0}")]
    FileError(#[from] io::Error),

    /// Error when no audio file was provided
    #[error("No audio file provided in the request")]
    NoAudioFile,

    /// Error when a file is too large
    #[error("File too large: {0} bytes exceeds limit of {1} bytes")]
    FileTooLarge(usize, usize),

    /// Priority path segment is neither high nor low
    #[error("Invalid priority: {0}. Valid priorities are: high, low")]
    InvalidPriority(String),

    /// Error when job is not found
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Cancellation refused because a worker already claimed the job
    #[error("Job {0} is already being processed")]
    AlreadyProcessing(String),

    /// The job store cannot be reached
    #[error("Job store unavailable: {0}")]
    StoreUnavailable(String),

    /// Any other queue failure
    #[error("Queue error: {0}")]
    QueueError(String),

    /// The metrics exporter failed to render
    #[error("Metrics export failed: {0}")]
    MetricsError(String),
}

impl HandlerError {
    /// Create a new FormError
    pub fn form_error<S: Into<String>>(msg: S) -> Self {
        Self::FormError(msg.into())
    }
}

impl ResponseError for HandlerError {
    fn status_code(&self) -> StatusCode {
        match self {
            HandlerError::NoAudioFile
            | HandlerError::FormError(_)
            | HandlerError::InvalidPriority(_)
            | HandlerError::AlreadyProcessing(_) => StatusCode::BAD_REQUEST,
            HandlerError::JobNotFound(_) => StatusCode::NOT_FOUND,
            HandlerError::FileTooLarge(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
            HandlerError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            HandlerError::FileError(_)
            | HandlerError::QueueError(_)
            | HandlerError::MetricsError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
            status: None,
        })
    }
}

/// Convert QueueError to HandlerError
impl From<QueueError> for HandlerError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::JobNotFound(id) => HandlerError::JobNotFound(id),
            QueueError::InvalidJob(reason) => HandlerError::FormError(reason),
            QueueError::StoreUnavailable(reason) => HandlerError::StoreUnavailable(reason),
            QueueError::NotProcessing(_) | QueueError::Serialization(_) => {
                HandlerError::QueueError(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (HandlerError::NoAudioFile, 400),
            (HandlerError::InvalidPriority("urgent".into()), 400),
            (HandlerError::AlreadyProcessing("a".into()), 400),
            (HandlerError::JobNotFound("a".into()), 404),
            (HandlerError::FileTooLarge(10, 5), 413),
            (HandlerError::StoreUnavailable("down".into()), 503),
            (HandlerError::QueueError("boom".into()), 500),
        ];
        for (error, status) in cases {
            assert_eq!(error.status_code().as_u16(), status, "{}", error);
        }
    }

    #[test]
    fn test_queue_error_conversion() {
        let err: HandlerError = QueueError::InvalidJob("empty language".into()).into();
        assert!(matches!(err, HandlerError::FormError(_)));

        let err: HandlerError = QueueError::StoreUnavailable("refused".into()).into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
