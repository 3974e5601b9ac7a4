// Queue error types
//
// Expected outcomes (empty queue, cancellation refused, unknown id on lookup)
// are not errors; they are returned as values. These variants cover invalid
// input, misuse of the completion sink and infrastructure faults.

use thiserror::Error;

/// Queue error types
#[derive(Error, Debug)]
pub enum QueueError {
    /// Job not found in the store
    #[error("Job not found: {0}")]
    JobNotFound(String),
    /// Completion reported for a job that is not being processed
    #[error("Job is not processing: {0}")]
    NotProcessing(String),
    /// Job rejected at admission
    #[error("Invalid job: {0}")]
    InvalidJob(String),
    /// The shared store could not be reached or could not run an operation atomically
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    /// A stored record could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<redis::RedisError> for QueueError {
    fn from(err: redis::RedisError) -> Self {
        QueueError::StoreUnavailable(err.to_string())
    }
}
