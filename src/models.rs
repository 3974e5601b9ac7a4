// Whisper Queue data models
//
// Request parameters and the JSON bodies returned by the HTTP endpoints.
// Successful bodies are wrapped in a `data` envelope.

use serde::Serialize;

use crate::queue::QueueLengths;

/// Envelope for every successful response body
#[derive(Serialize, Debug)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

impl<T: Serialize> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Id of a job accepted by `POST /add-job`
#[derive(Serialize, Debug)]
pub struct JobIdData {
    pub job_id: String,
}

/// Finished transcription
#[derive(Serialize, Debug)]
pub struct TranscriptionData {
    pub transcription: String,
}

/// Number of jobs that will be served before this one
#[derive(Serialize, Debug)]
pub struct WaitData {
    pub n_wait: usize,
}

/// An uploaded audio file
#[derive(Debug, Default)]
pub struct AudioUpload {
    pub data: Vec<u8>,
    /// Extension of the uploaded file name, without the dot
    pub extension: String,
}

/// Parameters of an add-job request
#[derive(Debug, Default)]
pub struct JobRequestParams {
    /// Language for transcription (e.g., "English", "ja")
    pub language: String,
    /// Result retention in seconds
    pub expiration_secs: u64,
    pub audio_files: Vec<AudioUpload>,
}

/// Error response for API
#[derive(Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Optional status information
    pub status: Option<String>,
}

/// Success response for API
#[derive(Serialize)]
pub struct SuccessResponse {
    /// Success flag
    pub success: bool,
    /// Message describing the successful operation
    pub message: String,
}

/// Body of `GET /status`
#[derive(Serialize)]
pub struct StatusResponse {
    pub backend: &'static str,
    pub queued: QueueLengths,
    pub total_queued: usize,
}
