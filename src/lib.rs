// Whisper Queue Library
//
// A prioritised transcription job queue with a TTL-bounded result cache.
// Producers submit audio over HTTP, workers claim jobs one at a time and run a
// transcription command, and clients poll for their place in line or the text.

pub mod config;
pub mod config_loader;
pub mod config_validator;
pub mod error;
pub mod file_utils;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod queue;
pub mod worker;

// Re-export common types for easier access
pub use config::{AppConfig, HandlerConfig, MetricsConfig, StoreConfig, WorkerConfig};
pub use error::HandlerError;
pub use metrics::Metrics;
pub use models::{ErrorResponse, SuccessResponse};
pub use queue::{CancelOutcome, JobPayload, JobQueue, Priority, QueueError, WaitRank};
pub use worker::{CommandTranscriber, Transcriber, Worker, WorkerError};
