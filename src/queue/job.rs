// Job and result records for the transcription queue
//
// This module contains the data model shared by every store implementation:
// priority tiers, job payloads, status values and the outcomes reported by
// the cancellation controller and the position reporter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::queue::error::QueueError;

/// Identifier assigned to a job at enqueue time (UUID v4 string)
pub type JobId = String;

/// Longest result retention a job may ask for (one year)
pub const MAX_EXPIRATION: Duration = Duration::from_secs(31_536_000);

/// Priority tier of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Served before any low priority job
    High,
    /// Served only when the high tier is empty
    Low,
}

impl Priority {
    /// Tiers in service order
    pub const ALL: [Priority; 2] = [Priority::High, Priority::Low];

    /// Index of the tier in service order
    pub fn index(self) -> usize {
        match self {
            Priority::High => 0,
            Priority::Low => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "low" => Ok(Priority::Low),
            other => Err(QueueError::InvalidJob(format!(
                "unknown priority '{}', expected 'high' or 'low'",
                other
            ))),
        }
    }
}

/// Job status enum for tracking the lifecycle of a transcription job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Job is waiting in its tier
    Queued,
    /// Job has been claimed by a worker
    Processing,
    /// Job finished and its result is stored
    Done,
    /// Job was removed from the queue before any worker claimed it
    Cancelled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Done => "done",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for JobStatus {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "done" => Ok(JobStatus::Done),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(QueueError::Serialization(format!(
                "unknown job status '{}'",
                other
            ))),
        }
    }
}

/// Work description submitted with a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPayload {
    /// Language passed to the transcriber
    pub language: String,
    /// Raw audio bytes as uploaded
    pub audio: Vec<u8>,
    /// Extension of the uploaded file, used when the worker saves the audio
    pub audio_extension: String,
    /// How long the result stays retrievable after completion
    pub expiration: Duration,
}

impl JobPayload {
    pub fn new(
        language: impl Into<String>,
        audio: Vec<u8>,
        audio_extension: impl Into<String>,
        expiration: Duration,
    ) -> Self {
        Self {
            language: language.into(),
            audio,
            audio_extension: audio_extension.into(),
            expiration,
        }
    }

    /// Checks the admission constraints of a payload
    pub fn validate(&self) -> Result<(), QueueError> {
        if self.language.trim().is_empty() {
            return Err(QueueError::InvalidJob("language must not be empty".to_string()));
        }
        if self.expiration.is_zero() {
            return Err(QueueError::InvalidJob(
                "expiration must be greater than zero".to_string(),
            ));
        }
        if self.expiration > MAX_EXPIRATION {
            return Err(QueueError::InvalidJob(format!(
                "expiration must not exceed {} seconds",
                MAX_EXPIRATION.as_secs()
            )));
        }
        Ok(())
    }

    /// Expiration as a chrono duration, for deadline arithmetic
    pub fn expiration_delta(&self) -> Result<chrono::Duration, QueueError> {
        chrono::Duration::from_std(self.expiration)
            .map_err(|e| QueueError::InvalidJob(format!("expiration out of range: {}", e)))
    }

    /// Instant at which a record that resolves at `now` expires
    pub fn expires_after(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, QueueError> {
        now.checked_add_signed(self.expiration_delta()?)
            .ok_or_else(|| QueueError::InvalidJob("expiration is too large".to_string()))
    }
}

/// A job handed to a store for admission
#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_id: JobId,
    pub priority: Priority,
    pub payload: JobPayload,
    pub enqueued_at: DateTime<Utc>,
}

/// Job record as kept by a store
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub job_id: JobId,
    pub priority: Priority,
    /// Position of the job in its tier's admission order
    pub sequence: u64,
    pub status: JobStatus,
    pub payload: JobPayload,
    pub enqueued_at: DateTime<Utc>,
    /// Set once the job is done or cancelled; the record is dropped after it
    pub expires_at: Option<DateTime<Utc>>,
}

/// A job claimed by a worker
#[derive(Debug, Clone)]
pub struct DequeuedJob {
    pub job_id: JobId,
    pub priority: Priority,
    pub sequence: u64,
    pub payload: JobPayload,
    pub enqueued_at: DateTime<Utc>,
}

/// Stored result of a finished job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub job_id: JobId,
    pub transcription: String,
    pub completed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ResultRecord {
    /// A result is visible strictly before its deadline
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Outcome of a cancellation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The job was still queued and will never reach a worker
    Cancelled,
    /// A worker already claimed the job (or it is done)
    RejectedProcessing,
    /// No such job is known
    NotFound,
}

/// Answer of the position reporter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitRank {
    /// Number of jobs that will be served before this one
    Waiting(usize),
    /// The job left the queue for good; fetch its outcome instead
    Resolved,
}

/// Current depth of both tiers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueLengths {
    pub high: usize,
    pub low: usize,
}

impl QueueLengths {
    pub fn total(&self) -> usize {
        self.high + self.low
    }

    pub fn get(&self, priority: Priority) -> usize {
        match priority {
            Priority::High => self.high,
            Priority::Low => self.low,
        }
    }
}
