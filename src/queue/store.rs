// Job store abstraction
//
// A store holds both priority tiers and the result cache. Every operation that
// touches a job's status is a single atomic step of the store, so a dequeue and
// a cancellation of the same job can never both succeed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::queue::error::QueueError;
use crate::queue::job::{
    CancelOutcome, DequeuedJob, NewJob, QueueLengths, ResultRecord, WaitRank,
};

/// Shared storage for queued jobs and their results
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Append a job to the tail of its tier and return the sequence number it got
    async fn push(&self, job: NewJob) -> Result<u64, QueueError>;

    /// Take the head of the highest non-empty tier and mark it processing
    async fn claim_next(&self) -> Result<Option<DequeuedJob>, QueueError>;

    /// Remove a still-queued job and mark it cancelled
    async fn cancel(&self, job_id: &str, now: DateTime<Utc>) -> Result<CancelOutcome, QueueError>;

    /// Number of jobs served before `job_id`, or resolved once it left the queue
    async fn wait_rank(&self, job_id: &str) -> Result<WaitRank, QueueError>;

    /// Store the result of a processing job and mark it done
    async fn complete(
        &self,
        job_id: &str,
        transcription: String,
        now: DateTime<Utc>,
    ) -> Result<ResultRecord, QueueError>;

    /// Live result for `job_id`; expired results are treated as absent
    async fn fetch(
        &self,
        job_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ResultRecord>, QueueError>;

    /// Drop a stored result regardless of its deadline
    async fn delete(&self, job_id: &str) -> Result<bool, QueueError>;

    /// Remove expired results and cancellation tombstones, returning how many went away
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, QueueError>;

    async fn queue_lengths(&self) -> Result<QueueLengths, QueueError>;

    /// Wait until a job may have been pushed or `timeout` elapsed
    ///
    /// Stores without a wake-up mechanism simply sleep, which turns the caller's
    /// loop into a fixed-interval poll.
    async fn wait_for_job(&self, timeout: Duration) {
        tokio::time::sleep(timeout).await;
    }

    /// Short name of the backend, for logs
    fn backend_name(&self) -> &'static str;
}
