//! Job queue facade
//!
//! `JobQueue` is the handle producers and workers share. It wraps a [`JobStore`]
//! and adds job id allocation, admission checks, the blocking dequeue used by
//! workers, metrics and the periodic expiration sweep.

use chrono::Utc;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::metrics::Metrics;
use crate::queue::error::QueueError;
use crate::queue::job::{
    CancelOutcome, DequeuedJob, JobId, JobPayload, NewJob, Priority, QueueLengths, ResultRecord,
    WaitRank,
};
use crate::queue::store::JobStore;

/// Default interval between two dequeue attempts when the store cannot wake workers
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Queue handle shared by the API layer and the workers
#[derive(Clone)]
pub struct JobQueue {
    store: Arc<dyn JobStore>,
    metrics: Metrics,
    poll_interval: Duration,
}

impl JobQueue {
    /// Create a queue handle over `store`
    pub fn new(store: Arc<dyn JobStore>, metrics: Metrics) -> Self {
        Self {
            store,
            metrics,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the fallback poll interval used by [`JobQueue::dequeue_timeout`]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Add a job to the tail of its tier
    ///
    /// # Errors
    /// `InvalidJob` if the language is empty or the expiration is zero,
    /// `StoreUnavailable` if the store cannot be reached.
    pub async fn enqueue(
        &self,
        priority: Priority,
        payload: JobPayload,
    ) -> Result<JobId, QueueError> {
        payload.validate()?;

        let job_id = Uuid::new_v4().to_string();
        let audio_size = payload.audio.len();
        let sequence = self
            .store
            .push(NewJob {
                job_id: job_id.clone(),
                priority,
                payload,
                enqueued_at: Utc::now(),
            })
            .await?;

        info!(
            "Job {} added to {} priority queue (sequence {}, {} bytes)",
            job_id, priority, sequence, audio_size
        );
        self.metrics.record_job_enqueued(priority).await;
        self.metrics.record_file_size(audio_size as f64).await;
        self.refresh_queue_gauges().await;

        Ok(job_id)
    }

    /// Enqueue several payloads in order, returning their ids in the same order
    ///
    /// Stops at the first failure; jobs admitted before it stay queued.
    pub async fn enqueue_batch(
        &self,
        priority: Priority,
        payloads: Vec<JobPayload>,
    ) -> Result<Vec<JobId>, QueueError> {
        let mut ids = Vec::with_capacity(payloads.len());
        for payload in payloads {
            ids.push(self.enqueue(priority, payload).await?);
        }
        Ok(ids)
    }

    /// Claim the next job, high tier first
    ///
    /// `Ok(None)` means both tiers were empty at the time of the check.
    pub async fn try_dequeue(&self) -> Result<Option<DequeuedJob>, QueueError> {
        let job = self.store.claim_next().await?;
        if let Some(job) = &job {
            info!("Job {} dequeued from {} priority queue", job.job_id, job.priority);
            self.metrics.record_job_dequeued(job.priority).await;
            self.refresh_queue_gauges().await;
        }
        Ok(job)
    }

    /// Claim the next job, waiting up to `timeout` for one to arrive
    pub async fn dequeue_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Option<DequeuedJob>, QueueError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(job) = self.try_dequeue().await? {
                return Ok(Some(job));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            self.store
                .wait_for_job((deadline - now).min(self.poll_interval))
                .await;
        }
    }

    /// Cancel a job that no worker has claimed yet
    pub async fn cancel(&self, job_id: &str) -> Result<CancelOutcome, QueueError> {
        let outcome = self.store.cancel(job_id, Utc::now()).await?;
        match outcome {
            CancelOutcome::Cancelled => {
                info!("Canceled job: {}", job_id);
                self.metrics.record_job_cancelled().await;
                self.refresh_queue_gauges().await;
            }
            CancelOutcome::RejectedProcessing => {
                debug!("Refused to cancel job {}: already claimed", job_id)
            }
            CancelOutcome::NotFound => debug!("Cancel requested for unknown job {}", job_id),
        }
        Ok(outcome)
    }

    /// Number of jobs ahead of `job_id`, or `Resolved` once it left the queue
    pub async fn wait_rank(&self, job_id: &str) -> Result<WaitRank, QueueError> {
        self.store.wait_rank(job_id).await
    }

    /// Record the transcription of a claimed job
    ///
    /// # Errors
    /// `NotProcessing` if the job is not currently claimed, `JobNotFound` if it is unknown.
    pub async fn complete(
        &self,
        job_id: &str,
        transcription: String,
    ) -> Result<ResultRecord, QueueError> {
        let result = self
            .store
            .complete(job_id, transcription, Utc::now())
            .await?;

        debug!("Job {} result stored until {}", job_id, result.expires_at);
        info!("Job {} completed successfully", job_id);
        self.metrics.record_job_completed().await;
        Ok(result)
    }

    /// Stored transcription, if present and not expired
    pub async fn fetch(&self, job_id: &str) -> Result<Option<String>, QueueError> {
        Ok(self
            .store
            .fetch(job_id, Utc::now())
            .await?
            .map(|result| result.transcription))
    }

    /// Remove a stored result, returning whether there was one
    pub async fn delete(&self, job_id: &str) -> Result<bool, QueueError> {
        let existed = self.store.delete(job_id).await?;
        if existed {
            info!("Removed result of job {}", job_id);
        }
        Ok(existed)
    }

    /// Drop expired results and cancellation tombstones
    pub async fn purge_expired(&self) -> Result<usize, QueueError> {
        let count = self.store.purge_expired(Utc::now()).await?;
        if count > 0 {
            self.metrics.record_results_expired(count).await;
        }
        Ok(count)
    }

    pub async fn queue_lengths(&self) -> Result<QueueLengths, QueueError> {
        self.store.queue_lengths().await
    }

    /// Start a background task that periodically purges expired entries
    pub fn start_sweep_task(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let queue = self.clone();
        info!(
            "Starting result sweep task on {} store: interval {} seconds",
            queue.backend_name(),
            interval.as_secs()
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                match queue.purge_expired().await {
                    Ok(0) => debug!("No expired results to clean up"),
                    Ok(count) => info!("Cleaned up {} expired entries", count),
                    Err(e) => error!("Error during scheduled cleanup: {}", e),
                }
            }
        })
    }

    async fn refresh_queue_gauges(&self) {
        match self.store.queue_lengths().await {
            Ok(lengths) => self.metrics.set_queue_sizes(lengths).await,
            Err(e) => warn!("Failed to read queue lengths for metrics: {}", e),
        }
    }
}
