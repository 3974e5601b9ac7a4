//! In-process job store
//!
//! All state lives behind a single `tokio::sync::Mutex`. Holding that lock is the
//! claim primitive: popping a tier head, removing a cancelled job and completing a
//! job each happen entirely inside one critical section.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

use crate::queue::error::QueueError;
use crate::queue::job::{
    CancelOutcome, DequeuedJob, JobId, JobRecord, JobStatus, NewJob, Priority, QueueLengths,
    ResultRecord, WaitRank,
};
use crate::queue::store::JobStore;

/// One priority tier: pending ids in admission order plus its sequence counter
#[derive(Default)]
struct Tier {
    pending: VecDeque<JobId>,
    next_sequence: u64,
}

/// Internal state of the memory store
#[derive(Default)]
struct StoreState {
    /// Tiers indexed by `Priority::index`
    tiers: [Tier; 2],
    /// Every known job, whatever its status
    jobs: HashMap<JobId, JobRecord>,
    /// Results of done jobs
    results: HashMap<JobId, ResultRecord>,
}

impl StoreState {
    fn tier_mut(&mut self, priority: Priority) -> &mut Tier {
        &mut self.tiers[priority.index()]
    }

    fn lengths(&self) -> QueueLengths {
        QueueLengths {
            high: self.tiers[Priority::High.index()].pending.len(),
            low: self.tiers[Priority::Low.index()].pending.len(),
        }
    }

    /// Drops a done job together with its result
    fn forget_result(&mut self, job_id: &str) -> bool {
        let existed = self.results.remove(job_id).is_some();
        if existed {
            self.jobs.remove(job_id);
        }
        existed
    }
}

/// Job store keeping everything in process memory
pub struct MemoryStore {
    state: Mutex<StoreState>,
    /// Wakes one waiting worker per pushed job
    job_ready: Notify,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            job_ready: Notify::new(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn push(&self, job: NewJob) -> Result<u64, QueueError> {
        job.payload.validate()?;
        let sequence = {
            let mut state = self.state.lock().await;
            if state.jobs.contains_key(&job.job_id) {
                return Err(QueueError::InvalidJob(format!(
                    "duplicate job id {}",
                    job.job_id
                )));
            }

            let tier = state.tier_mut(job.priority);
            let sequence = tier.next_sequence;
            tier.next_sequence += 1;
            tier.pending.push_back(job.job_id.clone());

            state.jobs.insert(
                job.job_id.clone(),
                JobRecord {
                    job_id: job.job_id,
                    priority: job.priority,
                    sequence,
                    status: JobStatus::Queued,
                    payload: job.payload,
                    enqueued_at: job.enqueued_at,
                    expires_at: None,
                },
            );
            sequence
        };

        self.job_ready.notify_one();
        Ok(sequence)
    }

    async fn claim_next(&self) -> Result<Option<DequeuedJob>, QueueError> {
        let mut state = self.state.lock().await;

        for priority in Priority::ALL {
            let Some(job_id) = state.tier_mut(priority).pending.pop_front() else {
                continue;
            };

            let record = state.jobs.get_mut(&job_id).ok_or_else(|| {
                QueueError::StoreUnavailable(format!("queued id {} has no job record", job_id))
            })?;
            record.status = JobStatus::Processing;

            // The worker takes the audio; the record only keeps what later steps need
            let audio = std::mem::take(&mut record.payload.audio);
            let mut payload = record.payload.clone();
            payload.audio = audio;

            debug!("Claimed {} job {} (sequence {})", priority, job_id, record.sequence);
            return Ok(Some(DequeuedJob {
                job_id,
                priority,
                sequence: record.sequence,
                payload,
                enqueued_at: record.enqueued_at,
            }));
        }

        Ok(None)
    }

    async fn cancel(&self, job_id: &str, now: DateTime<Utc>) -> Result<CancelOutcome, QueueError> {
        let mut state = self.state.lock().await;

        let (status, priority) = match state.jobs.get(job_id) {
            Some(record) => (record.status, record.priority),
            None => return Ok(CancelOutcome::NotFound),
        };

        match status {
            JobStatus::Queued => {
                state.tier_mut(priority).pending.retain(|id| id != job_id);
                if let Some(record) = state.jobs.get_mut(job_id) {
                    record.status = JobStatus::Cancelled;
                    record.payload.audio = Vec::new();
                    // Expiration is capped at admission
                    record.expires_at = Some(record.payload.expires_after(now).unwrap_or(now));
                }
                Ok(CancelOutcome::Cancelled)
            }
            JobStatus::Cancelled => Ok(CancelOutcome::Cancelled),
            JobStatus::Processing | JobStatus::Done => Ok(CancelOutcome::RejectedProcessing),
        }
    }

    async fn wait_rank(&self, job_id: &str) -> Result<WaitRank, QueueError> {
        let state = self.state.lock().await;

        let Some(record) = state.jobs.get(job_id) else {
            return Ok(WaitRank::Resolved);
        };

        match record.status {
            JobStatus::Queued => {
                let ahead = state.tiers[record.priority.index()]
                    .pending
                    .iter()
                    .position(|id| id == job_id)
                    .ok_or_else(|| {
                        QueueError::StoreUnavailable(format!(
                            "queued job {} missing from its tier",
                            job_id
                        ))
                    })?;
                let higher = match record.priority {
                    Priority::High => 0,
                    Priority::Low => state.lengths().high,
                };
                Ok(WaitRank::Waiting(ahead + higher))
            }
            JobStatus::Processing => Ok(WaitRank::Waiting(0)),
            JobStatus::Done | JobStatus::Cancelled => Ok(WaitRank::Resolved),
        }
    }

    async fn complete(
        &self,
        job_id: &str,
        transcription: String,
        now: DateTime<Utc>,
    ) -> Result<ResultRecord, QueueError> {
        let mut state = self.state.lock().await;

        let record = state
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| QueueError::JobNotFound(job_id.to_string()))?;
        if record.status != JobStatus::Processing {
            return Err(QueueError::NotProcessing(job_id.to_string()));
        }

        let expires_at = record.payload.expires_after(now)?;
        record.status = JobStatus::Done;
        record.expires_at = Some(expires_at);

        let result = ResultRecord {
            job_id: job_id.to_string(),
            transcription,
            completed_at: now,
            expires_at,
        };
        state.results.insert(job_id.to_string(), result.clone());
        Ok(result)
    }

    async fn fetch(
        &self,
        job_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ResultRecord>, QueueError> {
        let mut state = self.state.lock().await;

        match state.results.get(job_id) {
            Some(result) if result.is_live(now) => Ok(Some(result.clone())),
            Some(_) => {
                debug!("Result for job {} expired, removing it", job_id);
                state.forget_result(job_id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, job_id: &str) -> Result<bool, QueueError> {
        let mut state = self.state.lock().await;
        Ok(state.forget_result(job_id))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, QueueError> {
        let mut state = self.state.lock().await;

        let expired: Vec<JobId> = state
            .jobs
            .values()
            .filter(|record| matches!(record.expires_at, Some(deadline) if deadline <= now))
            .map(|record| record.job_id.clone())
            .collect();

        for job_id in &expired {
            state.jobs.remove(job_id);
            state.results.remove(job_id);
        }

        Ok(expired.len())
    }

    async fn queue_lengths(&self) -> Result<QueueLengths, QueueError> {
        Ok(self.state.lock().await.lengths())
    }

    async fn wait_for_job(&self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.job_ready.notified()).await;
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::job::JobPayload;

    fn new_job(id: &str, priority: Priority, ttl_secs: u64) -> NewJob {
        NewJob {
            job_id: id.to_string(),
            priority,
            payload: JobPayload::new("en", vec![7; 4], "wav", Duration::from_secs(ttl_secs)),
            enqueued_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_sequences_are_per_tier() {
        let store = MemoryStore::new();
        assert_eq!(store.push(new_job("h1", Priority::High, 60)).await.unwrap(), 0);
        assert_eq!(store.push(new_job("l1", Priority::Low, 60)).await.unwrap(), 0);
        assert_eq!(store.push(new_job("h2", Priority::High, 60)).await.unwrap(), 1);
        assert_eq!(
            store.queue_lengths().await.unwrap(),
            QueueLengths { high: 2, low: 1 }
        );
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let store = MemoryStore::new();
        store.push(new_job("same", Priority::Low, 60)).await.unwrap();
        let err = store.push(new_job("same", Priority::High, 60)).await;
        assert!(matches!(err, Err(QueueError::InvalidJob(_))));
    }

    #[tokio::test]
    async fn test_claim_hands_over_audio_and_marks_processing() {
        let store = MemoryStore::new();
        store.push(new_job("a", Priority::Low, 60)).await.unwrap();

        let job = store.claim_next().await.unwrap().expect("job should be claimed");
        assert_eq!(job.job_id, "a");
        assert_eq!(job.payload.audio, vec![7; 4]);
        assert_eq!(store.wait_rank("a").await.unwrap(), WaitRank::Waiting(0));
        assert!(store.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_complete_requires_processing() {
        let store = MemoryStore::new();
        store.push(new_job("a", Priority::High, 60)).await.unwrap();

        let err = store.complete("a", "text".into(), Utc::now()).await;
        assert!(matches!(err, Err(QueueError::NotProcessing(_))));

        let err = store.complete("missing", "text".into(), Utc::now()).await;
        assert!(matches!(err, Err(QueueError::JobNotFound(_))));
    }

    #[tokio::test]
    async fn test_fetch_hides_expired_result_lazily() {
        let store = MemoryStore::new();
        store.push(new_job("a", Priority::High, 10)).await.unwrap();
        store.claim_next().await.unwrap();

        let now = Utc::now();
        let result = store.complete("a", "hello".into(), now).await.unwrap();
        assert_eq!(result.expires_at, now + chrono::Duration::seconds(10));

        let fetched = store.fetch("a", now).await.unwrap();
        assert_eq!(fetched.map(|r| r.transcription), Some("hello".to_string()));

        assert!(store.fetch("a", result.expires_at).await.unwrap().is_none());
        // Lazy removal also forgets the job itself
        assert_eq!(store.cancel("a", now).await.unwrap(), CancelOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_purge_removes_results_and_tombstones() {
        let store = MemoryStore::new();
        store.push(new_job("done", Priority::High, 5)).await.unwrap();
        store.push(new_job("gone", Priority::Low, 5)).await.unwrap();
        store.push(new_job("kept", Priority::Low, 500)).await.unwrap();

        let now = Utc::now();
        store.claim_next().await.unwrap();
        store.complete("done", "x".into(), now).await.unwrap();
        assert_eq!(store.cancel("gone", now).await.unwrap(), CancelOutcome::Cancelled);

        assert_eq!(store.purge_expired(now).await.unwrap(), 0);
        let later = now + chrono::Duration::seconds(6);
        assert_eq!(store.purge_expired(later).await.unwrap(), 2);

        assert_eq!(store.cancel("gone", later).await.unwrap(), CancelOutcome::NotFound);
        assert_eq!(store.wait_rank("kept").await.unwrap(), WaitRank::Waiting(0));
    }

    #[tokio::test]
    async fn test_wait_for_job_wakes_on_push() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let waiter = {
            let store = store.clone();
            tokio::spawn(async move {
                let started = std::time::Instant::now();
                store.wait_for_job(Duration::from_secs(5)).await;
                started.elapsed()
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        store.push(new_job("a", Priority::Low, 60)).await.unwrap();

        let waited = waiter.await.unwrap();
        assert!(waited < Duration::from_secs(5));
    }
}
