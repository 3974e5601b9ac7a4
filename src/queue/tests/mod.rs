//! Behavioural tests for the job queue
//!
//! These run against the memory store through the public `JobQueue` handle.

mod concurrency_tests;
mod scenario_tests;

use std::sync::Arc;
use std::time::Duration;

use crate::metrics::Metrics;
use crate::queue::{JobPayload, JobQueue, MemoryStore};

fn memory_queue() -> JobQueue {
    JobQueue::new(Arc::new(MemoryStore::new()), Metrics::disabled())
        .with_poll_interval(Duration::from_millis(20))
}

fn payload(expiration_secs: u64) -> JobPayload {
    JobPayload::new("Japanese", b"fake audio".to_vec(), "mp3", Duration::from_secs(expiration_secs))
}
