// Transcription job queue
//
// Priority-ordered admission, exactly-once dequeue, cancellation, wait rank
// reporting and TTL-bounded result storage, over a pluggable shared store.

pub mod error;
pub mod job;
pub mod manager;
pub mod memory;
pub mod redis_store;
pub mod store;

#[cfg(test)]
mod tests;

pub use error::QueueError;
pub use job::{
    CancelOutcome, DequeuedJob, JobId, JobPayload, JobStatus, Priority, QueueLengths,
    ResultRecord, WaitRank,
};
pub use manager::JobQueue;
pub use memory::MemoryStore;
pub use redis_store::{RedisStore, RedisStoreConfig};
pub use store::JobStore;

use log::info;
use std::sync::Arc;

use crate::config::{StoreBackend, StoreConfig};

/// Open the job store selected by the configuration
///
/// # Errors
/// Returns `StoreUnavailable` if the Redis backend cannot be reached
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn JobStore>, QueueError> {
    match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory job store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Redis => Ok(Arc::new(RedisStore::connect(&config.redis).await?)),
    }
}
