//! Redis backed job store
//!
//! Lets any number of API servers and workers share one queue. Each operation
//! that reads and changes a job's status runs as a single Lua script, which Redis
//! executes atomically, so claim and cancel on the same job are serialized.
//!
//! Key layout (with the configured prefix `p`):
//!
//! - `p:seq:{tier}`  per-tier sequence counter
//! - `p:queue:{tier}` list of queued job ids, head first
//! - `p:job:{id}`    hash with status, priority, sequence and payload fields
//! - `p:result:{id}` hash with the transcription and its deadlines
//!
//! Done and cancelled jobs get a native Redis TTL, so `purge_expired` has nothing
//! left to do for this backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use redis::aio::MultiplexedConnection;
use redis::{Client, Script};
use std::time::Duration;

use crate::queue::error::QueueError;
use crate::queue::job::{
    CancelOutcome, DequeuedJob, JobPayload, NewJob, Priority, QueueLengths, ResultRecord,
    WaitRank,
};
use crate::queue::store::JobStore;

const ENQUEUE_SCRIPT: &str = r#"
local sequence = redis.call('INCR', KEYS[1])
redis.call('HSET', KEYS[3],
    'status', 'queued',
    'priority', ARGV[2],
    'sequence', sequence,
    'language', ARGV[3],
    'audio_extension', ARGV[4],
    'expiration_ms', ARGV[5],
    'enqueued_at_ms', ARGV[6],
    'audio', ARGV[7])
redis.call('RPUSH', KEYS[2], ARGV[1])
return sequence
"#;

const CLAIM_SCRIPT: &str = r#"
for i = 1, #KEYS do
    local id = redis.call('LPOP', KEYS[i])
    if id then
        local key = ARGV[1] .. id
        redis.call('HSET', key, 'status', 'processing')
        local f = redis.call('HMGET', key, 'priority', 'sequence', 'language',
            'audio_extension', 'expiration_ms', 'enqueued_at_ms', 'audio')
        redis.call('HDEL', key, 'audio')
        return {id, f[1], f[2], f[3], f[4], f[5], f[6], f[7]}
    end
end
return false
"#;

const CANCEL_SCRIPT: &str = r#"
local status = redis.call('HGET', KEYS[1], 'status')
if not status then
    return 'not_found'
end
if status == 'cancelled' then
    return 'cancelled'
end
if status ~= 'queued' then
    return 'rejected_processing'
end
local tier = KEYS[3]
if redis.call('HGET', KEYS[1], 'priority') == 'high' then
    tier = KEYS[2]
end
redis.call('LREM', tier, 1, ARGV[1])
redis.call('HSET', KEYS[1], 'status', 'cancelled')
redis.call('HDEL', KEYS[1], 'audio')
redis.call('PEXPIRE', KEYS[1], tonumber(redis.call('HGET', KEYS[1], 'expiration_ms')))
return 'cancelled'
"#;

const RANK_SCRIPT: &str = r#"
local status = redis.call('HGET', KEYS[1], 'status')
if status == 'processing' then
    return 0
end
if status ~= 'queued' then
    return -1
end
if redis.call('HGET', KEYS[1], 'priority') == 'high' then
    local pos = redis.call('LPOS', KEYS[2], ARGV[1])
    if not pos then
        return -2
    end
    return pos
end
local pos = redis.call('LPOS', KEYS[3], ARGV[1])
if not pos then
    return -2
end
return pos + redis.call('LLEN', KEYS[2])
"#;

const COMPLETE_SCRIPT: &str = r#"
local status = redis.call('HGET', KEYS[1], 'status')
if not status then
    return -1
end
if status ~= 'processing' then
    return -2
end
local ttl = tonumber(redis.call('HGET', KEYS[1], 'expiration_ms'))
local expires_at = tonumber(ARGV[2]) + ttl
redis.call('HSET', KEYS[1], 'status', 'done')
redis.call('HSET', KEYS[2],
    'transcription', ARGV[1],
    'completed_at_ms', ARGV[2],
    'expires_at_ms', expires_at)
redis.call('PEXPIRE', KEYS[1], ttl)
redis.call('PEXPIRE', KEYS[2], ttl)
return expires_at
"#;

const DELETE_SCRIPT: &str = r#"
if redis.call('DEL', KEYS[1]) == 1 then
    redis.call('DEL', KEYS[2])
    return 1
end
return 0
"#;

/// Row returned by the claim script
type ClaimedRow = (String, String, u64, String, String, u64, i64, Vec<u8>);

/// Configuration for the Redis store
#[derive(Clone, Debug)]
pub struct RedisStoreConfig {
    pub redis_url: String,
    pub key_prefix: String,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "whisper_queue".to_string(),
        }
    }
}

/// Job store shared through a Redis server
pub struct RedisStore {
    conn: MultiplexedConnection,
    prefix: String,
    enqueue: Script,
    claim: Script,
    cancel: Script,
    rank: Script,
    complete: Script,
    delete: Script,
}

impl RedisStore {
    /// Connect to Redis
    ///
    /// # Errors
    /// Returns `StoreUnavailable` if the URL is invalid or the server cannot be reached
    pub async fn connect(config: &RedisStoreConfig) -> Result<Self, QueueError> {
        let client = Client::open(config.redis_url.as_str())?;
        let conn = client.get_multiplexed_async_connection().await?;
        info!("Connected to Redis job store at {}", config.redis_url);
        warn!(
            "Redis job store scripts derive job keys from the prefix '{}' and are not Redis Cluster safe; use a standalone server",
            config.key_prefix
        );

        Ok(Self {
            conn,
            prefix: config.key_prefix.clone(),
            enqueue: Script::new(ENQUEUE_SCRIPT),
            claim: Script::new(CLAIM_SCRIPT),
            cancel: Script::new(CANCEL_SCRIPT),
            rank: Script::new(RANK_SCRIPT),
            complete: Script::new(COMPLETE_SCRIPT),
            delete: Script::new(DELETE_SCRIPT),
        })
    }

    fn sequence_key(&self, priority: Priority) -> String {
        format!("{}:seq:{}", self.prefix, priority)
    }

    fn queue_key(&self, priority: Priority) -> String {
        format!("{}:queue:{}", self.prefix, priority)
    }

    fn job_key_prefix(&self) -> String {
        format!("{}:job:", self.prefix)
    }

    fn job_key(&self, job_id: &str) -> String {
        format!("{}{}", self.job_key_prefix(), job_id)
    }

    fn result_key(&self, job_id: &str) -> String {
        format!("{}:result:{}", self.prefix, job_id)
    }
}

fn timestamp_from_millis(ms: i64) -> Result<DateTime<Utc>, QueueError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| QueueError::Serialization(format!("invalid timestamp {}", ms)))
}

fn millis(duration: Duration) -> Result<u64, QueueError> {
    u64::try_from(duration.as_millis())
        .map_err(|_| QueueError::InvalidJob("expiration is too large".to_string()))
}

#[async_trait]
impl JobStore for RedisStore {
    async fn push(&self, job: NewJob) -> Result<u64, QueueError> {
        job.payload.validate()?;
        let mut conn = self.conn.clone();
        let sequence: u64 = self
            .enqueue
            .key(self.sequence_key(job.priority))
            .key(self.queue_key(job.priority))
            .key(self.job_key(&job.job_id))
            .arg(&job.job_id)
            .arg(job.priority.as_str())
            .arg(&job.payload.language)
            .arg(&job.payload.audio_extension)
            .arg(millis(job.payload.expiration)?)
            .arg(job.enqueued_at.timestamp_millis())
            .arg(job.payload.audio.as_slice())
            .invoke_async(&mut conn)
            .await?;

        // Redis sequences start at 1, the memory store at 0
        Ok(sequence.saturating_sub(1))
    }

    async fn claim_next(&self) -> Result<Option<DequeuedJob>, QueueError> {
        let mut conn = self.conn.clone();
        let row: Option<ClaimedRow> = self
            .claim
            .key(self.queue_key(Priority::High))
            .key(self.queue_key(Priority::Low))
            .arg(self.job_key_prefix())
            .invoke_async(&mut conn)
            .await?;

        let Some((job_id, priority, sequence, language, extension, expiration_ms, enqueued_ms, audio)) =
            row
        else {
            return Ok(None);
        };

        debug!("Claimed {} job {} from Redis", priority, job_id);
        Ok(Some(DequeuedJob {
            job_id,
            priority: priority.parse()?,
            sequence: sequence.saturating_sub(1),
            payload: JobPayload::new(
                language,
                audio,
                extension,
                Duration::from_millis(expiration_ms),
            ),
            enqueued_at: timestamp_from_millis(enqueued_ms)?,
        }))
    }

    async fn cancel(&self, job_id: &str, _now: DateTime<Utc>) -> Result<CancelOutcome, QueueError> {
        let mut conn = self.conn.clone();
        let outcome: String = self
            .cancel
            .key(self.job_key(job_id))
            .key(self.queue_key(Priority::High))
            .key(self.queue_key(Priority::Low))
            .arg(job_id)
            .invoke_async(&mut conn)
            .await?;

        match outcome.as_str() {
            "cancelled" => Ok(CancelOutcome::Cancelled),
            "rejected_processing" => Ok(CancelOutcome::RejectedProcessing),
            "not_found" => Ok(CancelOutcome::NotFound),
            other => Err(QueueError::Serialization(format!(
                "unexpected cancel outcome '{}'",
                other
            ))),
        }
    }

    async fn wait_rank(&self, job_id: &str) -> Result<WaitRank, QueueError> {
        let mut conn = self.conn.clone();
        let rank: i64 = self
            .rank
            .key(self.job_key(job_id))
            .key(self.queue_key(Priority::High))
            .key(self.queue_key(Priority::Low))
            .arg(job_id)
            .invoke_async(&mut conn)
            .await?;

        match rank {
            -1 => Ok(WaitRank::Resolved),
            n if n >= 0 => Ok(WaitRank::Waiting(n as usize)),
            _ => Err(QueueError::StoreUnavailable(format!(
                "queued job {} missing from its tier",
                job_id
            ))),
        }
    }

    async fn complete(
        &self,
        job_id: &str,
        transcription: String,
        now: DateTime<Utc>,
    ) -> Result<ResultRecord, QueueError> {
        let mut conn = self.conn.clone();
        let completed_ms = now.timestamp_millis();
        let expires_ms: i64 = self
            .complete
            .key(self.job_key(job_id))
            .key(self.result_key(job_id))
            .arg(&transcription)
            .arg(completed_ms)
            .invoke_async(&mut conn)
            .await?;

        match expires_ms {
            -1 => Err(QueueError::JobNotFound(job_id.to_string())),
            -2 => Err(QueueError::NotProcessing(job_id.to_string())),
            ms => Ok(ResultRecord {
                job_id: job_id.to_string(),
                transcription,
                completed_at: timestamp_from_millis(completed_ms)?,
                expires_at: timestamp_from_millis(ms)?,
            }),
        }
    }

    async fn fetch(
        &self,
        job_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ResultRecord>, QueueError> {
        let mut conn = self.conn.clone();
        let (transcription, completed_ms, expires_ms): (Option<String>, Option<i64>, Option<i64>) =
            redis::cmd("HMGET")
                .arg(self.result_key(job_id))
                .arg("transcription")
                .arg("completed_at_ms")
                .arg("expires_at_ms")
                .query_async(&mut conn)
                .await?;

        let (Some(transcription), Some(completed_ms), Some(expires_ms)) =
            (transcription, completed_ms, expires_ms)
        else {
            return Ok(None);
        };

        let record = ResultRecord {
            job_id: job_id.to_string(),
            transcription,
            completed_at: timestamp_from_millis(completed_ms)?,
            expires_at: timestamp_from_millis(expires_ms)?,
        };
        // The key TTL has millisecond granularity on the server clock; the
        // deadline check keeps reads exact on ours.
        Ok(record.is_live(now).then_some(record))
    }

    async fn delete(&self, job_id: &str) -> Result<bool, QueueError> {
        let mut conn = self.conn.clone();
        let removed: i64 = self
            .delete
            .key(self.result_key(job_id))
            .key(self.job_key(job_id))
            .invoke_async(&mut conn)
            .await?;
        Ok(removed == 1)
    }

    async fn purge_expired(&self, _now: DateTime<Utc>) -> Result<usize, QueueError> {
        Ok(0)
    }

    async fn queue_lengths(&self) -> Result<QueueLengths, QueueError> {
        let mut conn = self.conn.clone();
        let (high, low): (usize, usize) = redis::pipe()
            .llen(self.queue_key(Priority::High))
            .llen(self.queue_key(Priority::Low))
            .query_async(&mut conn)
            .await?;
        Ok(QueueLengths { high, low })
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
