// Whisper Queue configuration
//
// This module contains configuration structures and constants for the API
// server, the job store and the transcription workers. Values are filled in by
// `config_validator` from environment variables (optionally seeded from the
// configuration file by `config_loader`).

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::queue::RedisStoreConfig;

/// Default values for configuration
pub mod defaults {
    // HTTP server
    pub const HOST: &str = "127.0.0.1";
    pub const PORT: u16 = 8000;
    pub const TIMEOUT_SECONDS: u64 = 480;
    pub const KEEPALIVE_SECONDS: u64 = 480;

    // Result retention when the client does not send expiration_sec (one week)
    pub const EXPIRATION_SECONDS: u64 = 604_800;

    // Max size of a single uploaded audio file (512MB)
    pub const MAX_FILE_SIZE: usize = 536_870_912;

    // Job store
    pub const STORE_BACKEND: &str = "memory";
    pub const VALID_STORE_BACKENDS: [&str; 2] = ["memory", "redis"];
    pub const REDIS_URL: &str = "redis://127.0.0.1:6379";
    pub const REDIS_KEY_PREFIX: &str = "whisper_queue";
    pub const SWEEP_INTERVAL_SECONDS: u64 = 60;

    // Worker
    pub const TEMP_DIR: &str = "/tmp/whisper_queue";
    pub const WHISPER_CMD: &str = "/usr/local/bin/whisper-transcribe";
    pub const OUTPUT_DIR: &str = "/tmp/whisper_queue/output";
    pub const POLL_INTERVAL_MS: u64 = 1000;
    pub const EMBEDDED_WORKER: bool = true;

    // Metrics
    pub const METRICS_BACKEND: &str = "none";
    pub const VALID_METRICS_BACKENDS: [&str; 4] = ["prometheus", "statsd", "none", "disabled"];
}

/// HTTP server settings
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Client disconnect timeout
    pub timeout: Duration,
    pub keep_alive: Duration,
    /// Number of HTTP workers (0 = one per CPU core)
    pub workers: usize,
    /// Run a transcription worker inside the server process (memory store only)
    pub embedded_worker: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: defaults::PORT,
            timeout: Duration::from_secs(defaults::TIMEOUT_SECONDS),
            keep_alive: Duration::from_secs(defaults::KEEPALIVE_SECONDS),
            workers: 0,
            embedded_worker: defaults::EMBEDDED_WORKER,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// HTTP worker count with 0 resolved to the number of CPU cores
    pub fn worker_count(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        }
    }
}

/// Configuration for the HTTP handlers
#[derive(Clone, Debug)]
pub struct HandlerConfig {
    /// Largest accepted audio file, in bytes
    pub max_file_size: usize,
    /// Result retention applied when the form has no expiration_sec
    pub default_expiration_secs: u64,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            max_file_size: defaults::MAX_FILE_SIZE,
            default_expiration_secs: defaults::EXPIRATION_SECONDS,
        }
    }
}

/// Which job store implementation to use
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Redis,
}

impl StoreBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "memory" => Some(StoreBackend::Memory),
            "redis" => Some(StoreBackend::Redis),
            _ => None,
        }
    }
}

/// Job store settings
#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub redis: RedisStoreConfig,
    /// Interval of the expired-result sweep
    pub sweep_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            redis: RedisStoreConfig {
                redis_url: defaults::REDIS_URL.to_string(),
                key_prefix: defaults::REDIS_KEY_PREFIX.to_string(),
            },
            sweep_interval: Duration::from_secs(defaults::SWEEP_INTERVAL_SECONDS),
        }
    }
}

/// Transcription worker settings
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Command invoked for every job
    pub command_path: String,
    /// Directory the command writes its transcripts to
    pub output_dir: PathBuf,
    /// Directory where job audio is saved before transcription
    pub temp_dir: PathBuf,
    /// Longest wait for a job before polling again
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            command_path: defaults::WHISPER_CMD.to_string(),
            output_dir: PathBuf::from(defaults::OUTPUT_DIR),
            temp_dir: PathBuf::from(defaults::TEMP_DIR),
            poll_interval: Duration::from_millis(defaults::POLL_INTERVAL_MS),
        }
    }
}

/// Configuration for metrics collection and export
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Type of metrics exporter ("prometheus", "statsd", "none")
    pub exporter_type: String,
    /// Endpoint for metrics exporter (StatsD)
    pub endpoint: Option<String>,
    /// Metrics prefix for all metrics
    pub prefix: Option<String>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            exporter_type: defaults::METRICS_BACKEND.to_string(),
            endpoint: None,
            prefix: None,
        }
    }
}

/// Complete, validated application configuration
#[derive(Clone, Debug, Default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub handler: HandlerConfig,
    pub store: StoreConfig,
    pub worker: WorkerConfig,
    pub metrics: MetricsConfig,
}
