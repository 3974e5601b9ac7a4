// Transcription worker
//
// A worker claims one job at a time from the shared queue, writes its audio to
// a private folder, runs the transcriber on it and stores the text as the job
// result. Any number of workers may share one queue.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::watch;
use uuid::Uuid;

use crate::config::WorkerConfig;
use crate::file_utils::{cleanup_folder, job_folder, read_text_file, save_job_audio};
use crate::metrics::Metrics;
use crate::queue::{DequeuedJob, JobQueue, QueueError};

/// Attempts made to store a result before the transcription is given up
const MAX_COMPLETE_ATTEMPTS: u32 = 10;

/// Worker error types
#[derive(Error, Debug)]
pub enum WorkerError {
    /// The transcription command could not be started or failed
    #[error("Transcription failed: {0}")]
    Transcription(String),
    /// IO error while handling job files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The queue rejected an operation
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Turns an audio file into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &Path, language: &str) -> Result<String, WorkerError>;
}

/// Runs an external transcription command
///
/// The command is called as
/// `<cmd> <audio> --language <lang> --output_dir <dir> --output_format txt`
/// and is expected to write `<dir>/<audio stem>.txt`. When it writes nothing,
/// its standard output is used instead.
pub struct CommandTranscriber {
    command_path: String,
    output_dir: PathBuf,
}

impl CommandTranscriber {
    pub fn new(command_path: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            command_path: command_path.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.command_path.clone(), config.output_dir.clone())
    }
}

#[async_trait]
impl Transcriber for CommandTranscriber {
    async fn transcribe(&self, audio: &Path, language: &str) -> Result<String, WorkerError> {
        // One output folder per run, workers may share output_dir
        let run_dir = self.output_dir.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&run_dir).await?;

        let output = Command::new(&self.command_path)
            .arg(audio)
            .arg("--language")
            .arg(language)
            .arg("--output_dir")
            .arg(&run_dir)
            .arg("--output_format")
            .arg("txt")
            .stdin(Stdio::null())
            .output()
            .await;

        let result = match output {
            Err(e) => Err(WorkerError::Transcription(format!(
                "Failed to run command {}: {}",
                self.command_path, e
            ))),
            Ok(output) if !output.status.success() => Err(WorkerError::Transcription(format!(
                "{} exited with {}: {}",
                self.command_path,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
            Ok(output) => {
                let stem = audio
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("audio");
                let output_file = run_dir.join(format!("{}.txt", stem));
                match read_text_file(&output_file).await {
                    Ok(text) => Ok(text.trim_end().to_string()),
                    Err(_) => {
                        debug!(
                            "No output file at {}, using command stdout",
                            output_file.display()
                        );
                        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
                    }
                }
            }
        };

        cleanup_folder(&run_dir);
        result
    }
}

/// Single-job-at-a-time queue consumer
pub struct Worker {
    queue: JobQueue,
    transcriber: Arc<dyn Transcriber>,
    metrics: Metrics,
    temp_dir: PathBuf,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(
        queue: JobQueue,
        transcriber: Arc<dyn Transcriber>,
        metrics: Metrics,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            queue,
            transcriber,
            metrics,
            temp_dir: config.temp_dir.clone(),
            poll_interval: config.poll_interval,
        }
    }

    /// Process jobs until `shutdown` turns true
    ///
    /// The signal is checked between jobs; a job being transcribed always finishes.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Worker started: temp dir {}, poll interval {}ms",
            self.temp_dir.display(),
            self.poll_interval.as_millis()
        );

        while !*shutdown.borrow_and_update() {
            match self.process_next(self.poll_interval).await {
                Ok(_) => {}
                Err(e) => {
                    error!("Failed to fetch next job: {}", e);
                    // Store faults are retried after one poll interval
                    tokio::select! {
                        _ = tokio::time::sleep(self.poll_interval) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
        }

        info!("Worker stopped");
    }

    /// Wait up to `timeout` for a job and process it
    ///
    /// Returns whether a job was claimed. Only queue faults while claiming are
    /// returned as errors; failures of the job itself are logged.
    pub async fn process_next(&self, timeout: Duration) -> Result<bool, QueueError> {
        match self.queue.dequeue_timeout(timeout).await? {
            Some(job) => {
                self.process_job(job).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn process_job(&self, job: DequeuedJob) {
        let start_time = Instant::now();
        let language = job.payload.language.clone();
        info!("Processing job {} ({} priority)", job.job_id, job.priority);

        let folder = job_folder(&self.temp_dir, &job.job_id);
        let outcome = self.transcribe_job(&job).await;
        cleanup_folder(&folder);

        let duration = start_time.elapsed().as_secs_f64();
        let transcription = match outcome {
            Ok(text) => text,
            Err(e) => {
                // No failed state exists: the job stays in processing
                error!("Job {} failed: {}", job.job_id, e);
                self.metrics
                    .record_transcription(&language, duration, "failed")
                    .await;
                return;
            }
        };

        self.metrics
            .record_transcription(&language, duration, "success")
            .await;

        match self.store_result(&job.job_id, transcription).await {
            Ok(()) => info!("Processing completed: {} in {:.2}s", job.job_id, duration),
            Err(e) => error!("Could not store result of job {}: {}", job.job_id, e),
        }
    }

    /// Record a finished transcription, retrying while the store is unreachable
    async fn store_result(&self, job_id: &str, transcription: String) -> Result<(), QueueError> {
        let mut attempt = 1;
        loop {
            match self.queue.complete(job_id, transcription.clone()).await {
                Ok(_) => return Ok(()),
                Err(QueueError::StoreUnavailable(reason)) if attempt < MAX_COMPLETE_ATTEMPTS => {
                    warn!(
                        "Storing result of job {} failed (attempt {}/{}): {}",
                        job_id, attempt, MAX_COMPLETE_ATTEMPTS, reason
                    );
                    attempt += 1;
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn transcribe_job(&self, job: &DequeuedJob) -> Result<String, WorkerError> {
        let audio_file = save_job_audio(
            &self.temp_dir,
            &job.job_id,
            &job.payload.audio_extension,
            &job.payload.audio,
        )
        .await?;
        debug!("Saved audio of job {} to {}", job.job_id, audio_file.display());

        self.transcriber
            .transcribe(&audio_file, &job.payload.language)
            .await
    }
}
