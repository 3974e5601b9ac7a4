// Standalone transcription worker
//
// Claims jobs from the shared Redis store until interrupted. Start as many as
// there are transcription devices.

use std::process;
use std::sync::Arc;

use env_logger::Env;
use log::{error, info};
use tokio::sync::watch;

use whisper_queue::config::StoreBackend;
use whisper_queue::config_loader::load_config;
use whisper_queue::config_validator::ConfigValidator;
use whisper_queue::queue::{open_store, JobQueue};
use whisper_queue::{CommandTranscriber, Metrics, Worker};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    load_config();
    let config = match ConfigValidator::validate_and_load() {
        Ok(config) => config,
        Err(results) => {
            error!(
                "Refusing to start with {} configuration error(s)",
                results.errors.len()
            );
            process::exit(1);
        }
    };

    if config.store.backend == StoreBackend::Memory {
        error!(
            "The memory store is private to the API server process; \
             set STORE_BACKEND=redis to run standalone workers"
        );
        process::exit(1);
    }

    let metrics = Metrics::from_config(&config.metrics);
    let store = match open_store(&config.store).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open job store: {}", e);
            process::exit(1);
        }
    };
    let queue =
        JobQueue::new(store, metrics.clone()).with_poll_interval(config.worker.poll_interval);

    let transcriber = Arc::new(CommandTranscriber::from_config(&config.worker));
    let worker = Worker::new(queue, transcriber, metrics, &config.worker);
    info!("Transcription command: {}", config.worker.command_path);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(worker.run(shutdown_rx));

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Interrupt received, finishing current job"),
        Err(e) => error!("Failed to listen for interrupt: {}", e),
    }
    let _ = shutdown_tx.send(true);
    if let Err(e) = handle.await {
        error!("Worker ended abnormally: {}", e);
    }
}
