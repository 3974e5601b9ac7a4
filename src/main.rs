use std::io;
use std::sync::Arc;

use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{web, App, HttpServer};
use env_logger::Env;
use log::{error, info, warn};
use tokio::sync::watch;

use whisper_queue::config::StoreBackend;
use whisper_queue::config_loader::load_config;
use whisper_queue::config_validator::ConfigValidator;
use whisper_queue::handlers::configure;
use whisper_queue::queue::{open_store, JobQueue};
use whisper_queue::{CommandTranscriber, Metrics, Worker};

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    // Reference material only, no server
    match std::env::args().nth(1).as_deref() {
        Some("--sample-config") => {
            print!("{}", ConfigValidator::generate_sample_config());
            return Ok(());
        }
        Some("--config-docs") => {
            print!("{}", ConfigValidator::generate_config_documentation());
            return Ok(());
        }
        _ => {}
    }

    // Config file values become env vars, then everything is validated at once
    load_config();
    let config = match ConfigValidator::validate_and_load() {
        Ok(config) => config,
        Err(results) => {
            error!(
                "Refusing to start with {} configuration error(s)",
                results.errors.len()
            );
            std::process::exit(1);
        }
    };

    let metrics = Metrics::from_config(&config.metrics);
    let store = open_store(&config.store).await.map_err(|e| {
        error!("Failed to open job store: {}", e);
        io::Error::new(io::ErrorKind::Other, e.to_string())
    })?;
    let queue =
        JobQueue::new(store, metrics.clone()).with_poll_interval(config.worker.poll_interval);
    let sweeper = queue.start_sweep_task(config.store.sweep_interval);

    // With the memory store only this process can see the jobs, so it runs the worker
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let memory_store = config.store.backend == StoreBackend::Memory;
    let embedded_worker = if memory_store && config.server.embedded_worker {
        let transcriber = Arc::new(CommandTranscriber::from_config(&config.worker));
        let worker = Worker::new(queue.clone(), transcriber, metrics.clone(), &config.worker);
        info!("Transcription command: {}", config.worker.command_path);
        Some(tokio::spawn(worker.run(shutdown_rx)))
    } else {
        if memory_store {
            warn!("Embedded worker disabled with the memory store: jobs will never be processed");
        }
        None
    };

    let server_config = config.server.clone();
    let handler_config = config.handler.clone();

    info!(
        "Starting Whisper Queue server on http://{}",
        server_config.bind_address()
    );
    info!("Job store backend: {}", queue.backend_name());
    info!("Metrics exporter: {}", config.metrics.exporter_type);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(DefaultHeaders::new().add(("Access-Control-Allow-Origin", "*")))
            .app_data(web::Data::new(queue.clone()))
            .app_data(web::Data::new(handler_config.clone()))
            .app_data(web::Data::new(metrics.clone()))
            .configure(configure)
    })
    .workers(server_config.worker_count())
    .bind(server_config.bind_address())?
    .client_disconnect_timeout(server_config.timeout)
    .keep_alive(server_config.keep_alive)
    .run();

    let result = server.await;

    sweeper.abort();
    if let Some(handle) = embedded_worker {
        let _ = shutdown_tx.send(true);
        if let Err(e) = handle.await {
            warn!("Embedded worker ended abnormally: {}", e);
        }
    }
    info!("Whisper Queue server stopped");
    result
}
