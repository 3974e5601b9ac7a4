// API route handlers for Whisper Queue
//
// Every handler records a request duration sample labelled with the endpoint
// pattern, the method and the final status code, including error responses.

use std::time::{Duration, Instant};

use actix_multipart::Multipart;
use actix_web::{delete, get, post, web, HttpResponse, ResponseError};
use log::{error, info};

use crate::config::HandlerConfig;
use crate::error::HandlerError;
use crate::handlers::form::extract_job_form;
use crate::metrics::Metrics;
use crate::models::{
    DataResponse, JobIdData, StatusResponse, SuccessResponse, TranscriptionData, WaitData,
};
use crate::queue::{CancelOutcome, JobPayload, JobQueue, Priority, WaitRank};

async fn observe(
    metrics: &Metrics,
    endpoint: &str,
    method: &str,
    start_time: Instant,
    result: &Result<HttpResponse, HandlerError>,
) {
    let status = match result {
        Ok(response) => response.status(),
        Err(e) => e.status_code(),
    };
    metrics
        .record_http_request(
            endpoint,
            method,
            status.as_str(),
            start_time.elapsed().as_secs_f64(),
        )
        .await;
}

/// Handler for job submission
///
/// Every audio file of the form becomes its own job, enqueued in form order.
#[post("/add-job/{priority}-priority")]
pub async fn add_job(
    priority: web::Path<String>,
    form: Multipart,
    queue: web::Data<JobQueue>,
    config: web::Data<HandlerConfig>,
    metrics: web::Data<Metrics>,
) -> Result<HttpResponse, HandlerError> {
    let start_time = Instant::now();
    let result = add_job_inner(&priority, form, &queue, &config).await;
    observe(&metrics, "/add-job/{priority}-priority", "POST", start_time, &result).await;
    result
}

async fn add_job_inner(
    priority: &str,
    form: Multipart,
    queue: &JobQueue,
    config: &HandlerConfig,
) -> Result<HttpResponse, HandlerError> {
    let priority: Priority = priority
        .parse()
        .map_err(|_| HandlerError::InvalidPriority(priority.to_string()))?;
    let params = extract_job_form(form, config).await?;

    let expiration = Duration::from_secs(params.expiration_secs);
    let payloads = params
        .audio_files
        .into_iter()
        .map(|audio| JobPayload::new(&params.language, audio.data, &audio.extension, expiration))
        .collect();

    let job_ids = queue.enqueue_batch(priority, payloads).await.map_err(|e| {
        error!("Failed to add job to queue: {}", e);
        HandlerError::from(e)
    })?;
    info!("Accepted {} job(s) with {} priority", job_ids.len(), priority);

    let data: Vec<JobIdData> = job_ids.into_iter().map(|job_id| JobIdData { job_id }).collect();
    Ok(HttpResponse::Ok().json(DataResponse::new(data)))
}

/// Handler for transcription results
///
/// Answers 202 with the number of jobs ahead while the job waits or runs,
/// 200 with the transcription once stored, 404 otherwise.
#[get("/get-result/{job_id}")]
pub async fn get_result(
    job_id: web::Path<String>,
    queue: web::Data<JobQueue>,
    metrics: web::Data<Metrics>,
) -> Result<HttpResponse, HandlerError> {
    let start_time = Instant::now();
    let result = get_result_inner(&job_id, &queue).await;
    observe(&metrics, "/get-result/{job_id}", "GET", start_time, &result).await;
    result
}

async fn get_result_inner(job_id: &str, queue: &JobQueue) -> Result<HttpResponse, HandlerError> {
    if let WaitRank::Waiting(n_wait) = queue.wait_rank(job_id).await? {
        return Ok(HttpResponse::Accepted().json(DataResponse::new(WaitData { n_wait })));
    }

    match queue.fetch(job_id).await? {
        Some(transcription) => {
            Ok(HttpResponse::Ok().json(DataResponse::new(TranscriptionData { transcription })))
        }
        None => Err(HandlerError::JobNotFound(job_id.to_string())),
    }
}

/// Handler for removing a stored result before it expires
#[delete("/remove-result/{job_id}")]
pub async fn remove_result(
    job_id: web::Path<String>,
    queue: web::Data<JobQueue>,
    metrics: web::Data<Metrics>,
) -> Result<HttpResponse, HandlerError> {
    let start_time = Instant::now();
    let result = match queue.delete(&job_id).await {
        Ok(true) => Ok(HttpResponse::Ok().json(SuccessResponse {
            success: true,
            message: "Result removed successfully".to_string(),
        })),
        Ok(false) => Err(HandlerError::JobNotFound(job_id.to_string())),
        Err(e) => Err(e.into()),
    };
    observe(&metrics, "/remove-result/{job_id}", "DELETE", start_time, &result).await;
    result
}

/// Handler for canceling a job that no worker has claimed yet
#[delete("/cancel-job/{job_id}")]
pub async fn cancel_job(
    job_id: web::Path<String>,
    queue: web::Data<JobQueue>,
    metrics: web::Data<Metrics>,
) -> Result<HttpResponse, HandlerError> {
    let start_time = Instant::now();
    let job_id = job_id.into_inner();
    let result = match queue.cancel(&job_id).await {
        Ok(CancelOutcome::Cancelled) => Ok(HttpResponse::Ok().json(SuccessResponse {
            success: true,
            message: "Job canceled successfully".to_string(),
        })),
        Ok(CancelOutcome::RejectedProcessing) => Err(HandlerError::AlreadyProcessing(job_id)),
        Ok(CancelOutcome::NotFound) => Err(HandlerError::JobNotFound(job_id)),
        Err(e) => Err(e.into()),
    };
    observe(&metrics, "/cancel-job/{job_id}", "DELETE", start_time, &result).await;
    result
}

/// Queue depth per priority tier
#[get("/status")]
pub async fn api_status(queue: web::Data<JobQueue>) -> Result<HttpResponse, HandlerError> {
    let lengths = queue.queue_lengths().await?;
    Ok(HttpResponse::Ok().json(StatusResponse {
        backend: queue.backend_name(),
        queued: lengths,
        total_queued: lengths.total(),
    }))
}

/// Metrics endpoint handler
#[get("/metrics")]
pub async fn metrics_handler(metrics: web::Data<Metrics>) -> Result<HttpResponse, HandlerError> {
    let data = metrics.export().await.map_err(HandlerError::MetricsError)?;
    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4; charset=utf-8")
        .body(data))
}

/// Register every route on an app or scope
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(add_job)
        .service(get_result)
        .service(remove_result)
        .service(cancel_job)
        .service(api_status)
        .service(metrics_handler);
}
