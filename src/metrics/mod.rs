//! Metrics for the transcription queue
//!
//! A small pluggable metrics layer: the application records through the
//! [`Metrics`] facade, and a [`MetricsExporter`] forwards to Prometheus, StatsD
//! or nowhere. Recording never fails the caller; exporters log their own errors.

pub mod null;
pub mod prometheus;
pub mod statsd;

use async_trait::async_trait;
use log::{debug, warn};
use std::sync::Arc;

use crate::config::MetricsConfig;
use crate::queue::job::{Priority, QueueLengths};
use self::null::NullExporter;
use self::prometheus::PrometheusExporter;
use self::statsd::StatsDExporter;

/// Metrics exporter trait for pluggable monitoring systems
#[async_trait]
pub trait MetricsExporter: Send + Sync {
    /// Increment a counter metric
    async fn increment(&self, name: &str, labels: &[(&str, &str)]);

    /// Add an arbitrary amount to a counter metric
    async fn increment_by(&self, name: &str, value: f64, labels: &[(&str, &str)]);

    /// Set a gauge metric value
    async fn set_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]);

    /// Observe a value in a histogram metric
    async fn observe_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]);

    /// Export metrics in the format expected by the monitoring system
    async fn export(&self) -> Result<Vec<u8>, String>;
}

/// Metrics facade for the application
#[derive(Clone)]
pub struct Metrics {
    exporter: Arc<dyn MetricsExporter>,
}

impl Metrics {
    pub fn new(exporter: Arc<dyn MetricsExporter>) -> Self {
        Self { exporter }
    }

    /// Build the facade for the exporter selected in the configuration
    pub fn from_config(config: &MetricsConfig) -> Self {
        Self::new(create_metrics_exporter(
            &config.exporter_type,
            config.endpoint.as_deref(),
            config.prefix.as_deref(),
        ))
    }

    /// Metrics that go nowhere, for tests and disabled setups
    pub fn disabled() -> Self {
        Self::new(Arc::new(NullExporter))
    }

    pub async fn increment(&self, name: &str, labels: &[(&str, &str)]) {
        self.exporter.increment(name, labels).await
    }

    pub async fn set_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        self.exporter.set_gauge(name, value, labels).await
    }

    pub async fn observe_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        self.exporter.observe_histogram(name, value, labels).await
    }

    /// Export metrics in the format expected by the monitoring system
    pub async fn export(&self) -> Result<Vec<u8>, String> {
        self.exporter.export().await
    }

    // Convenience methods for common metrics

    /// Record HTTP request duration
    pub async fn record_http_request(
        &self,
        endpoint: &str,
        method: &str,
        status: &str,
        duration: f64,
    ) {
        let labels = [("endpoint", endpoint), ("method", method), ("status", status)];
        self.observe_histogram("http_request_duration_seconds", duration, &labels)
            .await;
        self.increment("http_requests_total", &labels).await;
    }

    pub async fn record_job_enqueued(&self, priority: Priority) {
        self.increment("jobs_enqueued_total", &[("priority", priority.as_str())])
            .await;
    }

    pub async fn record_job_dequeued(&self, priority: Priority) {
        self.increment("jobs_dequeued_total", &[("priority", priority.as_str())])
            .await;
    }

    pub async fn record_job_cancelled(&self) {
        self.increment("jobs_cancelled_total", &[]).await;
    }

    pub async fn record_job_completed(&self) {
        self.increment("jobs_completed_total", &[]).await;
    }

    /// Record how long a worker spent on one transcription
    pub async fn record_transcription(&self, language: &str, duration: f64, status: &str) {
        self.observe_histogram(
            "transcription_duration_seconds",
            duration,
            &[("language", language), ("status", status)],
        )
        .await;
    }

    pub async fn record_results_expired(&self, count: usize) {
        self.exporter
            .increment_by("results_expired_total", count as f64, &[])
            .await;
    }

    /// Record uploaded audio size
    pub async fn record_file_size(&self, size_bytes: f64) {
        self.observe_histogram("file_size_bytes", size_bytes, &[])
            .await;
    }

    /// Set the queue depth gauge of both tiers
    pub async fn set_queue_sizes(&self, lengths: QueueLengths) {
        for priority in Priority::ALL {
            self.set_gauge(
                "queue_size",
                lengths.get(priority) as f64,
                &[("priority", priority.as_str())],
            )
            .await;
        }
    }
}

/// Factory function to create metrics exporter based on configuration
pub fn create_metrics_exporter(
    exporter_type: &str,
    endpoint: Option<&str>,
    prefix: Option<&str>,
) -> Arc<dyn MetricsExporter> {
    match exporter_type.to_lowercase().as_str() {
        "prometheus" => {
            debug!("Initializing Prometheus metrics exporter");
            Arc::new(PrometheusExporter::new(prefix))
        }
        "statsd" => {
            let endpoint = endpoint.unwrap_or("127.0.0.1:8125");
            debug!(
                "Initializing StatsD metrics exporter with endpoint: {}",
                endpoint
            );
            match StatsDExporter::new(endpoint, prefix.map(String::from)) {
                Ok(exporter) => Arc::new(exporter),
                Err(e) => {
                    warn!("{}, using null exporter", e);
                    Arc::new(NullExporter)
                }
            }
        }
        "none" | "disabled" => {
            debug!("Metrics disabled, using null exporter");
            Arc::new(NullExporter)
        }
        _ => {
            warn!(
                "Unknown metrics exporter type '{}', using null exporter",
                exporter_type
            );
            Arc::new(NullExporter)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_prometheus_export_contains_queue_metrics() {
        let metrics = Metrics::new(create_metrics_exporter("prometheus", None, None));

        metrics.record_job_enqueued(Priority::High).await;
        metrics.record_job_enqueued(Priority::Low).await;
        metrics
            .set_queue_sizes(QueueLengths { high: 3, low: 5 })
            .await;
        metrics.record_results_expired(2).await;

        let exported = String::from_utf8(metrics.export().await.unwrap()).unwrap();
        assert!(exported.contains("jobs_enqueued_total{priority=\"high\"} 1"));
        assert!(exported.contains("queue_size{priority=\"low\"} 5"));
        assert!(exported.contains("results_expired_total 2"));
    }

    #[tokio::test]
    async fn test_prometheus_prefix_is_applied() {
        let metrics = Metrics::new(create_metrics_exporter("prometheus", None, Some("wq")));
        metrics.record_job_completed().await;

        let exported = String::from_utf8(metrics.export().await.unwrap()).unwrap();
        assert!(exported.contains("wq_jobs_completed_total 1"));
    }

    #[tokio::test]
    async fn test_unknown_backend_falls_back_to_null() {
        let metrics = Metrics::new(create_metrics_exporter("graphite", None, None));
        metrics.record_job_cancelled().await;
        assert_eq!(metrics.export().await.unwrap(), Vec::<u8>::new());
    }
}
