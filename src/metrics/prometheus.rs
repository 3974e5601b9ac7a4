// Prometheus metrics exporter
//
// Metrics are created lazily on first use and registered in a private registry,
// which `export` renders in the Prometheus text format.

use crate::metrics::MetricsExporter;
use async_trait::async_trait;
use log::{debug, warn};
use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Prometheus implementation of MetricsExporter
pub struct PrometheusExporter {
    registry: Registry,
    namespace: Option<String>,
    counters: Mutex<HashMap<String, CounterVec>>,
    gauges: Mutex<HashMap<String, GaugeVec>>,
    histograms: Mutex<HashMap<String, HistogramVec>>,
}

impl PrometheusExporter {
    /// Create an exporter; `namespace` is prepended to every metric name
    pub fn new(namespace: Option<&str>) -> Self {
        Self {
            registry: Registry::new(),
            namespace: namespace.filter(|ns| !ns.is_empty()).map(String::from),
            counters: Mutex::new(HashMap::new()),
            gauges: Mutex::new(HashMap::new()),
            histograms: Mutex::new(HashMap::new()),
        }
    }

    fn opts(&self, name: &str, help: &str) -> Opts {
        let opts = Opts::new(name, help);
        match &self.namespace {
            Some(namespace) => opts.namespace(namespace.clone()),
            None => opts,
        }
    }

    fn register<M>(&self, name: &str, metric: &M) -> bool
    where
        M: prometheus::core::Collector + Clone + 'static,
    {
        match self.registry.register(Box::new(metric.clone())) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to register metric {}: {}", name, e);
                false
            }
        }
    }

    async fn get_or_create_counter(&self, name: &str, label_names: &[&str]) -> Option<CounterVec> {
        let mut counters = self.counters.lock().await;
        if let Some(counter) = counters.get(name) {
            return Some(counter.clone());
        }

        let counter = CounterVec::new(self.opts(name, "Counter metric"), label_names)
            .map_err(|e| warn!("Failed to create counter {}: {}", name, e))
            .ok()?;
        if !self.register(name, &counter) {
            return None;
        }
        counters.insert(name.to_string(), counter.clone());
        Some(counter)
    }

    async fn get_or_create_gauge(&self, name: &str, label_names: &[&str]) -> Option<GaugeVec> {
        let mut gauges = self.gauges.lock().await;
        if let Some(gauge) = gauges.get(name) {
            return Some(gauge.clone());
        }

        let gauge = GaugeVec::new(self.opts(name, "Gauge metric"), label_names)
            .map_err(|e| warn!("Failed to create gauge {}: {}", name, e))
            .ok()?;
        if !self.register(name, &gauge) {
            return None;
        }
        gauges.insert(name.to_string(), gauge.clone());
        Some(gauge)
    }

    async fn get_or_create_histogram(
        &self,
        name: &str,
        label_names: &[&str],
    ) -> Option<HistogramVec> {
        let mut histograms = self.histograms.lock().await;
        if let Some(histogram) = histograms.get(name) {
            return Some(histogram.clone());
        }

        let opts = HistogramOpts::from(self.opts(name, "Histogram metric"));
        let histogram = HistogramVec::new(opts, label_names)
            .map_err(|e| warn!("Failed to create histogram {}: {}", name, e))
            .ok()?;
        if !self.register(name, &histogram) {
            return None;
        }
        histograms.insert(name.to_string(), histogram.clone());
        Some(histogram)
    }

    fn split_labels<'a>(labels: &'a [(&'a str, &'a str)]) -> (Vec<&'a str>, Vec<&'a str>) {
        labels.iter().map(|(k, v)| (*k, *v)).unzip()
    }
}

#[async_trait]
impl MetricsExporter for PrometheusExporter {
    async fn increment(&self, name: &str, labels: &[(&str, &str)]) {
        self.increment_by(name, 1.0, labels).await;
    }

    async fn increment_by(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let (label_names, label_values) = Self::split_labels(labels);
        let Some(counter) = self.get_or_create_counter(name, &label_names).await else {
            return;
        };

        match counter.get_metric_with_label_values(&label_values) {
            Ok(counter) => counter.inc_by(value),
            Err(e) => warn!("Counter {} rejected labels {:?}: {}", name, labels, e),
        }
        debug!("Incremented counter {} by {} with labels {:?}", name, value, labels);
    }

    async fn set_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let (label_names, label_values) = Self::split_labels(labels);
        let Some(gauge) = self.get_or_create_gauge(name, &label_names).await else {
            return;
        };

        match gauge.get_metric_with_label_values(&label_values) {
            Ok(gauge) => gauge.set(value),
            Err(e) => warn!("Gauge {} rejected labels {:?}: {}", name, labels, e),
        }
    }

    async fn observe_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let (label_names, label_values) = Self::split_labels(labels);
        let Some(histogram) = self.get_or_create_histogram(name, &label_names).await else {
            return;
        };

        match histogram.get_metric_with_label_values(&label_values) {
            Ok(histogram) => histogram.observe(value),
            Err(e) => warn!("Histogram {} rejected labels {:?}: {}", name, labels, e),
        }
    }

    async fn export(&self) -> Result<Vec<u8>, String> {
        let mut buffer = vec![];
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| format!("Failed to encode metrics: {}", e))?;
        Ok(buffer)
    }
}
