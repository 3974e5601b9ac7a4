use crate::metrics::MetricsExporter;
use async_trait::async_trait;

/// Null exporter for testing or when metrics are disabled
pub struct NullExporter;

#[async_trait]
impl MetricsExporter for NullExporter {
    async fn increment(&self, _name: &str, _labels: &[(&str, &str)]) {}

    async fn increment_by(&self, _name: &str, _value: f64, _labels: &[(&str, &str)]) {}

    async fn set_gauge(&self, _name: &str, _value: f64, _labels: &[(&str, &str)]) {}

    async fn observe_histogram(&self, _name: &str, _value: f64, _labels: &[(&str, &str)]) {}

    async fn export(&self) -> Result<Vec<u8>, String> {
        Ok(vec![])
    }
}
