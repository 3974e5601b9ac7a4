/// StatsD exporter
///
/// Pushes every observation as one UDP datagram in the DogStatsD line format:
/// - Counters: `name:value|c[|#tag:value,...]`
/// - Gauges: `name:value|g[|#tag:value,...]`
/// - Timers: `name:value|ms[|#tag:value,...]`
use crate::metrics::MetricsExporter;
use async_trait::async_trait;
use log::{debug, error};
use std::net::SocketAddr;
use tokio::net::UdpSocket;

/// StatsD metrics exporter implementation
pub struct StatsDExporter {
    /// StatsD server address (host:port)
    address: SocketAddr,
    /// Optional metric prefix for all metrics
    prefix: Option<String>,
}

impl StatsDExporter {
    /// Create a new StatsD exporter for `endpoint` ("host:port")
    pub fn new(endpoint: &str, prefix: Option<String>) -> Result<Self, String> {
        let address = endpoint.replacen("localhost:", "127.0.0.1:", 1);
        let address = address
            .parse::<SocketAddr>()
            .map_err(|e| format!("Invalid StatsD endpoint '{}': {}", endpoint, e))?;

        Ok(Self {
            address,
            prefix: prefix.filter(|p| !p.is_empty()),
        })
    }

    /// Render one StatsD line
    fn format_line(&self, name: &str, value: f64, kind: &str, labels: &[(&str, &str)]) -> String {
        let name = match &self.prefix {
            Some(prefix) => format!("{}.{}", prefix, name),
            None => name.to_string(),
        };
        let tags = if labels.is_empty() {
            String::new()
        } else {
            let tags: Vec<String> = labels
                .iter()
                .map(|(key, value)| format!("{}:{}", key, value))
                .collect();
            format!("|#{}", tags.join(","))
        };
        format!("{}:{}|{}{}", name, value, kind, tags)
    }

    /// Send a StatsD message via UDP
    async fn send_metric(&self, message: &str) {
        match UdpSocket::bind("0.0.0.0:0").await {
            Ok(socket) => {
                if let Err(e) = socket.send_to(message.as_bytes(), &self.address).await {
                    error!("Failed to send StatsD metric: {}", e);
                    return;
                }
                debug!("Sent StatsD metric: {}", message);
            }
            Err(e) => error!("Failed to create UDP socket for StatsD: {}", e),
        }
    }
}

#[async_trait]
impl MetricsExporter for StatsDExporter {
    async fn increment(&self, name: &str, labels: &[(&str, &str)]) {
        self.increment_by(name, 1.0, labels).await;
    }

    async fn increment_by(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        self.send_metric(&self.format_line(name, value, "c", labels))
            .await;
    }

    async fn set_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        self.send_metric(&self.format_line(name, value, "g", labels))
            .await;
    }

    /// Durations are recorded in seconds and sent as millisecond timers
    async fn observe_histogram(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        let kind = if name.ends_with("_seconds") { "ms" } else { "h" };
        let value = if kind == "ms" { value * 1000.0 } else { value };
        self.send_metric(&self.format_line(name, value, kind, labels))
            .await;
    }

    /// StatsD is push-based, there is nothing to export
    async fn export(&self) -> Result<Vec<u8>, String> {
        Ok(vec![])
    }
}
