//! Prometheus exporter for consortium topology

use prometheus::{Encoder, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::error::Result;

pub const K_CACTUS_CONSORTIUM_MANUAL_TOTAL_NODE_COUNT: &str =
    "cactus_consortium_manual_total_node_count";

/// Per-instance metrics registry.
///
/// The node-count gauge carries a single `type` label whose value is the
/// metric name, which is the exposition shape scrapers expect.
#[derive(Clone)]
pub struct PrometheusExporter {
    registry: Registry,
    total_node_count: IntGaugeVec,
}

impl PrometheusExporter {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let total_node_count = IntGaugeVec::new(
            Opts::new(
                K_CACTUS_CONSORTIUM_MANUAL_TOTAL_NODE_COUNT,
                "Total cactus node count",
            ),
            &["type"],
        )?;
        registry.register(Box::new(total_node_count.clone()))?;

        let exporter = Self {
            registry,
            total_node_count,
        };
        exporter.set_total_node_count(0);
        Ok(exporter)
    }

    pub fn set_total_node_count(&self, count: usize) {
        self.gauge().set(count as i64);
    }

    pub fn total_node_count(&self) -> i64 {
        self.gauge().get()
    }

    /// Text exposition of every metric in this exporter
    pub fn get_prometheus_metrics(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    fn gauge(&self) -> prometheus::IntGauge {
        self.total_node_count
            .with_label_values(&[K_CACTUS_CONSORTIUM_MANUAL_TOTAL_NODE_COUNT])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_line(count: i64) -> String {
        format!(
            "# HELP {name} Total cactus node count\n# TYPE {name} gauge\n{name}{{type=\"{name}\"}} {count}",
            name = K_CACTUS_CONSORTIUM_MANUAL_TOTAL_NODE_COUNT,
            count = count
        )
    }

    #[test]
    fn test_exposition_starts_at_zero() {
        let exporter = PrometheusExporter::new().unwrap();
        let text = exporter.get_prometheus_metrics().unwrap();
        assert!(text.contains(&sample_line(0)), "{}", text);
    }

    #[test]
    fn test_gauge_tracks_count() {
        let exporter = PrometheusExporter::new().unwrap();
        exporter.set_total_node_count(3);
        assert_eq!(exporter.total_node_count(), 3);
        assert!(exporter
            .get_prometheus_metrics()
            .unwrap()
            .contains(&sample_line(3)));
    }

    #[test]
    fn test_instances_do_not_share_state() {
        let a = PrometheusExporter::new().unwrap();
        let b = PrometheusExporter::new().unwrap();
        a.set_total_node_count(5);
        assert_eq!(b.total_node_count(), 0);
    }
}
