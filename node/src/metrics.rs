//! # Prometheus Metrics
//!
//! Exposes operational metrics for the vault node. Scraped by Prometheus
//! at the `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use coffer_core::Amount;

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (prometheus handles are `Arc` internally) so it can be
/// shared across request handlers.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Routed calls that committed, by method signature.
    pub operations_total: IntCounterVec,
    /// Routed calls that failed and rolled back, by method signature.
    pub rejected_operations_total: IntCounterVec,
    /// Notification events appended to the vault log.
    pub events_total: IntCounter,
    /// Outstanding vault shares.
    pub total_supply: IntGauge,
    /// Asset units custodied by the vault.
    pub total_assets: IntGauge,
    /// Histogram of routed-call latency in seconds.
    pub operation_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("coffer".into()), None)?;

        let operations_total = IntCounterVec::new(
            Opts::new("operations_total", "Routed calls that committed"),
            &["method"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let rejected_operations_total = IntCounterVec::new(
            Opts::new(
                "rejected_operations_total",
                "Routed calls that failed and were rolled back",
            ),
            &["method"],
        )?;
        registry.register(Box::new(rejected_operations_total.clone()))?;

        let events_total = IntCounter::new(
            "events_total",
            "Notification events appended to the vault log",
        )?;
        registry.register(Box::new(events_total.clone()))?;

        let total_supply = IntGauge::new("total_supply", "Outstanding vault shares")?;
        registry.register(Box::new(total_supply.clone()))?;

        let total_assets = IntGauge::new("total_assets", "Asset units custodied by the vault")?;
        registry.register(Box::new(total_assets.clone()))?;

        let operation_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "operation_latency_seconds",
                "Routed-call processing latency in seconds",
            )
            .buckets(vec![
                0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1,
            ]),
        )?;
        registry.register(Box::new(operation_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            operations_total,
            rejected_operations_total,
            events_total,
            total_supply,
            total_assets,
            operation_latency_seconds,
        })
    }

    /// Updates the supply and asset gauges. Values above `i64::MAX` saturate.
    pub fn observe_vault(&self, total_supply: Amount, total_assets: Amount) {
        self.total_supply
            .set(i64::try_from(total_supply).unwrap_or(i64::MAX));
        self.total_assets
            .set(i64::try_from(total_assets).unwrap_or(i64::MAX));
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers via extension.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_with_namespace() {
        let metrics = NodeMetrics::new().unwrap();
        metrics
            .operations_total
            .with_label_values(&["deposit(uint256,address)"])
            .inc();
        metrics.observe_vault(10, u64::MAX);

        let text = metrics.encode().unwrap();
        assert!(text.contains("coffer_operations_total"));
        assert!(text.contains("coffer_total_supply 10"));
        assert!(text.contains(&format!("coffer_total_assets {}", i64::MAX)));
    }
}
