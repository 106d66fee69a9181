//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_exchanges_total` (counter): exchanges by api, outcome, status
//! - `gateway_exchange_duration_seconds` (histogram): latency per api
//! - `gateway_bytes_in_total` / `gateway_bytes_out_total` (counters): body bytes
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::observability::outcome::ExchangeRecord;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_exchange(record: &ExchangeRecord) {
    let status = record
        .status_code
        .map(|s| s.to_string())
        .unwrap_or_else(|| "none".to_string());

    counter!(
        "gateway_exchanges_total",
        "api" => record.api.clone(),
        "outcome" => record.outcome.as_str(),
        "status" => status
    )
    .increment(1);

    histogram!("gateway_exchange_duration_seconds", "api" => record.api.clone())
        .record(record.duration_ms as f64 / 1000.0);

    counter!("gateway_bytes_in_total", "api" => record.api.clone()).increment(record.bytes_in);
    counter!("gateway_bytes_out_total", "api" => record.api.clone()).increment(record.bytes_out);
}
