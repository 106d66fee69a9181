//! Per-exchange outcome records.
//!
//! One record is emitted for every exchange, whatever its fate. The core
//! only produces records; sinks decide what to do with them.

use serde::Serialize;
use uuid::Uuid;

use crate::error::FailureKind;
use crate::observability::metrics;

/// Final classification of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Success,
    Failure,
    /// The caller went away before the response completed.
    Aborted,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "SUCCESS",
            Outcome::Failure => "FAILURE",
            Outcome::Aborted => "ABORTED",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExchangeRecord {
    pub exchange_id: Uuid,
    pub api: String,
    pub selected_endpoint_id: Option<String>,
    pub status_code: Option<u16>,
    /// Request body bytes read from the caller.
    pub bytes_in: u64,
    /// Response body bytes relayed to the caller.
    pub bytes_out: u64,
    pub duration_ms: u64,
    pub redirects: u32,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
}

/// Consumer of exchange outcome records.
pub trait OutcomeSink: Send + Sync + std::fmt::Debug {
    fn record(&self, record: &ExchangeRecord);
}

/// Default sink: a structured log line plus metrics.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsSink;

impl OutcomeSink for MetricsSink {
    fn record(&self, record: &ExchangeRecord) {
        let failure_kind = record.failure_kind.map(|k| k.as_str()).unwrap_or("");
        match record.outcome {
            Outcome::Failure => tracing::warn!(
                exchange_id = %record.exchange_id,
                api = %record.api,
                endpoint = ?record.selected_endpoint_id,
                status = ?record.status_code,
                duration_ms = record.duration_ms,
                failure_kind,
                "Exchange failed"
            ),
            outcome => tracing::info!(
                exchange_id = %record.exchange_id,
                api = %record.api,
                endpoint = ?record.selected_endpoint_id,
                status = ?record.status_code,
                bytes_in = record.bytes_in,
                bytes_out = record.bytes_out,
                duration_ms = record.duration_ms,
                redirects = record.redirects,
                outcome = outcome.as_str(),
                "Exchange completed"
            ),
        }
        metrics::record_exchange(record);
    }
}
