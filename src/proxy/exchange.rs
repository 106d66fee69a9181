//! Exchange lifecycle.
//!
//! An [`Exchange`] lives from dispatch start until the final response body
//! has been relayed or the exchange has failed. It reports exactly one
//! [`ExchangeRecord`]; dropping it unreported means the caller went away.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::error::FailureKind;
use crate::observability::{ExchangeRecord, Outcome, OutcomeSink};

#[derive(Debug)]
pub struct Exchange {
    id: Uuid,
    api: String,
    started: Instant,
    endpoint_id: Option<String>,
    status: Option<u16>,
    redirects: u32,
    bytes_in: Arc<AtomicU64>,
    bytes_out: Arc<AtomicU64>,
    sink: Arc<dyn OutcomeSink>,
    reported: bool,
}

impl Exchange {
    pub fn begin(api: impl Into<String>, sink: Arc<dyn OutcomeSink>) -> Self {
        Self {
            id: Uuid::new_v4(),
            api: api.into(),
            started: Instant::now(),
            endpoint_id: None,
            status: None,
            redirects: 0,
            bytes_in: Arc::new(AtomicU64::new(0)),
            bytes_out: Arc::new(AtomicU64::new(0)),
            sink,
            reported: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn set_endpoint(&mut self, endpoint_id: &str) {
        self.endpoint_id = Some(endpoint_id.to_string());
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }

    pub fn set_redirects(&mut self, redirects: u32) {
        self.redirects = redirects;
    }

    /// Counter fed by the request body as it is read from the caller.
    pub fn bytes_in(&self) -> Arc<AtomicU64> {
        self.bytes_in.clone()
    }

    /// Counter fed by the response body as it is relayed.
    pub fn bytes_out(&self) -> Arc<AtomicU64> {
        self.bytes_out.clone()
    }

    pub fn succeed(&mut self) {
        self.report(Outcome::Success, None);
    }

    /// Record a failure. A caller disconnect is recorded as aborted.
    pub fn fail(&mut self, kind: FailureKind) {
        let outcome = match kind {
            FailureKind::CallerDisconnected => Outcome::Aborted,
            _ => Outcome::Failure,
        };
        self.report(outcome, Some(kind));
    }

    fn report(&mut self, outcome: Outcome, failure_kind: Option<FailureKind>) {
        if self.reported {
            return;
        }
        self.reported = true;

        let record = ExchangeRecord {
            exchange_id: self.id,
            api: self.api.clone(),
            selected_endpoint_id: self.endpoint_id.clone(),
            status_code: self.status,
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
            duration_ms: self.started.elapsed().as_millis() as u64,
            redirects: self.redirects,
            outcome,
            failure_kind,
        };
        self.sink.record(&record);
    }
}

impl Drop for Exchange {
    fn drop(&mut self) {
        if !self.reported {
            self.fail(FailureKind::CallerDisconnected);
        }
    }
}
