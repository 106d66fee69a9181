//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Each exchange produces:
//!     → tracing events (selection, redirect hops, upstream errors)
//!     → one ExchangeRecord (outcome.rs) on completion, failure or abort
//!
//! Consumers:
//!     → OutcomeSink implementations (default: MetricsSink)
//!     → logging.rs (fmt subscriber)
//!     → metrics.rs (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows from the inbound layer to the backend
//! - Records are produced exactly once per exchange
//! - Metrics are cheap no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
pub mod outcome;

pub use outcome::{ExchangeRecord, MetricsSink, Outcome, OutcomeSink};
