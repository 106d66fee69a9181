//! Dispatch error taxonomy.
//!
//! Every failure is resolved at the exchange boundary: the coordinator maps
//! the error to a caller-visible response and a [`FailureKind`] for the
//! outcome record. Nothing here is retried internally.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Boxed error used for opaque transport causes.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced while dispatching one exchange.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("No available endpoint for api `{api}`")]
    NoAvailableEndpoint { api: String },

    #[error("Upstream {target} unreachable: {source}")]
    UpstreamUnreachable {
        target: String,
        #[source]
        source: BoxError,
    },

    #[error("Upstream {target} did not respond within {timeout:?}")]
    UpstreamTimeout { target: String, timeout: Duration },

    #[error("Protocol error from upstream {target}: {reason}")]
    UpstreamProtocolError { target: String, reason: String },

    #[error("Redirect chain exceeded {max_hops} hops")]
    TooManyRedirects { max_hops: u32 },

    #[error("Cannot replay {method} request body to {location}")]
    BodyNotReplayable { method: String, location: String },

    #[error("Invalid upstream target `{0}`")]
    InvalidTarget(String),

    #[error("Caller disconnected: {0}")]
    CallerDisconnected(String),
}

/// Failure classification carried by exchange outcome records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    NoAvailableEndpoint,
    UpstreamUnreachable,
    UpstreamTimeout,
    UpstreamProtocolError,
    TooManyRedirects,
    BodyNotReplayable,
    InvalidTarget,
    CallerDisconnected,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::NoAvailableEndpoint => "NO_AVAILABLE_ENDPOINT",
            FailureKind::UpstreamUnreachable => "UPSTREAM_UNREACHABLE",
            FailureKind::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            FailureKind::UpstreamProtocolError => "UPSTREAM_PROTOCOL_ERROR",
            FailureKind::TooManyRedirects => "TOO_MANY_REDIRECTS",
            FailureKind::BodyNotReplayable => "BODY_NOT_REPLAYABLE",
            FailureKind::InvalidTarget => "INVALID_TARGET",
            FailureKind::CallerDisconnected => "CALLER_DISCONNECTED",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DispatchError {
    /// Classification for outcome reporting.
    pub fn kind(&self) -> FailureKind {
        match self {
            DispatchError::NoAvailableEndpoint { .. } => FailureKind::NoAvailableEndpoint,
            DispatchError::UpstreamUnreachable { .. } => FailureKind::UpstreamUnreachable,
            DispatchError::UpstreamTimeout { .. } => FailureKind::UpstreamTimeout,
            DispatchError::UpstreamProtocolError { .. } => FailureKind::UpstreamProtocolError,
            DispatchError::TooManyRedirects { .. } => FailureKind::TooManyRedirects,
            DispatchError::BodyNotReplayable { .. } => FailureKind::BodyNotReplayable,
            DispatchError::InvalidTarget(_) => FailureKind::InvalidTarget,
            DispatchError::CallerDisconnected(_) => FailureKind::CallerDisconnected,
        }
    }

    /// Status code surfaced to the caller.
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::NoAvailableEndpoint { .. } => StatusCode::SERVICE_UNAVAILABLE,
            DispatchError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            // Nobody is listening any more; the status only matters for logs.
            DispatchError::CallerDisconnected(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let message = match &self {
            DispatchError::NoAvailableEndpoint { .. } => "No available endpoint",
            DispatchError::UpstreamUnreachable { .. } => "Upstream unreachable",
            DispatchError::UpstreamTimeout { .. } => "Upstream timed out",
            DispatchError::UpstreamProtocolError { .. } => "Upstream protocol error",
            DispatchError::TooManyRedirects { .. } => "Too many redirects",
            DispatchError::BodyNotReplayable { .. } => "Request body cannot follow redirect",
            DispatchError::InvalidTarget(_) => "Invalid upstream target",
            DispatchError::CallerDisconnected(_) => "Request body aborted",
        };
        (self.status(), message).into_response()
    }
}
