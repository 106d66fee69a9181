//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::load_balancer::Strategy;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// API definitions, each with its own endpoint pool.
    pub apis: Vec<ApiConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8082").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8082".to_string(),
        }
    }
}

/// A resolved API definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API identifier for logging/metrics.
    pub name: String,

    /// Inbound path prefix served by this API; stripped before forwarding.
    pub context_path: String,

    /// Backend endpoints.
    pub endpoints: Vec<EndpointConfig>,

    /// Endpoint selection strategy.
    pub load_balancing: Strategy,

    /// Transparently follow upstream 3xx responses.
    pub follow_redirects: bool,

    /// Maximum number of redirect hops before failing.
    pub max_redirect_hops: u32,

    /// Connection establishment timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Maximum stall while waiting for upstream bytes, in milliseconds.
    pub read_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            context_path: "/".to_string(),
            endpoints: Vec::new(),
            load_balancing: Strategy::default(),
            follow_redirects: false,
            max_redirect_hops: 5,
            connect_timeout_ms: 5_000,
            read_timeout_ms: 10_000,
        }
    }
}

/// Backend endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Endpoint identifier, unique within its API.
    pub id: String,

    /// Base URL; the request path remainder is appended to its path.
    pub url: String,

    /// Weight for weighted/random load balancing (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Disabled endpoints are never selected.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl EndpointConfig {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            weight: default_weight(),
            enabled: default_enabled(),
        }
    }
}

fn default_weight() -> u32 {
    1
}

fn default_enabled() -> bool {
    true
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
