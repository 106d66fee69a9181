//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check uniqueness of API names, context paths and endpoint ids
//! - Validate value ranges (timeouts > 0, redirect hops)
//! - Reject endpoint URLs the connector cannot dial
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::config::schema::{ApiConfig, GatewayConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no apis configured")]
    NoApis,
    #[error("api name must not be empty")]
    EmptyApiName,
    #[error("duplicate api name `{0}`")]
    DuplicateApi(String),
    #[error("api `{api}`: context path `{path}` must start with '/'")]
    InvalidContextPath { api: String, path: String },
    #[error("api `{api}`: context path `{path}` already used")]
    DuplicateContextPath { api: String, path: String },
    #[error("api `{api}`: duplicate endpoint id `{id}`")]
    DuplicateEndpoint { api: String, id: String },
    #[error("api `{api}`: endpoint `{id}` has invalid url `{url}`: {reason}")]
    InvalidEndpointUrl {
        api: String,
        id: String,
        url: String,
        reason: String,
    },
    #[error("api `{api}`: {field} must be greater than zero")]
    ZeroTimeout { api: String, field: &'static str },
    #[error("api `{api}`: max_redirect_hops must be at least 1 when following redirects")]
    NoRedirectHops { api: String },
}

/// Validate a whole configuration, collecting every error.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.apis.is_empty() {
        errors.push(ValidationError::NoApis);
    }

    let mut names = HashSet::new();
    let mut paths = HashSet::new();
    for api in &config.apis {
        if api.name.is_empty() {
            errors.push(ValidationError::EmptyApiName);
        } else if !names.insert(api.name.as_str()) {
            errors.push(ValidationError::DuplicateApi(api.name.clone()));
        }

        if !api.context_path.starts_with('/') {
            errors.push(ValidationError::InvalidContextPath {
                api: api.name.clone(),
                path: api.context_path.clone(),
            });
        } else if !paths.insert(normalize_context_path(&api.context_path)) {
            errors.push(ValidationError::DuplicateContextPath {
                api: api.name.clone(),
                path: api.context_path.clone(),
            });
        }

        validate_api(api, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_api(api: &ApiConfig, errors: &mut Vec<ValidationError>) {
    let mut ids = HashSet::new();
    for endpoint in &api.endpoints {
        if !ids.insert(endpoint.id.as_str()) {
            errors.push(ValidationError::DuplicateEndpoint {
                api: api.name.clone(),
                id: endpoint.id.clone(),
            });
        }

        let reason = match Url::parse(&endpoint.url) {
            Ok(url) if url.scheme() != "http" => Some(format!("unsupported scheme `{}`", url.scheme())),
            Ok(url) if url.host_str().is_none() => Some("missing host".to_string()),
            Ok(_) => None,
            Err(e) => Some(e.to_string()),
        };
        if let Some(reason) = reason {
            errors.push(ValidationError::InvalidEndpointUrl {
                api: api.name.clone(),
                id: endpoint.id.clone(),
                url: endpoint.url.clone(),
                reason,
            });
        }
    }

    if api.connect_timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout {
            api: api.name.clone(),
            field: "connect_timeout_ms",
        });
    }
    if api.read_timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout {
            api: api.name.clone(),
            field: "read_timeout_ms",
        });
    }
    if api.follow_redirects && api.max_redirect_hops == 0 {
        errors.push(ValidationError::NoRedirectHops {
            api: api.name.clone(),
        });
    }
}

/// Context paths compare without their trailing slash ("/api/" == "/api").
pub fn normalize_context_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}
