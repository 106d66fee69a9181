//! Endpoint abstraction.
//!
//! # Responsibilities
//! - Represent a single backend target of an API
//! - Build the upstream URL for a request path remainder
//! - Carry the enabled flag toggled by configuration or health collaborators

use std::sync::atomic::{AtomicBool, Ordering};

use url::Url;

use crate::config::EndpointConfig;

/// A single backend endpoint.
#[derive(Debug)]
pub struct Endpoint {
    /// Identifier, unique within the owning pool.
    pub id: String,
    /// Pre-parsed base URL.
    pub base_url: Url,
    /// Relative weight for weighted strategies.
    pub weight: u32,
    /// Enabled flag as written in configuration.
    configured_enabled: bool,
    enabled: AtomicBool,
}

impl Endpoint {
    /// Create a new enabled endpoint with weight 1.
    pub fn new(id: impl Into<String>, base_url: Url) -> Self {
        Self {
            id: id.into(),
            base_url,
            weight: 1,
            configured_enabled: true,
            enabled: AtomicBool::new(true),
        }
    }

    /// Build an endpoint from its configuration entry.
    pub fn from_config(config: &EndpointConfig) -> Result<Self, url::ParseError> {
        let base_url = Url::parse(&config.url)?;
        Ok(Self {
            id: config.id.clone(),
            base_url,
            weight: config.weight,
            configured_enabled: config.enabled,
            enabled: AtomicBool::new(config.enabled),
        })
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Take over the runtime flag of the endpoint this one replaces, unless
    /// the configured flag itself changed.
    pub fn inherit_state(&self, previous: &Endpoint) {
        if self.configured_enabled == previous.configured_enabled {
            self.set_enabled(previous.is_enabled());
        }
    }

    /// Join the base URL with the request's path remainder and query.
    ///
    /// The remainder is appended to the base path: a base of
    /// `http://host/team` and a remainder of `/my_team?x=1` yields
    /// `http://host/team/my_team?x=1`. An empty remainder targets the base
    /// URL itself.
    pub fn target_url(&self, path_and_query: &str) -> Url {
        let (path, query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path_and_query, None),
        };

        let mut url = self.base_url.clone();
        let base_path = url.path().trim_end_matches('/').to_string();
        let joined = match (base_path.is_empty(), path.is_empty()) {
            (true, true) => "/".to_string(),
            (false, true) => base_path,
            (_, false) if path.starts_with('/') => format!("{base_path}{path}"),
            (_, false) => format!("{base_path}/{path}"),
        };
        url.set_path(&joined);
        if query.is_some() {
            url.set_query(query);
        }
        url
    }
}
