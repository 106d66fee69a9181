//! Endpoint pool management.
//!
//! # Responsibilities
//! - Hold the endpoint membership of one API
//! - Apply the configured load balancing algorithm to the enabled subset
//! - Allow membership replacement and enable/disable without losing the cursor

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::ApiConfig;
use crate::error::DispatchError;
use crate::load_balancer::{endpoint::Endpoint, LoadBalancer, Strategy};

/// The set of endpoints one API may dispatch to.
#[derive(Debug)]
pub struct EndpointPool {
    api: String,
    endpoints: ArcSwap<Vec<Arc<Endpoint>>>,
    strategy: Strategy,
    balancer: Box<dyn LoadBalancer>,
}

impl EndpointPool {
    pub fn new(api: impl Into<String>, endpoints: Vec<Endpoint>, strategy: Strategy) -> Self {
        Self {
            api: api.into(),
            endpoints: ArcSwap::from_pointee(endpoints.into_iter().map(Arc::new).collect()),
            strategy,
            balancer: strategy.build(),
        }
    }

    /// Build a pool from an API definition. Unparseable endpoint URLs are skipped.
    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(
            config.name.clone(),
            endpoints_from_config(config),
            config.load_balancing,
        )
    }

    /// Select one enabled endpoint.
    pub fn select(&self) -> Result<Arc<Endpoint>, DispatchError> {
        let all = self.endpoints.load();
        let enabled: Vec<Arc<Endpoint>> = all.iter().filter(|e| e.is_enabled()).cloned().collect();

        match self.balancer.next_endpoint(&enabled) {
            Some(endpoint) => Ok(endpoint),
            None => {
                tracing::debug!(api = %self.api, endpoint_count = all.len(), "No enabled endpoints in pool");
                Err(DispatchError::NoAvailableEndpoint {
                    api: self.api.clone(),
                })
            }
        }
    }

    /// Replace the pool membership. The rotation cursor is kept, and
    /// endpoints whose id survives keep their runtime enabled state.
    pub fn replace(&self, endpoints: Vec<Endpoint>) {
        let previous = self.endpoints.load();
        for endpoint in &endpoints {
            if let Some(old) = previous.iter().find(|e| e.id == endpoint.id) {
                endpoint.inherit_state(old);
            }
        }
        let disabled = endpoints.iter().filter(|e| !e.is_enabled()).count();
        tracing::info!(
            api = %self.api,
            endpoint_count = endpoints.len(),
            disabled,
            "Endpoint pool reconfigured"
        );
        self.endpoints
            .store(Arc::new(endpoints.into_iter().map(Arc::new).collect()));
    }

    /// Enable or disable an endpoint by id. Returns false if no such endpoint.
    pub fn set_enabled(&self, id: &str, enabled: bool) -> bool {
        match self.endpoints.load().iter().find(|e| e.id == id) {
            Some(endpoint) => {
                endpoint.set_enabled(enabled);
                tracing::info!(api = %self.api, endpoint = %id, enabled, "Endpoint state changed");
                true
            }
            None => false,
        }
    }

    /// Snapshot of all endpoints, enabled or not.
    pub fn endpoints(&self) -> Vec<Arc<Endpoint>> {
        self.endpoints.load().iter().cloned().collect()
    }

    pub fn api(&self) -> &str {
        &self.api
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }
}

/// Parse the endpoint entries of an API definition.
pub fn endpoints_from_config(config: &ApiConfig) -> Vec<Endpoint> {
    config
        .endpoints
        .iter()
        .filter_map(|e| match Endpoint::from_config(e) {
            Ok(endpoint) => Some(endpoint),
            Err(err) => {
                tracing::warn!(api = %config.name, endpoint = %e.id, url = %e.url, error = %err, "Invalid endpoint url");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointConfig;
    use url::Url;

    fn ep(id: &str) -> Endpoint {
        Endpoint::new(id, Url::parse(&format!("http://127.0.0.1:8080/{id}")).unwrap())
    }

    #[test]
    fn test_select_alternates() {
        let pool = EndpointPool::new("echo", vec![ep("e1"), ep("e2")], Strategy::RoundRobin);
        let ids: Vec<_> = (0..4).map(|_| pool.select().unwrap().id.clone()).collect();
        assert_eq!(ids, ["e1", "e2", "e1", "e2"]);
    }

    #[test]
    fn test_empty_pool_fails() {
        let pool = EndpointPool::new("echo", vec![], Strategy::RoundRobin);
        assert!(matches!(pool.select(), Err(DispatchError::NoAvailableEndpoint { .. })));
    }

    #[test]
    fn test_all_disabled_fails_without_advancing() {
        let pool = EndpointPool::new("echo", vec![ep("e1"), ep("e2")], Strategy::RoundRobin);
        assert_eq!(pool.select().unwrap().id, "e1");

        assert!(pool.set_enabled("e1", false));
        assert!(pool.set_enabled("e2", false));
        assert!(pool.select().is_err());
        assert!(pool.select().is_err());

        pool.set_enabled("e1", true);
        pool.set_enabled("e2", true);
        assert_eq!(pool.select().unwrap().id, "e2");
        assert!(!pool.set_enabled("missing", true));
    }

    #[test]
    fn test_disabled_endpoint_excluded() {
        let pool = EndpointPool::new("echo", vec![ep("e1"), ep("e2"), ep("e3")], Strategy::RoundRobin);
        pool.set_enabled("e2", false);
        for _ in 0..6 {
            assert_ne!(pool.select().unwrap().id, "e2");
        }
    }

    #[test]
    fn test_replace_keeps_rotating() {
        let pool = EndpointPool::new("echo", vec![ep("e1"), ep("e2")], Strategy::RoundRobin);
        pool.select().unwrap();
        pool.replace(vec![ep("n1"), ep("n2"), ep("n3")]);

        let ids: Vec<_> = (0..3).map(|_| pool.select().unwrap().id.clone()).collect();
        assert_eq!(ids, ["n2", "n3", "n1"]);
        assert_eq!(pool.endpoints().len(), 3);
    }

    #[test]
    fn test_replace_keeps_runtime_disabled_flag() {
        let pool = EndpointPool::new("echo", vec![ep("e1"), ep("e2")], Strategy::RoundRobin);
        pool.set_enabled("e2", false);

        pool.replace(vec![ep("e1"), ep("e2"), ep("e3")]);

        for _ in 0..6 {
            assert_ne!(pool.select().unwrap().id, "e2");
        }
        let e2 = pool.endpoints().into_iter().find(|e| e.id == "e2").unwrap();
        assert!(!e2.is_enabled());
    }

    #[test]
    fn test_replace_applies_changed_configured_flag() {
        let disabled = EndpointConfig {
            enabled: false,
            ..EndpointConfig::new("e1", "http://127.0.0.1:9000")
        };
        let pool = EndpointPool::new(
            "echo",
            vec![Endpoint::from_config(&disabled).unwrap()],
            Strategy::RoundRobin,
        );
        assert!(pool.select().is_err());

        pool.replace(vec![Endpoint::from_config(&EndpointConfig::new("e1", "http://127.0.0.1:9000")).unwrap()]);
        assert_eq!(pool.select().unwrap().id, "e1");
    }

    #[test]
    fn test_zero_weight_pool_still_selects() {
        let pool = EndpointPool::new("w", vec![ep("e1").with_weight(0)], Strategy::Weighted);
        assert_eq!(pool.select().unwrap().id, "e1");

        let pool = EndpointPool::new("r", vec![ep("e1").with_weight(0)], Strategy::Random);
        assert_eq!(pool.select().unwrap().id, "e1");
    }

    #[test]
    fn test_from_config_skips_invalid_urls() {
        let config = ApiConfig {
            name: "teams".into(),
            endpoints: vec![
                EndpointConfig::new("good", "http://127.0.0.1:9000"),
                EndpointConfig::new("bad", "::not a url::"),
            ],
            ..ApiConfig::default()
        };
        let pool = EndpointPool::from_config(&config);
        assert_eq!(pool.api(), "teams");
        assert_eq!(pool.endpoints().len(), 1);
    }
}
