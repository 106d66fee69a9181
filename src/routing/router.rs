//! API lookup by context path.
//!
//! # Responsibilities
//! - Store one dispatcher per configured API
//! - Match the longest context path on a segment boundary
//! - Hand back the path remainder to forward
//!
//! # Design Decisions
//! - Immutable after construction; reconfiguration builds a new router
//! - Pools survive reconfiguration when the API name and strategy stay the same

use std::sync::Arc;

use crate::config::validation::normalize_context_path;
use crate::config::ApiConfig;
use crate::load_balancer::pool::endpoints_from_config;
use crate::load_balancer::EndpointPool;
use crate::observability::OutcomeSink;
use crate::proxy::Dispatcher;

#[derive(Debug)]
struct ApiEntry {
    name: String,
    context_path: String,
    dispatcher: Arc<Dispatcher>,
}

/// Maps inbound paths to API dispatchers.
#[derive(Debug, Default)]
pub struct ApiRouter {
    /// Sorted by context path length, longest first.
    entries: Vec<ApiEntry>,
}

impl ApiRouter {
    /// Build the router. Pools of `previous` are carried over by API name.
    pub fn from_config(apis: &[ApiConfig], previous: Option<&ApiRouter>, sink: Arc<dyn OutcomeSink>) -> Self {
        let mut entries: Vec<ApiEntry> = apis
            .iter()
            .map(|api| {
                let pool = match previous.and_then(|p| p.pool(&api.name)) {
                    Some(pool) if pool.strategy() == api.load_balancing => {
                        pool.replace(endpoints_from_config(api));
                        pool
                    }
                    _ => Arc::new(EndpointPool::from_config(api)),
                };
                ApiEntry {
                    name: api.name.clone(),
                    context_path: normalize_context_path(&api.context_path).to_string(),
                    dispatcher: Arc::new(Dispatcher::from_config(api, pool, sink.clone())),
                }
            })
            .collect();

        entries.sort_by(|a, b| b.context_path.len().cmp(&a.context_path.len()));
        Self { entries }
    }

    /// Find the API serving `path` and the remainder to forward.
    pub fn resolve<'p>(&self, path: &'p str) -> Option<(&Arc<Dispatcher>, &'p str)> {
        self.entries.iter().find_map(|entry| {
            strip_context_path(&entry.context_path, path).map(|rest| (&entry.dispatcher, rest))
        })
    }

    pub fn pool(&self, api: &str) -> Option<Arc<EndpointPool>> {
        self.entries
            .iter()
            .find(|e| e.name == api)
            .map(|e| e.dispatcher.pool().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Remainder of `path` under `context`, matching whole segments only.
fn strip_context_path<'p>(context: &str, path: &'p str) -> Option<&'p str> {
    if context == "/" {
        return Some(path);
    }
    let rest = path.strip_prefix(context)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointConfig;
    use crate::observability::MetricsSink;

    fn api(name: &str, path: &str, url: &str) -> ApiConfig {
        ApiConfig {
            name: name.into(),
            context_path: path.into(),
            endpoints: vec![EndpointConfig::new("e1", url)],
            ..ApiConfig::default()
        }
    }

    #[test]
    fn test_strip_context_path() {
        assert_eq!(strip_context_path("/api", "/api"), Some(""));
        assert_eq!(strip_context_path("/api", "/api/redirect"), Some("/redirect"));
        assert_eq!(strip_context_path("/api", "/apix"), None);
        assert_eq!(strip_context_path("/", "/anything"), Some("/anything"));
    }

    #[test]
    fn test_longest_prefix_wins() {
        let router = ApiRouter::from_config(
            &[api("root", "/", "http://127.0.0.1:1"), api("teams", "/test/", "http://127.0.0.1:2")],
            None,
            Arc::new(MetricsSink),
        );

        let (dispatcher, rest) = router.resolve("/test/my_team").unwrap();
        assert_eq!(dispatcher.pool().api(), "teams");
        assert_eq!(rest, "/my_team");

        let (dispatcher, rest) = router.resolve("/other").unwrap();
        assert_eq!(dispatcher.pool().api(), "root");
        assert_eq!(rest, "/other");
    }

    #[test]
    fn test_no_match() {
        let router = ApiRouter::from_config(&[api("a", "/a", "http://127.0.0.1:1")], None, Arc::new(MetricsSink));
        assert!(router.resolve("/b").is_none());
        assert_eq!(router.len(), 1);
    }

    #[test]
    fn test_reconfigure_keeps_pool() {
        let sink: Arc<dyn OutcomeSink> = Arc::new(MetricsSink);
        let first = ApiRouter::from_config(&[api("a", "/a", "http://127.0.0.1:1")], None, sink.clone());
        let pool = first.pool("a").unwrap();

        let second = ApiRouter::from_config(&[api("a", "/a", "http://127.0.0.1:9")], Some(&first), sink);
        let carried = second.pool("a").unwrap();

        assert!(Arc::ptr_eq(&pool, &carried));
        assert_eq!(carried.endpoints()[0].base_url.port(), Some(9));
    }
}
