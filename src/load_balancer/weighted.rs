//! Weighted round-robin load balancing strategy.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::load_balancer::{endpoint::Endpoint, LoadBalancer};

/// Weighted selector.
///
/// The cursor walks the cumulative weight line, so over any window of
/// `sum(weights)` consecutive selections each endpoint is picked exactly
/// `weight` times. Zero-weight endpoints are never picked unless every
/// candidate weighs zero, in which case the cursor rotates over all of them.
#[derive(Debug, Default)]
pub struct Weighted {
    counter: AtomicU64,
}

impl Weighted {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for Weighted {
    fn next_endpoint(&self, endpoints: &[Arc<Endpoint>]) -> Option<Arc<Endpoint>> {
        if endpoints.is_empty() {
            return None;
        }
        let cursor = self.counter.fetch_add(1, Ordering::Relaxed);
        let total: u64 = endpoints.iter().map(|e| u64::from(e.weight)).sum();
        if total == 0 {
            let index = (cursor % endpoints.len() as u64) as usize;
            return endpoints.get(index).cloned();
        }

        let mut point = cursor % total;
        for endpoint in endpoints {
            let weight = u64::from(endpoint.weight);
            if point < weight {
                return Some(endpoint.clone());
            }
            point -= weight;
        }
        None
    }
}
