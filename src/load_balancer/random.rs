//! Weighted random load balancing strategy.

use std::sync::Arc;

use rand::Rng;

use crate::load_balancer::{endpoint::Endpoint, LoadBalancer};

/// Random selector, proportional to endpoint weight. Stateless.
///
/// When every candidate weighs zero the pick is uniform.
#[derive(Debug, Default)]
pub struct Random;

impl Random {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for Random {
    fn next_endpoint(&self, endpoints: &[Arc<Endpoint>]) -> Option<Arc<Endpoint>> {
        if endpoints.is_empty() {
            return None;
        }
        let mut rng = rand::thread_rng();
        let total: u64 = endpoints.iter().map(|e| u64::from(e.weight)).sum();
        if total == 0 {
            return endpoints.get(rng.gen_range(0..endpoints.len())).cloned();
        }

        let mut point = rng.gen_range(0..total);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::test_support::endpoint;

    #[test]
    fn test_random_picks_only_candidates() {
        let lb = Random::new();
        let endpoints = vec![endpoint("a", 1), endpoint("b", 1), endpoint("never", 0)];

        let mut seen_a = false;
        let mut seen_b = false;
        for _ in 0..500 {
            match lb.next_endpoint(&endpoints).unwrap().id.as_str() {
                "a" => seen_a = true,
                "b" => seen_b = true,
                other => panic!("unexpected endpoint {other}"),
            }
        }
        assert!(seen_a && seen_b);
    }

    #[test]
    fn test_random_all_zero_weights_still_selects() {
        let lb = Random::new();
        let endpoints = vec![endpoint("a", 0), endpoint("b", 0)];
        for _ in 0..20 {
            assert!(lb.next_endpoint(&endpoints).is_some());
        }
    }

    #[test]
    fn test_random_empty() {
        assert!(Random::new().next_endpoint(&[]).is_none());
    }
}
