//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{endpoint::Endpoint, LoadBalancer};

/// Round-robin selector.
/// Stores an internal counter to rotate through endpoints.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_endpoint(&self, endpoints: &[Arc<Endpoint>]) -> Option<Arc<Endpoint>> {
        if endpoints.is_empty() {
            return None;
        }

        // fetch_add is the single linearization point; the modulo uses the
        // current N so a shrunk pool can never be indexed past its end.
        let cursor = self.counter.fetch_add(1, Ordering::Relaxed);
        endpoints.get(cursor % endpoints.len()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::test_support::endpoint;
    use std::collections::HashMap;

    #[test]
    fn test_round_robin() {
        let lb = RoundRobin::new();
        let endpoints = vec![endpoint("e1", 1), endpoint("e2", 1)];

        for i in 0..20 {
            let selected = lb.next_endpoint(&endpoints).unwrap();
            let expected = if i % 2 == 0 { "e1" } else { "e2" };
            assert_eq!(selected.id, expected, "call {i}");
        }
    }

    #[test]
    fn test_empty_does_not_advance() {
        let lb = RoundRobin::new();
        let endpoints = vec![endpoint("e1", 1), endpoint("e2", 1)];

        assert_eq!(lb.next_endpoint(&endpoints).unwrap().id, "e1");
        assert!(lb.next_endpoint(&[]).is_none());
        assert!(lb.next_endpoint(&[]).is_none());
        assert_eq!(lb.next_endpoint(&endpoints).unwrap().id, "e2");
    }

    #[test]
    fn test_shrunk_pool_stays_in_bounds() {
        let lb = RoundRobin::new();
        let three = vec![endpoint("e1", 1), endpoint("e2", 1), endpoint("e3", 1)];
        lb.next_endpoint(&three);
        lb.next_endpoint(&three);

        let one = vec![endpoint("e1", 1)];
        for _ in 0..5 {
            assert_eq!(lb.next_endpoint(&one).unwrap().id, "e1");
        }
    }

    #[test]
    fn test_concurrent_selections_are_distinct() {
        let lb = Arc::new(RoundRobin::new());
        let endpoints: Arc<Vec<_>> = Arc::new((0..4).map(|i| endpoint(&format!("e{i}"), 1)).collect());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lb = lb.clone();
                let endpoints = endpoints.clone();
                std::thread::spawn(move || {
                    (0..1000)
                        .map(|_| lb.next_endpoint(&endpoints).unwrap().id.clone())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut counts: HashMap<String, usize> = HashMap::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                *counts.entry(id).or_default() += 1;
            }
        }

        // 8000 selections over 4 endpoints: a lost increment would skew this.
        assert_eq!(counts.len(), 4);
        assert!(counts.values().all(|&c| c == 2000), "{counts:?}");
    }
}
