//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch starts for an API
//!     → pool.rs (snapshot of enabled endpoints)
//!     → Apply load balancing algorithm:
//!         - round_robin.rs (rotate through endpoints)
//!         - weighted.rs (rotate through cumulative weights)
//!         - random.rs (weighted random pick)
//!     → Return one endpoint or NoAvailableEndpoint
//! ```
//!
//! # Design Decisions
//! - Strategies only read endpoints; the pool owns membership
//! - The rotation cursor is a single atomic counter per pool
//! - An empty candidate set never touches the cursor
//! - Algorithm chosen per API at pool construction

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub mod endpoint;
pub mod pool;
pub mod random;
pub mod round_robin;
pub mod weighted;

pub use endpoint::Endpoint;
pub use pool::EndpointPool;

/// Endpoint selection algorithm.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Pick one endpoint out of the enabled candidates.
    ///
    /// Returns `None` when no candidate can be selected.
    fn next_endpoint(&self, endpoints: &[Arc<Endpoint>]) -> Option<Arc<Endpoint>>;
}

/// Configured load balancing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    #[default]
    RoundRobin,
    Weighted,
    Random,
}

impl Strategy {
    /// Instantiate the balancer for this strategy.
    pub fn build(self) -> Box<dyn LoadBalancer> {
        match self {
            Strategy::RoundRobin => Box::new(round_robin::RoundRobin::new()),
            Strategy::Weighted => Box::new(weighted::Weighted::new()),
            Strategy::Random => Box::new(random::Random::new()),
        }
    }
}
