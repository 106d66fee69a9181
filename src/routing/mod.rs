//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → router.rs (context path lookup)
//!     → Return: (Dispatcher, path remainder) or NoMatch
//! ```
//!
//! # Design Decisions
//! - Matching is by context path only; host and header rules live upstream
//! - Deterministic: same input always matches same API
//! - Longest context path wins

pub mod router;

pub use router::ApiRouter;
