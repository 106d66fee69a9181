//! Request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! ProxyRequest (method, path remainder, headers, body)
//!     → dispatch.rs (endpoint selection, exchange bookkeeping)
//!     → framing.rs + body.rs (one-chunk lookahead decides the framing)
//!     → redirect.rs (optional 3xx following)
//!     → connector.rs (one upstream HTTP/1.1 request per hop)
//!     → headers.rs (hop-by-hop removal on both legs)
//!     → Response streamed back to the caller
//! ```
//!
//! # Design Decisions
//! - Bodies stream in both directions; nothing is buffered beyond one chunk
//! - Every exchange reports exactly one outcome record
//! - Redirect targets are used verbatim; the pool is consulted once per request

pub mod body;
pub mod connector;
pub mod dispatch;
pub mod exchange;
pub mod framing;
pub mod headers;
pub mod redirect;

pub use body::ProxyBody;
pub use connector::UpstreamConnector;
pub use dispatch::{Dispatcher, ProxyRequest};
pub use framing::Framing;
