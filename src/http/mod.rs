//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → [routing layer picks the API by context path]
//!     → [proxy layer dispatches to one endpoint]
//!     → Streamed response to client
//! ```

pub mod server;

pub use server::{AppState, HttpServer};
