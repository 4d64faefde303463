//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers)
//!     → request.rs (request id, trace span)
//!     → middleware/response_cache.rs (replay or record GET responses)
//!     → middleware/invalidation.rs (clear keys after mutations)
//!     → admin/ and services/ handlers
//!     → response.rs (envelopes, error mapping)
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::{success, ApiError, CacheControl};
pub use server::{build_router, AppState, HttpServer, CACHE_BREAKER};
