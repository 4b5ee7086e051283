//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS
//!
//! Authentication is not a layer: handlers opt in with the extractors in
//! [`auth`].

pub mod auth;
pub mod request_id;

pub use auth::{OptionalAuth, RequireAuth, RequireStaff};
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
