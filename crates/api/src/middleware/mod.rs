//! HTTP middleware for the API.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, HTTP context)
//! 2. `TraceLayer` (request tracing)
//! 3. Identity extractors on individual handlers

pub mod auth;

pub use auth::{CurrentUser, RequireStaff, RequireUser};
