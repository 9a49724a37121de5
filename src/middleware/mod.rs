//! Middleware for the portal API
//!
//! This module provides middleware for request tracing, rate limiting,
//! security headers, and authentication.

pub mod auth;
mod rate_limiter;
mod security;
mod tracing;

pub use auth::{AdminUser, AuthenticatedUser};
pub use rate_limiter::{rate_limit, RateLimiter};
pub use security::{hsts_header, security_headers};
pub use self::tracing::{request_tracing, REQUEST_ID_HEADER};
