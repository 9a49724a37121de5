//! API handlers for the portal backend

pub mod auth;
pub mod investments;
pub mod kyc;
pub mod payment_methods;
pub mod properties;
pub mod system;
pub mod wallet;

// Re-export AuthenticatedUser from middleware for handler use
pub use crate::middleware::auth::{AdminUser, AuthenticatedUser};
