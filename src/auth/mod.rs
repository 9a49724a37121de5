//! Authentication module for the PropToken portal
//!
//! - Opaque bearer tokens persisted (hashed) as session rows
//! - Pluggable identity providers (password, fixed demo identity)
//! - Optional second factor with configured demo codes

mod provider;
mod service;
mod token;

pub use provider::{AuthProvider, DemoAuthProvider, PasswordAuthProvider, DEMO_USER_EMAIL};
#[cfg(test)]
pub(crate) use provider::insert_user;
pub use service::{AuthError, AuthService, ClientInfo};
pub use token::{generate_session_token, hash_token};
