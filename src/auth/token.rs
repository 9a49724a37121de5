//! Opaque session tokens

use rand::Rng;
use sha2::{Digest, Sha256};

/// Generate a random 256-bit token, hex encoded
pub fn generate_session_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// Hash a token for storage; the raw token is never persisted
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
