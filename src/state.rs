//! Shared application state

mod app_state;

pub use app_state::{AppState, ClientConfig};
