//! Saved cards: models, boundary normalization, and persistence

mod model;
mod service;

pub use model::*;
pub use service::PaymentMethodService;
