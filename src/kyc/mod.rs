//! Investor identity verification applications

mod model;
mod service;

pub use model::*;
pub use service::KycService;
