//! Token purchases, portfolio aggregation and income distributions

mod model;
mod service;

pub use model::*;
pub use service::InvestmentService;
