//! Wallet balances, deposits and the transaction ledger

mod model;
mod service;

pub use model::*;
pub(crate) use service::ensure_wallet;
pub use service::WalletService;
