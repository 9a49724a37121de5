//! Backend operations the payment workflow depends on

use async_trait::async_trait;
use thiserror::Error;

use super::exchange::ExchangeError;
use crate::investment::{CreateInvestmentRequest, Investment};
use crate::models::{AuthResponse, RegisterRequest};
use crate::payment_method::{CreatePaymentMethodRequest, PaymentMethod};
use crate::wallet::{DepositRequest, DepositResponse, WalletBalance};

/// Errors surfaced to the user by workflow components
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Non-2xx response, carrying the server's message
    #[error("{0}")]
    Backend(String),

    /// Network failure or undecodable response
    #[error("Request failed: {0}")]
    Transport(String),

    /// Local input problem, shown next to the offending step
    #[error("{0}")]
    Validation(String),

    #[error("{0} is not available yet")]
    NotSupported(&'static str),

    #[error("Insufficient wallet balance. Add a payment method and top up your wallet first")]
    AddFundsFirst,

    #[error("Dialog was closed")]
    Closed,

    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

impl From<reqwest::Error> for WorkflowError {
    fn from(err: reqwest::Error) -> Self {
        WorkflowError::Transport(err.to_string())
    }
}

#[async_trait]
pub trait PortalApi: Send + Sync {
    async fn list_payment_methods(&self) -> Result<Vec<PaymentMethod>, WorkflowError>;

    async fn create_payment_method(
        &self,
        req: &CreatePaymentMethodRequest,
    ) -> Result<PaymentMethod, WorkflowError>;

    async fn wallet_balance(&self) -> Result<WalletBalance, WorkflowError>;

    async fn deposit(&self, req: &DepositRequest) -> Result<DepositResponse, WorkflowError>;

    async fn create_investment(
        &self,
        req: &CreateInvestmentRequest,
    ) -> Result<Investment, WorkflowError>;

    async fn my_investments(&self, limit: Option<i64>) -> Result<Vec<Investment>, WorkflowError>;

    async fn register(&self, req: &RegisterRequest) -> Result<AuthResponse, WorkflowError>;
}
