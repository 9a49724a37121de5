//! In-memory [`PortalApi`] for workflow unit tests

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::api::{PortalApi, WorkflowError};
use super::exchange::ExchangeRates;
use crate::investment::{CreateInvestmentRequest, Investment, InvestmentStatus};
use crate::models::{AuthResponse, CardBrand, Currency, RegisterRequest, UserResponse, UserRole};
use crate::payment_method::{CreatePaymentMethodRequest, PaymentMethod, PaymentMethodStatus};
use crate::wallet::{DepositRequest, DepositResponse, WalletBalance};

#[derive(Default)]
struct State {
    balance: i64,
    cards: Vec<PaymentMethod>,
    investments: Vec<Investment>,
    deposits: Vec<DepositRequest>,
    registrations: Vec<RegisterRequest>,
    list_calls: usize,
    fail_next: Option<String>,
    delay: Option<Duration>,
}

pub struct FakePortal {
    state: Mutex<State>,
}

impl FakePortal {
    pub fn new(balance: i64) -> Self {
        Self {
            state: Mutex::new(State {
                balance,
                ..Default::default()
            }),
        }
    }

    pub fn add_card(&self, last_four: &str) -> Uuid {
        let card = card(last_four, CardBrand::Visa);
        let id = card.id;
        self.state.lock().unwrap().cards.push(card);
        id
    }

    /// The next call fails with this backend message
    pub fn fail_next(&self, message: &str) {
        self.state.lock().unwrap().fail_next = Some(message.to_string());
    }

    /// Make every deposit and purchase take this long
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    async fn wait(&self) {
        let delay = self.state.lock().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    pub fn deposits(&self) -> Vec<DepositRequest> {
        self.state.lock().unwrap().deposits.clone()
    }

    pub fn investments(&self) -> Vec<Investment> {
        self.state.lock().unwrap().investments.clone()
    }

    pub fn registrations(&self) -> Vec<RegisterRequest> {
        self.state.lock().unwrap().registrations.clone()
    }

    pub fn balance(&self) -> i64 {
        self.state.lock().unwrap().balance
    }

    fn check_failure(&self) -> Result<(), WorkflowError> {
        match self.state.lock().unwrap().fail_next.take() {
            Some(message) => Err(WorkflowError::Backend(message)),
            None => Ok(()),
        }
    }

    fn wallet(balance: i64) -> WalletBalance {
        WalletBalance {
            total_balance: balance,
            available_balance: balance,
            invested_amount: 0,
            total_returns: 0,
            currency: Currency::Pkr,
            updated_at: Utc::now(),
        }
    }
}

fn card(last_four: &str, brand: CardBrand) -> PaymentMethod {
    PaymentMethod {
        id: Uuid::new_v4(),
        card_type: brand,
        masked_number: format!("**** **** **** {}", last_four),
        last_four: last_four.to_string(),
        holder_name: "Test User".to_string(),
        expiry_month: 12,
        expiry_year: 2099,
        currency: Currency::Pkr,
        is_default: false,
        is_verified: true,
        status: PaymentMethodStatus::Active,
        created_at: Utc::now(),
    }
}

#[async_trait]
impl PortalApi for FakePortal {
    async fn list_payment_methods(&self) -> Result<Vec<PaymentMethod>, WorkflowError> {
        self.check_failure()?;
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        Ok(state.cards.clone())
    }

    async fn create_payment_method(
        &self,
        req: &CreatePaymentMethodRequest,
    ) -> Result<PaymentMethod, WorkflowError> {
        self.check_failure()?;
        let brand = crate::workflow::card::detect_card_type(&req.card_number)
            .ok_or_else(|| WorkflowError::Backend("Unsupported card".to_string()))?;
        let mut saved = card(&crate::workflow::card::last_four(&req.card_number), brand);
        saved.is_verified = false;
        saved.currency = req.currency;
        self.state.lock().unwrap().cards.push(saved.clone());
        Ok(saved)
    }

    async fn wallet_balance(&self) -> Result<WalletBalance, WorkflowError> {
        self.check_failure()?;
        Ok(Self::wallet(self.balance()))
    }

    async fn deposit(&self, req: &DepositRequest) -> Result<DepositResponse, WorkflowError> {
        self.wait().await;
        self.check_failure()?;
        if !req.otp_verified {
            return Err(WorkflowError::Backend(
                "OTP verification is required before this operation".to_string(),
            ));
        }
        let amount_base = ExchangeRates::default().to_base(req.amount, req.currency)?;
        let mut state = self.state.lock().unwrap();
        state.balance += amount_base;
        state.deposits.push(req.clone());
        Ok(DepositResponse {
            transaction_id: Uuid::new_v4(),
            amount: req.amount,
            currency: req.currency,
            amount_base,
            wallet: Self::wallet(state.balance),
        })
    }

    async fn create_investment(
        &self,
        req: &CreateInvestmentRequest,
    ) -> Result<Investment, WorkflowError> {
        self.wait().await;
        self.check_failure()?;
        let mut state = self.state.lock().unwrap();
        if req.investment_amount > state.balance {
            return Err(WorkflowError::Backend("Insufficient balance".to_string()));
        }
        state.balance -= req.investment_amount;
        let investment = Investment {
            id: Uuid::new_v4(),
            property_id: req.property_id,
            tokens_purchased: req.tokens_purchased,
            investment_amount: req.investment_amount,
            total_earned: 0,
            payment: req.payment.clone(),
            status: InvestmentStatus::Active,
            created_at: Utc::now(),
        };
        state.investments.push(investment.clone());
        Ok(investment)
    }

    async fn my_investments(&self, limit: Option<i64>) -> Result<Vec<Investment>, WorkflowError> {
        self.check_failure()?;
        let investments = self.investments();
        let limit = limit.map(|l| l.max(0) as usize).unwrap_or(investments.len());
        Ok(investments.into_iter().take(limit).collect())
    }

    async fn register(&self, req: &RegisterRequest) -> Result<AuthResponse, WorkflowError> {
        self.check_failure()?;
        self.state.lock().unwrap().registrations.push(req.clone());
        let now = Utc::now();
        Ok(AuthResponse {
            token: Some("token".to_string()),
            challenge_token: None,
            requires_two_factor: false,
            token_type: "Bearer".to_string(),
            expires_at: now,
            user: UserResponse {
                id: Uuid::new_v4(),
                name: format!("{} {}", req.first_name, req.last_name),
                email: req.email.clone(),
                first_name: req.first_name.clone(),
                last_name: req.last_name.clone(),
                phone: req.phone.clone(),
                role: UserRole::Investor,
                two_factor_enabled: req.enable_two_factor,
                created_at: now,
            },
        })
    }
}
