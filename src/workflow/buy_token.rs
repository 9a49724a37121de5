//! Token purchase dialog
//!
//! Checks the wallet against the purchase total and hands off to the
//! top-up wizard when the balance is short.

use std::fmt;
use std::sync::Arc;

use tokio::time::Duration;
use uuid::Uuid;

use super::api::{PortalApi, WorkflowError};
use super::exchange::ExchangeRates;
use super::otp::OtpCodeSource;
use super::wizard::{CloseHandle, StepMachine, AUTO_CLOSE};
use crate::investment::{CreateInvestmentRequest, Investment, WALLET_PAYMENT};
use crate::payment_method::PaymentMethod;
use crate::wallet::WalletBalance;

pub const MIN_QUANTITY: i64 = 1;
pub const MAX_QUANTITY: i64 = 1000;

/// Result of pressing "Buy now"
pub enum BuyOutcome {
    Purchased(Investment),
    /// Balance is short; a top-up wizard prefilled with the shortfall
    TopUpRequired(Box<StepMachine>),
}

impl fmt::Debug for BuyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuyOutcome::Purchased(investment) => {
                f.debug_tuple("Purchased").field(&investment.id).finish()
            }
            BuyOutcome::TopUpRequired(wizard) => f.debug_tuple("TopUpRequired").field(wizard).finish(),
        }
    }
}

pub struct BuyTokenDialog {
    api: Arc<dyn PortalApi>,
    property_id: Uuid,
    price_per_token: i64,
    exchange_rates: ExchangeRates,
    otp_source: Arc<dyn OtpCodeSource>,
    quantity: i64,
    wallet: Option<WalletBalance>,
    payment_methods: Vec<PaymentMethod>,
    purchase: Option<Investment>,
    error: Option<String>,
    close: CloseHandle,
    auto_close: Duration,
}

impl BuyTokenDialog {
    pub fn new(
        api: Arc<dyn PortalApi>,
        property_id: Uuid,
        price_per_token: i64,
        exchange_rates: ExchangeRates,
        otp_source: Arc<dyn OtpCodeSource>,
    ) -> Self {
        Self {
            api,
            property_id,
            price_per_token,
            exchange_rates,
            otp_source,
            quantity: MIN_QUANTITY,
            wallet: None,
            payment_methods: Vec::new(),
            purchase: None,
            error: None,
            close: CloseHandle::default(),
            auto_close: AUTO_CLOSE,
        }
    }

    /// Load the wallet and saved cards
    pub async fn open(&mut self) -> Result<(), WorkflowError> {
        self.refresh().await
    }

    /// Re-read the wallet, e.g. after a top-up completed
    pub async fn refresh(&mut self) -> Result<(), WorkflowError> {
        let fetched = tokio::try_join!(self.api.wallet_balance(), self.api.list_payment_methods());
        if self.close.is_closed() {
            return Err(WorkflowError::Closed);
        }
        match fetched {
            Ok((wallet, methods)) => {
                self.wallet = Some(wallet);
                self.payment_methods = methods;
                self.error = None;
                Ok(())
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Typed quantity; anything unparsable counts as one token
    pub fn set_quantity(&mut self, text: &str) -> i64 {
        self.quantity = text
            .trim()
            .parse::<i64>()
            .unwrap_or(MIN_QUANTITY)
            .clamp(MIN_QUANTITY, MAX_QUANTITY);
        self.quantity
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn total(&self) -> i64 {
        self.quantity.saturating_mul(self.price_per_token)
    }

    pub fn available_balance(&self) -> i64 {
        self.wallet
            .as_ref()
            .map(|w| w.available_balance)
            .unwrap_or(0)
    }

    pub fn has_insufficient_balance(&self) -> bool {
        self.total() > self.available_balance()
    }

    pub fn shortfall(&self) -> i64 {
        (self.total() - self.available_balance()).max(0)
    }

    pub fn payment_methods(&self) -> &[PaymentMethod] {
        &self.payment_methods
    }

    pub fn purchase(&self) -> Option<&Investment> {
        self.purchase.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn close_handle(&self) -> CloseHandle {
        self.close.clone()
    }

    pub fn close(&self) {
        self.close.close();
    }

    pub fn is_closed(&self) -> bool {
        self.close.is_closed()
    }

    pub async fn buy_now(&mut self) -> Result<BuyOutcome, WorkflowError> {
        if self.is_closed() {
            return Err(WorkflowError::Closed);
        }

        if self.has_insufficient_balance() {
            if self.payment_methods.is_empty() {
                let err = WorkflowError::AddFundsFirst;
                self.error = Some(err.to_string());
                return Err(err);
            }
            let mut wizard =
                StepMachine::top_up(self.api.clone(), self.exchange_rates.clone(), self.otp_source.clone())?;
            wizard.set_amount(&self.shortfall().to_string());
            wizard.set_description("Top-up for token purchase");
            tracing::debug!(
                property_id = %self.property_id,
                shortfall = self.shortfall(),
                "Balance too low, opening top-up"
            );
            return Ok(BuyOutcome::TopUpRequired(Box::new(wizard)));
        }

        let request = CreateInvestmentRequest {
            property_id: self.property_id,
            tokens_purchased: self.quantity,
            investment_amount: self.total(),
            payment: WALLET_PAYMENT.to_string(),
        };
        let result = self.api.create_investment(&request).await;

        if self.is_closed() {
            return Err(WorkflowError::Closed);
        }

        match result {
            Ok(investment) => {
                tracing::info!(
                    property_id = %self.property_id,
                    tokens = investment.tokens_purchased,
                    "Tokens purchased"
                );
                self.error = None;
                self.purchase = Some(investment.clone());
                Ok(BuyOutcome::Purchased(investment))
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// After a purchase: wait the auto-close window, notify once and close
    pub async fn finish(
        &mut self,
        on_success: impl FnOnce(&Investment),
    ) -> Result<(), WorkflowError> {
        let investment = self.purchase.take().ok_or_else(|| {
            WorkflowError::Validation("No purchase has been made".to_string())
        })?;
        tokio::time::sleep(self.auto_close).await;
        if !self.is_closed() {
            on_success(&investment);
        }
        self.close.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::otp::FixedDemoCode;
    use crate::workflow::testing::FakePortal;
    use crate::workflow::wizard::WizardStep;
    use tokio::time::Instant;

    fn dialog(api: &Arc<FakePortal>, price: i64) -> BuyTokenDialog {
        BuyTokenDialog::new(
            api.clone(),
            Uuid::new_v4(),
            price,
            ExchangeRates::default(),
            Arc::new(FixedDemoCode::default()),
        )
    }

    #[test]
    fn test_quantity_is_clamped() {
        let api = Arc::new(FakePortal::new(0));
        let mut dialog = dialog(&api, 89_200);
        assert_eq!(dialog.set_quantity("5"), 5);
        assert_eq!(dialog.total(), 446_000);
        assert_eq!(dialog.set_quantity("abc"), 1);
        assert_eq!(dialog.set_quantity(""), 1);
        assert_eq!(dialog.set_quantity("0"), 1);
        assert_eq!(dialog.set_quantity("-3"), 1);
        assert_eq!(dialog.set_quantity("5000"), 1000);
    }

    #[tokio::test]
    async fn test_sufficient_balance_purchases() {
        let api = Arc::new(FakePortal::new(500_000));
        let mut dialog = dialog(&api, 89_200);
        dialog.open().await.unwrap();
        dialog.set_quantity("5");
        assert!(!dialog.has_insufficient_balance());

        let outcome = dialog.buy_now().await.unwrap();
        let investment = match outcome {
            BuyOutcome::Purchased(investment) => investment,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(investment.tokens_purchased, 5);
        assert_eq!(investment.investment_amount, 446_000);
        assert_eq!(investment.payment, WALLET_PAYMENT);
        assert_eq!(api.balance(), 54_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_balance_opens_prefilled_top_up() {
        let api = Arc::new(FakePortal::new(100_000));
        let card = api.add_card("1111");
        let mut dialog = dialog(&api, 89_200);
        dialog.open().await.unwrap();
        dialog.set_quantity("5");
        assert!(dialog.has_insufficient_balance());
        assert_eq!(dialog.shortfall(), 346_000);

        let mut wizard = match dialog.buy_now().await.unwrap() {
            BuyOutcome::TopUpRequired(wizard) => wizard,
            other => panic!("unexpected {:?}", other),
        };
        assert!(api.investments().is_empty());
        assert_eq!(wizard.amount_input(), "346000");

        wizard.open().await.unwrap();
        wizard.next().await.unwrap();
        wizard.cards_mut().select(card).unwrap();
        assert_eq!(wizard.next().await.unwrap(), WizardStep::Otp);
        wizard.enter_otp("1122", Instant::now()).await.unwrap();
        assert_eq!(wizard.step(), WizardStep::Success);

        dialog.refresh().await.unwrap();
        assert!(!dialog.has_insufficient_balance());
        assert!(matches!(
            dialog.buy_now().await.unwrap(),
            BuyOutcome::Purchased(_)
        ));
        assert_eq!(api.balance(), 0);
    }

    #[tokio::test]
    async fn test_short_balance_without_cards_asks_for_funds() {
        let api = Arc::new(FakePortal::new(0));
        let mut dialog = dialog(&api, 89_200);
        dialog.open().await.unwrap();
        assert!(matches!(
            dialog.buy_now().await,
            Err(WorkflowError::AddFundsFirst)
        ));
        assert!(dialog.error().is_some());
        assert!(api.investments().is_empty());
    }

    #[tokio::test]
    async fn test_backend_rejection_is_shown() {
        let api = Arc::new(FakePortal::new(500_000));
        let mut dialog = dialog(&api, 89_200);
        dialog.open().await.unwrap();
        api.fail_next("Only 2 tokens left");
        assert!(dialog.buy_now().await.is_err());
        assert_eq!(dialog.error(), Some("Only 2 tokens left"));
        assert!(!dialog.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_notifies_once_then_closes() {
        let api = Arc::new(FakePortal::new(500_000));
        let mut dialog = dialog(&api, 1_000);
        dialog.open().await.unwrap();
        dialog.buy_now().await.unwrap();

        let started = Instant::now();
        let mut calls = 0;
        dialog.finish(|_| calls += 1).await.unwrap();
        assert!(started.elapsed() >= AUTO_CLOSE);
        assert_eq!(calls, 1);
        assert!(dialog.is_closed());
        assert!(dialog.finish(|_| calls += 1).await.is_err());
        assert!(matches!(dialog.buy_now().await, Err(WorkflowError::Closed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_purchase_after_close_is_discarded() {
        let api = Arc::new(FakePortal::new(500_000));
        api.set_delay(Duration::from_millis(500));
        let mut dialog = dialog(&api, 1_000);
        dialog.open().await.unwrap();

        let handle = dialog.close_handle();
        let (result, _) = tokio::join!(dialog.buy_now(), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            handle.close();
        });
        assert!(matches!(result, Err(WorkflowError::Closed)));
        assert!(dialog.purchase().is_none());
    }
}
