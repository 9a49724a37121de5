//! Step machine behind every payment flow
//!
//! Wallet top-up, post-login billing setup and registration all walk the
//! same amount / billing / card / OTP / success sequence. A [`WizardConfig`]
//! picks which steps are present and a [`WizardAction`] decides what
//! happens once the OTP gate is passed.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use validator::Validate;

use super::api::{PortalApi, WorkflowError};
use super::cards::CardManager;
use super::exchange::ExchangeRates;
use super::form::PaymentMethodDraft;
use super::otp::{OtpCodeSource, OtpOutcome, OtpVerifier};
use crate::models::{AuthResponse, Currency, RegisterRequest};
use crate::payment_method::{BillingInfo, PaymentMethod};
use crate::wallet::{DepositRequest, DepositResponse};

/// Delay between reaching `Success` and closing
pub const AUTO_CLOSE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WizardStep {
    Amount,
    Billing,
    Card,
    Otp,
    Success,
}

#[derive(Debug, Clone)]
pub struct WizardConfig {
    pub steps: Vec<WizardStep>,
    pub context_currency: Currency,
    pub exchange_rates: ExchangeRates,
    pub auto_close: Duration,
}

impl WizardConfig {
    /// Amount, card, OTP, success
    pub fn top_up(exchange_rates: ExchangeRates) -> Self {
        Self::with_steps(
            vec![
                WizardStep::Amount,
                WizardStep::Card,
                WizardStep::Otp,
                WizardStep::Success,
            ],
            exchange_rates,
        )
    }

    /// Billing, card, OTP, success
    pub fn billing_setup(exchange_rates: ExchangeRates) -> Self {
        Self::with_steps(
            vec![
                WizardStep::Billing,
                WizardStep::Card,
                WizardStep::Otp,
                WizardStep::Success,
            ],
            exchange_rates,
        )
    }

    /// Billing, OTP, success
    pub fn registration(exchange_rates: ExchangeRates) -> Self {
        Self::with_steps(
            vec![WizardStep::Billing, WizardStep::Otp, WizardStep::Success],
            exchange_rates,
        )
    }

    pub fn with_steps(steps: Vec<WizardStep>, exchange_rates: ExchangeRates) -> Self {
        Self {
            steps,
            context_currency: Currency::Pkr,
            exchange_rates,
            auto_close: AUTO_CLOSE,
        }
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.context_currency = currency;
        self
    }

    fn validate(&self) -> Result<(), WorkflowError> {
        let n = self.steps.len();
        if n < 2 || self.steps[n - 2..] != [WizardStep::Otp, WizardStep::Success] {
            return Err(WorkflowError::Validation(
                "A wizard must end with the OTP and success steps".to_string(),
            ));
        }
        for (i, step) in self.steps.iter().enumerate() {
            if self.steps[..i].contains(step) {
                return Err(WorkflowError::Validation(format!(
                    "Step {:?} appears more than once",
                    step
                )));
            }
        }
        Ok(())
    }

    fn has(&self, step: WizardStep) -> bool {
        self.steps.contains(&step)
    }
}

/// Shared cancellation flag; closing it discards in-flight responses
#[derive(Debug, Clone, Default)]
pub struct CloseHandle(Arc<AtomicBool>);

impl CloseHandle {
    pub fn close(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything collected by the steps so far
#[derive(Debug, Clone, Default)]
pub struct WizardData {
    pub amount: Option<f64>,
    pub currency: Currency,
    /// Amount converted into PKR
    pub amount_base: Option<i64>,
    pub billing: Option<BillingInfo>,
    pub payment_method: Option<PaymentMethod>,
    /// Validated but unsaved card, for actions that persist it themselves
    pub draft: Option<PaymentMethodDraft>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub enum WizardOutcome {
    Deposited(DepositResponse),
    PaymentMethodSaved(PaymentMethod),
    Registered(AuthResponse),
}

/// What the wizard does once the OTP gate is passed
#[async_trait]
pub trait WizardAction: Send + Sync {
    fn name(&self) -> &'static str;

    /// Keep a newly entered card as a draft instead of saving it at the card step
    fn keeps_card_draft(&self) -> bool {
        false
    }

    async fn submit(
        &self,
        api: &dyn PortalApi,
        data: &WizardData,
    ) -> Result<WizardOutcome, WorkflowError>;
}

/// Credit the wallet from the selected card
pub struct DepositAction;

#[async_trait]
impl WizardAction for DepositAction {
    fn name(&self) -> &'static str {
        "deposit"
    }

    async fn submit(
        &self,
        api: &dyn PortalApi,
        data: &WizardData,
    ) -> Result<WizardOutcome, WorkflowError> {
        let method = data
            .payment_method
            .as_ref()
            .ok_or_else(|| WorkflowError::Validation("Select a payment method".to_string()))?;
        let amount = data
            .amount
            .ok_or_else(|| WorkflowError::Validation("Enter an amount".to_string()))?;

        let request = DepositRequest {
            amount,
            currency: data.currency,
            payment_method_id: method.id,
            description: Some(data.description.clone().unwrap_or_else(|| {
                format!(
                    "Wallet top-up via {} ending {}",
                    method.card_type, method.last_four
                )
            })),
            otp_verified: true,
        };
        api.deposit(&request).await.map(WizardOutcome::Deposited)
    }
}

/// Store the entered card together with the billing details
pub struct SavePaymentMethod;

#[async_trait]
impl WizardAction for SavePaymentMethod {
    fn name(&self) -> &'static str {
        "save_payment_method"
    }

    fn keeps_card_draft(&self) -> bool {
        true
    }

    async fn submit(
        &self,
        api: &dyn PortalApi,
        data: &WizardData,
    ) -> Result<WizardOutcome, WorkflowError> {
        match (&data.draft, &data.payment_method) {
            (Some(draft), _) => {
                let mut request = draft.clone().into_request(data.billing.clone());
                request.is_default = true;
                api.create_payment_method(&request)
                    .await
                    .map(WizardOutcome::PaymentMethodSaved)
            }
            (None, Some(existing)) => Ok(WizardOutcome::PaymentMethodSaved(existing.clone())),
            (None, None) => Err(WorkflowError::Validation(
                "Add a card to continue".to_string(),
            )),
        }
    }
}

/// Create the account from the billing step's personal details
pub struct RegisterAccount {
    pub email: String,
    pub password: String,
    pub enable_two_factor: bool,
}

#[async_trait]
impl WizardAction for RegisterAccount {
    fn name(&self) -> &'static str {
        "register"
    }

    async fn submit(
        &self,
        api: &dyn PortalApi,
        data: &WizardData,
    ) -> Result<WizardOutcome, WorkflowError> {
        let billing = data
            .billing
            .as_ref()
            .ok_or_else(|| WorkflowError::Validation("Personal details are missing".to_string()))?;
        let request = RegisterRequest {
            email: self.email.clone(),
            password: self.password.clone(),
            first_name: billing.first_name.clone(),
            last_name: billing.last_name.clone(),
            phone: Some(billing.phone.clone()),
            enable_two_factor: self.enable_two_factor,
        };
        request
            .validate()
            .map_err(|e| WorkflowError::Validation(e.to_string()))?;
        api.register(&request).await.map(WizardOutcome::Registered)
    }
}

type SuccessCallback = Box<dyn FnOnce(&WizardOutcome) + Send>;

pub struct StepMachine {
    config: WizardConfig,
    api: Arc<dyn PortalApi>,
    action: Box<dyn WizardAction>,
    index: usize,
    amount_input: String,
    billing: BillingInfo,
    cards: CardManager,
    otp: OtpVerifier,
    data: WizardData,
    error: Option<String>,
    outcome: Option<WizardOutcome>,
    on_success: Option<SuccessCallback>,
    close: CloseHandle,
}

impl StepMachine {
    pub fn new(
        config: WizardConfig,
        api: Arc<dyn PortalApi>,
        action: Box<dyn WizardAction>,
        otp_source: Arc<dyn OtpCodeSource>,
    ) -> Result<Self, WorkflowError> {
        config.validate()?;
        let currency = config.context_currency;
        Ok(Self {
            cards: CardManager::new(api.clone(), currency).with_select_mode(),
            otp: OtpVerifier::new(otp_source),
            data: WizardData {
                currency,
                ..Default::default()
            },
            billing: BillingInfo {
                currency,
                ..Default::default()
            },
            amount_input: String::new(),
            index: 0,
            error: None,
            outcome: None,
            on_success: None,
            close: CloseHandle::default(),
            config,
            api,
            action,
        })
    }

    /// Wallet top-up wizard
    pub fn top_up(
        api: Arc<dyn PortalApi>,
        exchange_rates: ExchangeRates,
        otp_source: Arc<dyn OtpCodeSource>,
    ) -> Result<Self, WorkflowError> {
        Self::new(
            WizardConfig::top_up(exchange_rates),
            api,
            Box::new(DepositAction),
            otp_source,
        )
    }

    /// Called once after the success step closes
    pub fn on_success(mut self, callback: impl FnOnce(&WizardOutcome) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    pub fn close_handle(&self) -> CloseHandle {
        self.close.clone()
    }

    /// Load whatever the first step needs
    pub async fn open(&mut self) -> Result<(), WorkflowError> {
        if self.step() == WizardStep::Card {
            self.load_cards().await;
        }
        match &self.error {
            Some(message) => Err(WorkflowError::Backend(message.clone())),
            None => Ok(()),
        }
    }

    pub fn step(&self) -> WizardStep {
        self.config.steps[self.index]
    }

    pub fn steps(&self) -> &[WizardStep] {
        &self.config.steps
    }

    pub fn data(&self) -> &WizardData {
        &self.data
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    pub fn outcome(&self) -> Option<&WizardOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.close.is_closed()
    }

    pub fn set_amount(&mut self, text: &str) {
        self.amount_input = text.trim().to_string();
        self.error = None;
    }

    pub fn amount_input(&self) -> &str {
        &self.amount_input
    }

    pub fn set_currency(&mut self, currency: Currency) {
        self.data.currency = currency;
        self.billing.currency = currency;
    }

    /// Live PKR equivalent of the typed amount
    pub fn amount_preview(&self) -> Option<i64> {
        let amount = parse_amount(&self.amount_input)?;
        self.config
            .exchange_rates
            .to_base(amount, self.data.currency)
            .ok()
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.data.description = Some(description.into());
    }

    pub fn billing(&self) -> &BillingInfo {
        &self.billing
    }

    pub fn billing_mut(&mut self) -> &mut BillingInfo {
        &mut self.billing
    }

    pub fn set_billing(&mut self, billing: BillingInfo) {
        self.billing = billing;
        self.error = None;
    }

    pub fn cards(&self) -> &CardManager {
        &self.cards
    }

    pub fn cards_mut(&mut self) -> &mut CardManager {
        &mut self.cards
    }

    pub fn otp(&self) -> &OtpVerifier {
        &self.otp
    }

    /// Validate the current step and move forward
    pub async fn next(&mut self) -> Result<WizardStep, WorkflowError> {
        self.ensure_open()?;

        let accepted = match self.step() {
            WizardStep::Amount => self.accept_amount(),
            WizardStep::Billing => self.accept_billing(),
            WizardStep::Card => self.accept_card().await,
            WizardStep::Otp => Err(WorkflowError::Validation(
                "Enter the verification code to continue".to_string(),
            )),
            WizardStep::Success => return Ok(WizardStep::Success),
        };
        if let Err(e) = accepted {
            self.error = Some(e.to_string());
            return Err(e);
        }

        self.error = None;
        self.index += 1;
        match self.step() {
            WizardStep::Card => self.load_cards().await,
            WizardStep::Otp => self.otp.resend(),
            _ => {}
        }
        Ok(self.step())
    }

    /// Step back; never leaves `Success`
    pub fn back(&mut self) -> bool {
        if self.is_closed() || self.index == 0 || self.step() == WizardStep::Success {
            return false;
        }
        if self.step() == WizardStep::Otp {
            self.otp.resend();
        }
        self.index -= 1;
        self.error = None;
        true
    }

    /// Typed OTP digits; a matching code runs the terminal action
    pub async fn enter_otp(
        &mut self,
        text: &str,
        now: Instant,
    ) -> Result<OtpOutcome, WorkflowError> {
        self.ensure_on(WizardStep::Otp)?;
        let outcome = self.otp.input(text, now);
        self.after_otp(outcome).await
    }

    /// Enter key on the OTP step
    pub async fn submit_otp(&mut self, now: Instant) -> Result<OtpOutcome, WorkflowError> {
        self.ensure_on(WizardStep::Otp)?;
        let outcome = self.otp.submit(now);
        self.after_otp(outcome).await
    }

    pub fn resend_otp(&mut self) {
        self.otp.resend();
    }

    pub fn poll_otp(&mut self, now: Instant) {
        self.otp.poll(now);
    }

    /// Wait out the auto-close window, notify the caller and close
    pub async fn finish(&mut self) -> Result<bool, WorkflowError> {
        if self.step() != WizardStep::Success {
            return Err(WorkflowError::Validation(
                "The wizard has not completed".to_string(),
            ));
        }
        tokio::time::sleep(self.config.auto_close).await;
        let fired = self.fire_success();
        self.close.close();
        Ok(fired)
    }

    /// Dismiss the wizard. Closing on the success step still notifies the
    /// caller so it can refresh.
    pub fn close(&mut self) {
        if self.step() == WizardStep::Success {
            self.fire_success();
        }
        self.close.close();
    }

    fn fire_success(&mut self) -> bool {
        if let Some(outcome) = &self.outcome {
            if let Some(callback) = self.on_success.take() {
                callback(outcome);
                return true;
            }
        }
        false
    }

    fn ensure_open(&self) -> Result<(), WorkflowError> {
        if self.is_closed() {
            return Err(WorkflowError::Closed);
        }
        Ok(())
    }

    fn ensure_on(&self, step: WizardStep) -> Result<(), WorkflowError> {
        self.ensure_open()?;
        if self.step() != step {
            return Err(WorkflowError::Validation(format!(
                "Not on the {:?} step",
                step
            )));
        }
        Ok(())
    }

    async fn load_cards(&mut self) {
        if let Err(e) = self.cards.fetch_cards().await {
            self.error = Some(e.to_string());
        }
    }

    fn accept_amount(&mut self) -> Result<(), WorkflowError> {
        let amount = parse_amount(&self.amount_input).ok_or_else(|| {
            WorkflowError::Validation("Enter an amount greater than zero".to_string())
        })?;
        let amount_base = self
            .config
            .exchange_rates
            .to_base(amount, self.data.currency)?;
        if amount_base <= 0 {
            return Err(WorkflowError::Validation(
                "Amount is too small to top up".to_string(),
            ));
        }
        self.data.amount = Some(amount);
        self.data.amount_base = Some(amount_base);
        Ok(())
    }

    fn accept_billing(&mut self) -> Result<(), WorkflowError> {
        self.billing
            .validate()
            .map_err(|e| WorkflowError::Validation(e.to_string()))?;
        if !self.config.has(WizardStep::Amount) {
            self.data.currency = self.billing.currency;
        }
        self.data.billing = Some(self.billing.clone());
        Ok(())
    }

    async fn accept_card(&mut self) -> Result<(), WorkflowError> {
        if let Some(card) = self.cards.selected() {
            self.data.payment_method = Some(card.clone());
            self.data.draft = None;
            return Ok(());
        }
        if self.cards.form().is_none() {
            return Err(WorkflowError::Validation(
                "Select a payment method or add a new card".to_string(),
            ));
        }

        if self.action.keeps_card_draft() {
            let draft = self.cards.form_mut().and_then(|form| {
                form.touch_all();
                form.draft()
            });
            let draft = draft.ok_or_else(|| {
                WorkflowError::Validation("Please correct the highlighted card details".to_string())
            })?;
            self.data.draft = Some(draft);
            self.data.payment_method = None;
        } else {
            let saved = self.cards.save_new(self.data.billing.clone()).await?;
            self.data.payment_method = Some(saved);
            self.data.draft = None;
        }
        Ok(())
    }

    async fn after_otp(&mut self, outcome: OtpOutcome) -> Result<OtpOutcome, WorkflowError> {
        if outcome != OtpOutcome::Matched {
            return Ok(outcome);
        }

        let result = self.action.submit(self.api.as_ref(), &self.data).await;

        if self.is_closed() {
            tracing::debug!(action = self.action.name(), "Discarding response for closed wizard");
            return Err(WorkflowError::Closed);
        }

        match result {
            Ok(done) => {
                self.otp.confirm();
                self.outcome = Some(done);
                self.error = None;
                self.index += 1;
                tracing::info!(action = self.action.name(), "Wizard completed");
                Ok(OtpOutcome::Verified)
            }
            Err(e) => {
                tracing::warn!(action = self.action.name(), error = %e, "Wizard action failed");
                self.otp.reject(e.to_string());
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }
}

impl fmt::Debug for StepMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepMachine")
            .field("action", &self.action.name())
            .field("step", &self.step())
            .field("closed", &self.is_closed())
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

fn parse_amount(text: &str) -> Option<f64> {
    text.trim()
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|a| a.is_finite() && *a > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::form::FormField;
    use crate::workflow::otp::{FixedDemoCode, OtpState, LOCKOUT_COOLDOWN};
    use crate::workflow::testing::FakePortal;
    use std::sync::Mutex;

    fn top_up(api: &Arc<FakePortal>) -> StepMachine {
        StepMachine::top_up(
            api.clone(),
            ExchangeRates::default(),
            Arc::new(FixedDemoCode::default()),
        )
        .unwrap()
    }

    fn billing() -> BillingInfo {
        BillingInfo {
            first_name: "Ayesha".to_string(),
            last_name: "Khan".to_string(),
            email: "ayesha@example.com".to_string(),
            phone: "+923001234567".to_string(),
            company: None,
            address: "12 Mall Road".to_string(),
            city: "Lahore".to_string(),
            state: "Punjab".to_string(),
            country: "Pakistan".to_string(),
            postal_code: "54000".to_string(),
            currency: Currency::Pkr,
        }
    }

    async fn to_otp(wizard: &mut StepMachine, card: uuid::Uuid, amount: &str) {
        wizard.set_amount(amount);
        assert_eq!(wizard.next().await.unwrap(), WizardStep::Card);
        wizard.cards_mut().select(card).unwrap();
        assert_eq!(wizard.next().await.unwrap(), WizardStep::Otp);
    }

    #[tokio::test(start_paused = true)]
    async fn test_top_up_reaches_success_and_notifies_once() {
        let api = Arc::new(FakePortal::new(0));
        let card = api.add_card("1111");
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let mut wizard = top_up(&api).on_success(move |outcome| {
            assert!(matches!(outcome, WizardOutcome::Deposited(_)));
            *counter.lock().unwrap() += 1;
        });

        to_otp(&mut wizard, card, "10000").await;
        let outcome = wizard.enter_otp("1122", Instant::now()).await.unwrap();
        assert_eq!(outcome, OtpOutcome::Verified);
        assert_eq!(wizard.step(), WizardStep::Success);

        let deposits = api.deposits();
        assert_eq!(deposits.len(), 1);
        assert_eq!(deposits[0].amount, 10_000.0);
        assert_eq!(deposits[0].currency, Currency::Pkr);
        assert_eq!(deposits[0].payment_method_id, card);
        assert!(deposits[0].otp_verified);
        assert_eq!(api.balance(), 10_000);

        let started = Instant::now();
        assert!(wizard.finish().await.unwrap());
        assert!(started.elapsed() >= AUTO_CLOSE);
        assert!(wizard.is_closed());
        wizard.close();
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_amount_guard() {
        let api = Arc::new(FakePortal::new(0));
        let mut wizard = top_up(&api);

        for bad in ["", "abc", "0", "-10"] {
            wizard.set_amount(bad);
            assert!(wizard.next().await.is_err());
            assert_eq!(wizard.step(), WizardStep::Amount);
            assert!(wizard.error().is_some());
        }
    }

    #[tokio::test]
    async fn test_foreign_currency_preview() {
        let api = Arc::new(FakePortal::new(0));
        let mut wizard = top_up(&api);
        wizard.set_currency(Currency::Usd);
        wizard.set_amount("50");
        assert_eq!(wizard.amount_preview(), Some(14_000));
        wizard.next().await.unwrap();
        assert_eq!(wizard.data().amount_base, Some(14_000));
    }

    #[tokio::test]
    async fn test_card_step_requires_a_selection() {
        let api = Arc::new(FakePortal::new(0));
        api.add_card("1111");
        let mut wizard = top_up(&api);
        wizard.set_amount("500");
        wizard.next().await.unwrap();

        assert!(wizard.next().await.is_err());
        assert_eq!(wizard.step(), WizardStep::Card);

        // OTP entry is unreachable before the OTP step
        assert!(wizard.enter_otp("1122", Instant::now()).await.is_err());
        assert!(api.deposits().is_empty());
    }

    #[tokio::test]
    async fn test_new_card_is_saved_and_used() {
        let api = Arc::new(FakePortal::new(0));
        let mut wizard = top_up(&api);
        wizard.set_amount("2500");
        wizard.next().await.unwrap();

        let form = wizard.cards_mut().begin_add();
        form.set_field(FormField::CardNumber, "4111 1111 1111 1111");
        form.set_field(FormField::HolderName, "Ayesha Khan");
        form.set_field(FormField::ExpiryMonth, "12");
        form.set_field(FormField::ExpiryYear, "2099");
        form.set_field(FormField::Cvv, "123");

        assert_eq!(wizard.next().await.unwrap(), WizardStep::Otp);
        let method = wizard.data().payment_method.clone().unwrap();
        assert_eq!(method.last_four, "1111");

        wizard.enter_otp("1122", Instant::now()).await.unwrap();
        assert_eq!(api.deposits()[0].payment_method_id, method.id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_codes_never_submit() {
        let api = Arc::new(FakePortal::new(0));
        let card = api.add_card("1111");
        let mut wizard = top_up(&api);
        to_otp(&mut wizard, card, "1000").await;

        let now = Instant::now();
        for code in ["0000", "1111", "2222"] {
            wizard.enter_otp(code, now).await.unwrap();
        }
        assert!(matches!(wizard.otp().state(), OtpState::Locked { .. }));
        assert_eq!(
            wizard.enter_otp("1122", now).await.unwrap(),
            OtpOutcome::Locked
        );
        assert!(api.deposits().is_empty());

        let later = now + LOCKOUT_COOLDOWN;
        wizard.poll_otp(later);
        assert_eq!(wizard.otp().attempts(), 0);
        assert_eq!(
            wizard.enter_otp("1122", later).await.unwrap(),
            OtpOutcome::Verified
        );
    }

    #[tokio::test]
    async fn test_backend_failure_stays_on_otp() {
        let api = Arc::new(FakePortal::new(0));
        let card = api.add_card("1111");
        let mut wizard = top_up(&api);
        to_otp(&mut wizard, card, "10000").await;

        api.fail_next("Payment processor unavailable");
        let err = wizard.enter_otp("1122", Instant::now()).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Backend(_)));
        assert_eq!(wizard.step(), WizardStep::Otp);
        assert_eq!(wizard.error(), Some("Payment processor unavailable"));
        assert_eq!(wizard.amount_input(), "10000");
        assert_eq!(wizard.data().payment_method.as_ref().map(|m| m.id), Some(card));
        assert!(!wizard.otp().is_verified());

        // Retry without re-entering anything
        assert_eq!(
            wizard.enter_otp("1122", Instant::now()).await.unwrap(),
            OtpOutcome::Verified
        );
        assert_eq!(api.deposits().len(), 1);
    }

    #[tokio::test]
    async fn test_back_navigation() {
        let api = Arc::new(FakePortal::new(0));
        let card = api.add_card("1111");
        let mut wizard = top_up(&api);
        assert!(!wizard.back());

        to_otp(&mut wizard, card, "100").await;
        assert!(wizard.back());
        assert_eq!(wizard.step(), WizardStep::Card);
        assert!(wizard.back());
        assert_eq!(wizard.step(), WizardStep::Amount);
        assert_eq!(wizard.amount_input(), "100");

        wizard.next().await.unwrap();
        wizard.next().await.unwrap();
        wizard.enter_otp("1122", Instant::now()).await.unwrap();
        assert!(!wizard.back());
        assert_eq!(wizard.step(), WizardStep::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_after_close_is_discarded() {
        let api = Arc::new(FakePortal::new(0));
        let card = api.add_card("1111");
        api.set_delay(Duration::from_millis(500));
        let fired = Arc::new(Mutex::new(false));
        let flag = fired.clone();
        let mut wizard = top_up(&api).on_success(move |_| *flag.lock().unwrap() = true);
        to_otp(&mut wizard, card, "10000").await;

        let handle = wizard.close_handle();
        let (result, _) = tokio::join!(wizard.enter_otp("1122", Instant::now()), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            handle.close();
        });

        assert!(matches!(result, Err(WorkflowError::Closed)));
        assert_eq!(wizard.step(), WizardStep::Otp);
        assert!(wizard.outcome().is_none());
        assert!(!*fired.lock().unwrap());
        assert!(matches!(wizard.next().await, Err(WorkflowError::Closed)));
    }

    #[tokio::test]
    async fn test_billing_setup_saves_card_after_otp() {
        let api = Arc::new(FakePortal::new(0));
        let mut wizard = StepMachine::new(
            WizardConfig::billing_setup(ExchangeRates::default()),
            api.clone(),
            Box::new(SavePaymentMethod),
            Arc::new(FixedDemoCode::default()),
        )
        .unwrap();
        wizard.open().await.unwrap();

        wizard.billing_mut().first_name = "Ayesha".to_string();
        assert!(wizard.next().await.is_err());
        wizard.set_billing(billing());
        assert_eq!(wizard.next().await.unwrap(), WizardStep::Card);

        let form = wizard.cards_mut().begin_add();
        form.set_field(FormField::CardNumber, "5500000000000004");
        form.set_field(FormField::HolderName, "Ayesha Khan");
        form.set_field(FormField::ExpiryMonth, "1");
        form.set_field(FormField::ExpiryYear, "2099");
        form.set_field(FormField::Cvv, "999");
        assert_eq!(wizard.next().await.unwrap(), WizardStep::Otp);

        // Nothing persisted until the code is confirmed
        assert!(api.list_payment_methods().await.unwrap().is_empty());

        wizard.enter_otp("1122", Instant::now()).await.unwrap();
        match wizard.outcome() {
            Some(WizardOutcome::PaymentMethodSaved(method)) => assert_eq!(method.last_four, "0004"),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(api.list_payment_methods().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_registration_flow() {
        let api = Arc::new(FakePortal::new(0));
        let mut wizard = StepMachine::new(
            WizardConfig::registration(ExchangeRates::default()),
            api.clone(),
            Box::new(RegisterAccount {
                email: "new@example.com".to_string(),
                password: "correct horse".to_string(),
                enable_two_factor: false,
            }),
            Arc::new(FixedDemoCode::default()),
        )
        .unwrap();

        wizard.set_billing(billing());
        assert_eq!(wizard.next().await.unwrap(), WizardStep::Otp);
        assert!(wizard.back());
        assert_eq!(wizard.next().await.unwrap(), WizardStep::Otp);

        wizard.enter_otp("1122", Instant::now()).await.unwrap();
        assert!(matches!(wizard.outcome(), Some(WizardOutcome::Registered(_))));
        let registrations = api.registrations();
        assert_eq!(registrations.len(), 1);
        assert_eq!(registrations[0].first_name, "Ayesha");
    }

    #[test]
    fn test_config_must_end_with_otp_and_success() {
        let api: Arc<dyn PortalApi> = Arc::new(FakePortal::new(0));
        let source: Arc<dyn OtpCodeSource> = Arc::new(FixedDemoCode::default());
        let bad = [
            vec![WizardStep::Amount, WizardStep::Success],
            vec![WizardStep::Otp],
            vec![
                WizardStep::Card,
                WizardStep::Card,
                WizardStep::Otp,
                WizardStep::Success,
            ],
        ];
        for steps in bad {
            let config = WizardConfig::with_steps(steps, ExchangeRates::default());
            assert!(StepMachine::new(config, api.clone(), Box::new(DepositAction), source.clone())
                .is_err());
        }
    }
}
