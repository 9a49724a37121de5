//! Client-side payment workflow
//!
//! Card validation, the add-card form, the OTP gate, card management, the
//! top-up wizard and the token purchase dialog. Everything talks to the
//! backend through [`PortalApi`].

pub mod api;
pub mod buy_token;
pub mod card;
pub mod cards;
pub mod client;
pub mod exchange;
pub mod form;
pub mod otp;
pub mod wizard;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{PortalApi, WorkflowError};
pub use buy_token::{BuyOutcome, BuyTokenDialog};
pub use cards::CardManager;
pub use client::HttpPortalClient;
pub use exchange::{ExchangeError, ExchangeRates};
pub use form::{FormField, PaymentMethodDraft, PaymentMethodForm};
pub use otp::{FixedDemoCode, OtpCodeSource, OtpOutcome, OtpState, OtpVerifier};
pub use wizard::{
    CloseHandle, DepositAction, RegisterAccount, SavePaymentMethod, StepMachine, WizardAction,
    WizardConfig, WizardOutcome, WizardStep,
};
