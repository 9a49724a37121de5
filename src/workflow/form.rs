//! Controlled payment-method form
//!
//! Every edit re-runs full validation and reports either a complete
//! [`PaymentMethodDraft`] or `None` to the change listener. Field errors are
//! only shown after [`PaymentMethodForm::touch_all`] and disappear as soon as
//! the offending field is edited again.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate, Utc};

use super::card::{
    detect_card_type, format_card_number, last_four, mask_card_number, validate_card_number,
    validate_cvv, validate_expiry,
};
use crate::models::{CardBrand, Currency};
use crate::payment_method::{BillingInfo, CreatePaymentMethodRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FormField {
    CardNumber,
    HolderName,
    ExpiryMonth,
    ExpiryYear,
    Cvv,
    Currency,
}

/// A fully validated card, ready to be sent to `POST /api/payment-methods`.
///
/// Holds the raw digits in memory only; `Debug` never prints them.
#[derive(Clone, PartialEq)]
pub struct PaymentMethodDraft {
    pub brand: CardBrand,
    pub card_number: String,
    pub masked_number: String,
    pub last_four: String,
    pub holder_name: String,
    pub expiry_month: u32,
    pub expiry_year: i32,
    pub cvv: String,
    pub currency: Currency,
}

impl fmt::Debug for PaymentMethodDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentMethodDraft")
            .field("brand", &self.brand)
            .field("masked_number", &self.masked_number)
            .field("holder_name", &self.holder_name)
            .field("expiry_month", &self.expiry_month)
            .field("expiry_year", &self.expiry_year)
            .field("currency", &self.currency)
            .finish_non_exhaustive()
    }
}

impl PaymentMethodDraft {
    /// Body for `POST /api/payment-methods`
    pub fn into_request(self, billing: Option<BillingInfo>) -> CreatePaymentMethodRequest {
        CreatePaymentMethodRequest {
            card_number: self.card_number,
            holder_name: self.holder_name,
            expiry_month: self.expiry_month,
            expiry_year: self.expiry_year,
            cvv: self.cvv,
            currency: self.currency,
            billing,
            is_default: false,
        }
    }
}

type ChangeListener = Box<dyn FnMut(Option<&PaymentMethodDraft>) + Send>;

pub struct PaymentMethodForm {
    card_number: String,
    holder_name: String,
    expiry_month: String,
    expiry_year: String,
    cvv: String,
    currency: Currency,
    show_currency: bool,
    errors: BTreeMap<FormField, String>,
    today: Option<NaiveDate>,
    on_change: Option<ChangeListener>,
}

impl PaymentMethodForm {
    /// Form whose currency is fixed to `context_currency` (selector hidden)
    pub fn new(context_currency: Currency) -> Self {
        Self {
            card_number: String::new(),
            holder_name: String::new(),
            expiry_month: String::new(),
            expiry_year: String::new(),
            cvv: String::new(),
            currency: context_currency,
            show_currency: false,
            errors: BTreeMap::new(),
            today: None,
            on_change: None,
        }
    }

    pub fn with_currency_selector(mut self, show: bool) -> Self {
        self.show_currency = show;
        self
    }

    /// Pin "today" for expiry checks
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn on_change(
        mut self,
        listener: impl FnMut(Option<&PaymentMethodDraft>) + Send + 'static,
    ) -> Self {
        self.on_change = Some(Box::new(listener));
        self
    }

    /// Update one field, clear its error, and notify the listener
    pub fn set_field(&mut self, field: FormField, value: &str) -> Option<PaymentMethodDraft> {
        match field {
            FormField::CardNumber => self.card_number = format_card_number(value),
            FormField::HolderName => self.holder_name = value.to_string(),
            FormField::ExpiryMonth => self.expiry_month = value.trim().to_string(),
            FormField::ExpiryYear => self.expiry_year = value.trim().to_string(),
            FormField::Cvv => {
                self.cvv = value.chars().filter(|c| c.is_ascii_digit()).take(4).collect()
            }
            FormField::Currency => {
                if self.show_currency {
                    if let Some(currency) = Currency::from_code(value) {
                        self.currency = currency;
                    }
                }
            }
        }
        self.errors.remove(&field);

        let draft = self.draft();
        if let Some(listener) = self.on_change.as_mut() {
            listener(draft.as_ref());
        }
        draft
    }

    /// Display value of a field (card number comes back grouped)
    pub fn value(&self, field: FormField) -> String {
        match field {
            FormField::CardNumber => self.card_number.clone(),
            FormField::HolderName => self.holder_name.clone(),
            FormField::ExpiryMonth => self.expiry_month.clone(),
            FormField::ExpiryYear => self.expiry_year.clone(),
            FormField::Cvv => self.cvv.clone(),
            FormField::Currency => self.currency.to_string(),
        }
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn shows_currency(&self) -> bool {
        self.show_currency
    }

    /// Surface every current validation error (e.g. on a submit attempt)
    pub fn touch_all(&mut self) -> bool {
        self.errors = self.validate();
        self.errors.is_empty()
    }

    pub fn error(&self, field: FormField) -> Option<&str> {
        self.errors.get(&field).map(String::as_str)
    }

    pub fn errors(&self) -> &BTreeMap<FormField, String> {
        &self.errors
    }

    /// The normalized payment method, if every field is valid
    pub fn draft(&self) -> Option<PaymentMethodDraft> {
        if !self.validate().is_empty() {
            return None;
        }
        let brand = detect_card_type(&self.card_number)?;
        Some(PaymentMethodDraft {
            brand,
            card_number: self.card_number.chars().filter(|c| c.is_ascii_digit()).collect(),
            masked_number: mask_card_number(&self.card_number),
            last_four: last_four(&self.card_number),
            holder_name: self.holder_name.trim().to_string(),
            expiry_month: self.expiry_month.parse().ok()?,
            expiry_year: self.expiry_year.parse().ok()?,
            cvv: self.cvv.clone(),
            currency: self.currency,
        })
    }

    /// Clear every field and error; the currency returns to `context_currency`
    pub fn reset(&mut self, context_currency: Currency) {
        self.card_number.clear();
        self.holder_name.clear();
        self.expiry_month.clear();
        self.expiry_year.clear();
        self.cvv.clear();
        self.currency = context_currency;
        self.errors.clear();
    }

    fn validate(&self) -> BTreeMap<FormField, String> {
        let mut errors = BTreeMap::new();
        let today = self.today.unwrap_or_else(|| Utc::now().date_naive());

        if self.card_number.is_empty() {
            errors.insert(FormField::CardNumber, "Card number is required".to_string());
        } else if !validate_card_number(&self.card_number) {
            errors.insert(FormField::CardNumber, "Invalid card number".to_string());
        } else if detect_card_type(&self.card_number).is_none() {
            errors.insert(
                FormField::CardNumber,
                "Only Visa and Mastercard are supported".to_string(),
            );
        }

        if self.holder_name.trim().is_empty() {
            errors.insert(
                FormField::HolderName,
                "Cardholder name is required".to_string(),
            );
        }

        let month = self
            .expiry_month
            .parse::<u32>()
            .ok()
            .filter(|m| (1..=12).contains(m));
        if month.is_none() {
            errors.insert(FormField::ExpiryMonth, "Enter a month from 1 to 12".to_string());
        }

        let year = self
            .expiry_year
            .parse::<i32>()
            .ok()
            .filter(|y| *y >= today.year());
        if year.is_none() {
            errors.insert(
                FormField::ExpiryYear,
                format!("Enter a year from {} onwards", today.year()),
            );
        }

        if let (Some(month), Some(year)) = (month, year) {
            if !validate_expiry(month, year, today) {
                errors.insert(FormField::ExpiryMonth, "Card has expired".to_string());
            }
        }

        if !validate_cvv(&self.cvv) {
            errors.insert(FormField::Cvv, "CVV must be 3 or 4 digits".to_string());
        }

        errors
    }
}
