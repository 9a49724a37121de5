//! Currency conversion into the base currency (PKR)
//!
//! Rates are sourced from configuration only, so every wizard and the
//! deposit handler convert with the same table.

use std::collections::HashMap;

use thiserror::Error;

use crate::models::Currency;

/// Rate table used when nothing is configured.
pub const DEFAULT_RATES: &str = "USD=280,EUR=305,GBP=355";

/// Largest PKR amount a single conversion may produce; stays exact in f64
pub const MAX_BASE: i64 = 1_000_000_000_000_000;

#[derive(Error, Debug, PartialEq)]
pub enum ExchangeError {
    #[error("No exchange rate configured for {0}")]
    MissingRate(Currency),

    #[error("Invalid exchange rate entry: {0}")]
    InvalidEntry(String),

    #[error("Amount is out of range")]
    OutOfRange,
}

/// Rates expressed as "PKR per one unit of currency"
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRates {
    rates: HashMap<Currency, f64>,
}

impl ExchangeRates {
    /// Parse a `CODE=rate` comma separated list. PKR is always 1.
    pub fn parse(table: &str) -> Result<Self, ExchangeError> {
        let mut rates = HashMap::new();
        rates.insert(Currency::Pkr, 1.0);

        for entry in table.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (code, rate) = entry
                .split_once('=')
                .ok_or_else(|| ExchangeError::InvalidEntry(entry.to_string()))?;
            let currency = Currency::from_code(code.trim())
                .ok_or_else(|| ExchangeError::InvalidEntry(entry.to_string()))?;
            let rate: f64 = rate
                .trim()
                .parse()
                .map_err(|_| ExchangeError::InvalidEntry(entry.to_string()))?;
            if !rate.is_finite() || rate <= 0.0 {
                return Err(ExchangeError::InvalidEntry(entry.to_string()));
            }
            if currency != Currency::Pkr {
                rates.insert(currency, rate);
            }
        }

        Ok(Self { rates })
    }

    pub fn rate(&self, currency: Currency) -> Result<f64, ExchangeError> {
        self.rates
            .get(&currency)
            .copied()
            .ok_or(ExchangeError::MissingRate(currency))
    }

    /// Convert an amount into whole PKR, rounded to the nearest rupee.
    /// Results beyond `MAX_BASE` in either direction are rejected rather
    /// than saturated.
    pub fn to_base(&self, amount: f64, currency: Currency) -> Result<i64, ExchangeError> {
        let value = (amount * self.rate(currency)?).round();
        if !value.is_finite() || value.abs() > MAX_BASE as f64 {
            return Err(ExchangeError::OutOfRange);
        }
        Ok(value as i64)
    }
}

impl Default for ExchangeRates {
    fn default() -> Self {
        // DEFAULT_RATES is a compile-time constant that always parses
        Self::parse(DEFAULT_RATES).unwrap_or_else(|_| Self {
            rates: HashMap::from([(Currency::Pkr, 1.0)]),
        })
    }
}
