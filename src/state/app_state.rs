//! Application state shared across handlers

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::FromRef;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::auth::AuthService;
use crate::config::Config;
use crate::investment::InvestmentService;
use crate::kyc::KycService;
use crate::models::Currency;
use crate::payment_method::PaymentMethodService;
use crate::property::PropertyService;
use crate::wallet::WalletService;
use crate::workflow::otp::{MAX_ATTEMPTS, OTP_LENGTH};

/// Public settings served by `GET /api/config`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub api_url: String,
    pub environment: &'static str,
    pub base_currency: Currency,
    /// PKR per unit of each supported currency
    pub exchange_rates: BTreeMap<&'static str, f64>,
    pub otp_length: usize,
    pub otp_max_attempts: u32,
    /// Shown as a hint on the OTP step in demo builds only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demo_otp_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_client_id: Option<String>,
}

impl ClientConfig {
    pub fn from_config(config: &Config) -> Self {
        let exchange_rates = [Currency::Pkr, Currency::Usd, Currency::Eur, Currency::Gbp]
            .into_iter()
            .filter_map(|c| {
                config
                    .exchange_rates
                    .rate(c)
                    .ok()
                    .map(|rate| (c.as_str(), rate))
            })
            .collect();

        Self {
            api_url: config.api_url.clone(),
            environment: config.environment.as_str(),
            base_currency: Currency::Pkr,
            exchange_rates,
            otp_length: OTP_LENGTH,
            otp_max_attempts: MAX_ATTEMPTS,
            demo_otp_code: config.demo_otp_code.clone(),
            google_client_id: config.google_client_id.clone(),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub auth_service: Arc<AuthService>,
    pub payment_method_service: Arc<PaymentMethodService>,
    pub wallet_service: Arc<WalletService>,
    pub investment_service: Arc<InvestmentService>,
    pub property_service: Arc<PropertyService>,
    pub kyc_service: Arc<KycService>,
    pub client_config: Arc<ClientConfig>,
}

impl AppState {
    /// Wire every service onto one pool
    pub fn new(db_pool: SqlitePool, auth_service: AuthService, config: &Config) -> Self {
        Self {
            auth_service: Arc::new(auth_service),
            payment_method_service: Arc::new(PaymentMethodService::new(db_pool.clone())),
            wallet_service: Arc::new(WalletService::new(
                db_pool.clone(),
                config.exchange_rates.clone(),
            )),
            investment_service: Arc::new(InvestmentService::new(db_pool.clone())),
            property_service: Arc::new(PropertyService::new(db_pool.clone())),
            kyc_service: Arc::new(KycService::new(db_pool.clone())),
            client_config: Arc::new(ClientConfig::from_config(config)),
            db_pool,
        }
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.auth_service.clone()
    }
}

impl FromRef<AppState> for Arc<PaymentMethodService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.payment_method_service.clone()
    }
}

impl FromRef<AppState> for Arc<WalletService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.wallet_service.clone()
    }
}

impl FromRef<AppState> for Arc<InvestmentService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.investment_service.clone()
    }
}

impl FromRef<AppState> for Arc<PropertyService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.property_service.clone()
    }
}

impl FromRef<AppState> for Arc<KycService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.kyc_service.clone()
    }
}

impl FromRef<AppState> for Arc<ClientConfig> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.client_config.clone()
    }
}
