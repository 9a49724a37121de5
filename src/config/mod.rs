//! Configuration management for the PropToken portal
//!
//! This module handles loading and validating configuration from environment variables,
//! with support for different environments (development, staging, production).

use std::env;
use thiserror::Error;

use crate::workflow::exchange::{ExchangeRates, DEFAULT_RATES};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment value: {0}")]
    InvalidValue(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),
}

/// Application environment
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Parse environment from string
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid environment: '{}'. Expected: dev, staging, or prod",
                s
            ))),
        }
    }

    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Get the environment name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

/// Which identity provider backs `/api/auth/login`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    Password,
    /// Every login resolves to the fixed demo identity
    Demo,
}

impl AuthMode {
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().as_str() {
            "password" => Ok(AuthMode::Password),
            "demo" => Ok(AuthMode::Demo),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid auth mode: '{}'. Expected: password or demo",
                s
            ))),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Current environment
    pub environment: Environment,

    /// Server port
    pub port: u16,

    /// Maximum database connections
    pub db_max_connections: u32,

    /// Rate limit: requests per second per IP
    pub rate_limit_rps: u32,

    /// CORS allowed origins
    pub cors_allowed_origins: Option<String>,

    /// Log level (RUST_LOG)
    pub log_level: String,

    /// Session lifetime in hours (default: 24)
    pub session_ttl_hours: i64,

    /// bcrypt work factor for stored passwords
    pub bcrypt_cost: u32,

    pub auth_mode: AuthMode,

    /// Fixed OTP accepted by the demo verifier. Never set in production.
    pub demo_otp_code: Option<String>,

    /// Codes accepted by `/api/auth/verify-2fa`
    pub demo_two_factor_codes: Vec<String>,

    /// Canonical exchange-rate table (PKR per unit)
    pub exchange_rates: ExchangeRates,

    /// Base URL the portal client talks to
    pub api_url: String,

    /// OAuth client id surfaced to the frontend
    pub google_client_id: Option<String>,

    /// Accounts registered with these emails get the admin role
    pub admin_emails: Vec<String>,

    /// Insert the sample property catalog into an empty store
    pub seed_demo_catalog: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .map(|s| Environment::from_str(&s))
            .unwrap_or(Ok(Environment::Development))?;

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://proptoken.db?mode=rwc".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3001".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort("PORT must be a valid number".to_string()))?;

        let db_max_connections = env::var("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()
            .unwrap_or(5);

        let rate_limit_rps = env::var("RATE_LIMIT_RPS")
            .unwrap_or_else(|_| "100".to_string())
            .parse::<u32>()
            .unwrap_or(100);

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS").ok();

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let session_ttl_hours = env::var("SESSION_TTL_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .parse::<i64>()
            .unwrap_or(24);

        let bcrypt_cost = env::var("BCRYPT_COST")
            .unwrap_or_else(|_| bcrypt::DEFAULT_COST.to_string())
            .parse::<u32>()
            .unwrap_or(bcrypt::DEFAULT_COST);

        let auth_mode = env::var("AUTH_MODE")
            .map(|s| AuthMode::from_str(&s))
            .unwrap_or(Ok(AuthMode::Password))?;

        if auth_mode == AuthMode::Demo && environment.is_production() {
            return Err(ConfigError::InvalidValue(
                "AUTH_MODE=demo is not allowed in production".to_string(),
            ));
        }

        let demo_otp_code = match env::var("DEMO_OTP_CODE") {
            Ok(_) if environment.is_production() => {
                tracing::warn!("Ignoring DEMO_OTP_CODE in production");
                None
            }
            Ok(code) => Some(code),
            Err(_) if environment.is_production() => None,
            Err(_) => Some(crate::workflow::otp::DEMO_OTP_CODE.to_string()),
        };

        let demo_two_factor_codes = match env::var("DEMO_2FA_CODES") {
            Ok(codes) => split_list(&codes),
            Err(_) if environment.is_production() => Vec::new(),
            Err(_) => vec!["123456".to_string(), "000000".to_string()],
        };

        let exchange_rates = ExchangeRates::parse(
            &env::var("EXCHANGE_RATES").unwrap_or_else(|_| DEFAULT_RATES.to_string()),
        )
        .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let api_url = env::var("NEXT_PUBLIC_API_URL")
            .unwrap_or_else(|_| "http://localhost:3001".to_string());

        let google_client_id = env::var("NEXT_PUBLIC_GOOGLE_CLIENT_ID").ok();

        let admin_emails = env::var("ADMIN_EMAILS")
            .map(|s| split_list(&s.to_lowercase()))
            .unwrap_or_default();

        let seed_demo_catalog = env::var("SEED_DEMO_CATALOG")
            .map(|s| matches!(s.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(!environment.is_production());

        Ok(Config {
            database_url,
            environment,
            port,
            db_max_connections,
            rate_limit_rps,
            cors_allowed_origins,
            log_level,
            session_ttl_hours,
            bcrypt_cost,
            auth_mode,
            demo_otp_code,
            demo_two_factor_codes,
            exchange_rates,
            api_url,
            google_client_id,
            admin_emails,
            seed_demo_catalog,
        })
    }

    /// Configuration used by tests and local tooling: in-memory store, demo codes on
    pub fn for_testing() -> Self {
        Config {
            database_url: "sqlite::memory:".to_string(),
            environment: Environment::Development,
            port: 3001,
            db_max_connections: 1,
            rate_limit_rps: 1000,
            cors_allowed_origins: None,
            log_level: "debug".to_string(),
            session_ttl_hours: 24,
            bcrypt_cost: 4,
            auth_mode: AuthMode::Password,
            demo_otp_code: Some(crate::workflow::otp::DEMO_OTP_CODE.to_string()),
            demo_two_factor_codes: vec!["123456".to_string()],
            exchange_rates: ExchangeRates::default(),
            api_url: "http://localhost:3001".to_string(),
            google_client_id: None,
            admin_emails: vec!["admin@proptoken.local".to_string()],
            seed_demo_catalog: false,
        }
    }

    /// Get database URL (useful for logging masked version)
    pub fn database_url_masked(&self) -> String {
        // Mask password in database URL for logging
        if let Some(at_pos) = self.database_url.find('@') {
            if let Some(colon_pos) = self.database_url[..at_pos].rfind(':') {
                let prefix = &self.database_url[..colon_pos + 1];
                let suffix = &self.database_url[at_pos..];
                return format!("{}****{}", prefix, suffix);
            }
        }
        self.database_url.clone()
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect()
}
