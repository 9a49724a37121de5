//! HTTP implementation of [`PortalApi`]

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::api::{PortalApi, WorkflowError};
use crate::error::ErrorResponse;
use crate::investment::{CreateInvestmentRequest, Investment};
use crate::models::{AuthResponse, LoginRequest, RegisterRequest};
use crate::payment_method::{
    normalize_payment_method, normalize_payment_methods, CreatePaymentMethodRequest,
    PaymentMethod, RawPaymentMethod,
};
use crate::wallet::{DepositRequest, DepositResponse, WalletBalance};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Talks to the portal API at `NEXT_PUBLIC_API_URL`
#[derive(Clone)]
pub struct HttpPortalClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpPortalClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Log in and keep the bearer token for later calls. Accounts with a
    /// second factor return a challenge instead and no token is stored.
    pub async fn login(
        &mut self,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, WorkflowError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response: AuthResponse = self
            .send(self.client.post(self.url("/api/auth/login")).json(&body))
            .await?;
        if let Some(token) = &response.token {
            self.token = Some(token.clone());
        }
        Ok(response)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, WorkflowError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = check_status(request.send().await?).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Turn a non-2xx response into the server's error message
async fn check_status(response: Response) -> Result<Response, WorkflowError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(err) => err.error.message,
        Err(_) if !body.trim().is_empty() => body,
        Err(_) => format!("Request failed with status {}", status),
    };
    tracing::debug!(status = %status, message = %message, "Backend rejected request");
    Err(WorkflowError::Backend(message))
}

/// Accept a bare array or the common `{ "data": [...] }` envelope
fn unwrap_list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => ["data", "paymentMethods", "payment_methods"]
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

#[async_trait]
impl PortalApi for HttpPortalClient {
    async fn list_payment_methods(&self) -> Result<Vec<PaymentMethod>, WorkflowError> {
        let value: Value = self
            .send(self.client.get(self.url("/api/payment-methods")))
            .await?;
        Ok(normalize_payment_methods(unwrap_list(value)))
    }

    async fn create_payment_method(
        &self,
        req: &CreatePaymentMethodRequest,
    ) -> Result<PaymentMethod, WorkflowError> {
        let raw: RawPaymentMethod = self
            .send(self.client.post(self.url("/api/payment-methods")).json(req))
            .await?;
        normalize_payment_method(raw).map_err(|e| WorkflowError::Transport(e.to_string()))
    }

    async fn wallet_balance(&self) -> Result<WalletBalance, WorkflowError> {
        self.send(self.client.get(self.url("/api/users/wallet")))
            .await
    }

    async fn deposit(&self, req: &DepositRequest) -> Result<DepositResponse, WorkflowError> {
        self.send(
            self.client
                .post(self.url("/api/wallet-transactions/deposit"))
                .json(req),
        )
        .await
    }

    async fn create_investment(
        &self,
        req: &CreateInvestmentRequest,
    ) -> Result<Investment, WorkflowError> {
        self.send(self.client.post(self.url("/api/investments")).json(req))
            .await
    }

    async fn my_investments(&self, limit: Option<i64>) -> Result<Vec<Investment>, WorkflowError> {
        let mut request = self.client.get(self.url("/api/investments/my-investments"));
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }
        self.send(request).await
    }

    async fn register(&self, req: &RegisterRequest) -> Result<AuthResponse, WorkflowError> {
        self.send(self.client.post(self.url("/api/auth/register")).json(req))
            .await
    }
}
