//! Per-client rate limiting
//!
//! A token bucket per client address. Auth routes get their own, tighter
//! limiter so password and code guessing is throttled separately from
//! normal traffic.

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{sync::RwLock, time::Instant};

use crate::error::ApiError;

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_update: now,
        }
    }

    /// Take one token, or report how long until one is available
    fn try_consume(&mut self, refill_per_sec: f64, capacity: f64, now: Instant) -> Result<(), Duration> {
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_per_sec).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            Err(Duration::from_secs_f64((1.0 - self.tokens) / refill_per_sec))
        }
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    scope: &'static str,
    buckets: Arc<RwLock<HashMap<String, TokenBucket>>>,
    refill_per_sec: f64,
    capacity: f64,
}

impl RateLimiter {
    /// `requests_per_second` sustained, bursts up to twice that
    pub fn new(scope: &'static str, requests_per_second: u32) -> Self {
        let rps = f64::from(requests_per_second.max(1));
        Self {
            scope,
            buckets: Arc::new(RwLock::new(HashMap::new())),
            refill_per_sec: rps,
            capacity: rps * 2.0,
        }
    }

    pub async fn check(&self, client: &str) -> Result<(), Duration> {
        let now = Instant::now();
        let mut buckets = self.buckets.write().await;
        buckets
            .entry(client.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity, now))
            .try_consume(self.refill_per_sec, self.capacity, now)
    }

    /// Drop buckets idle for longer than `max_age`
    pub async fn cleanup(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let mut buckets = self.buckets.write().await;
        let before = buckets.len();
        buckets.retain(|_, bucket| now.duration_since(bucket.last_update) < max_age);
        before - buckets.len()
    }

    /// Periodically prune idle buckets for the life of the process
    pub fn spawn_cleanup(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let removed = limiter.cleanup(every).await;
                if removed > 0 {
                    tracing::debug!(scope = limiter.scope, removed, "Pruned idle rate-limit buckets");
                }
            }
        })
    }
}

/// Middleware entry point; use with `axum::middleware::from_fn_with_state`
pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(&request);

    if let Err(retry_after) = limiter.check(&client).await {
        tracing::warn!(scope = limiter.scope, client = %client, "Rate limit exceeded");
        let mut response = ApiError::TooManyRequests.into_response();
        let secs = retry_after.as_secs().max(1).to_string();
        if let Ok(value) = HeaderValue::from_str(&secs) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        return response;
    }

    next.run(request).await
}

/// Client address from proxy headers
pub(crate) fn client_key(request: &Request) -> String {
    let headers = request.headers();
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "unknown".to_string())
}
