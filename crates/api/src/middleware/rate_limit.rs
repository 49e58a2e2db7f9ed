//! Rate limiting middleware (spec SPEC_FULL.md §9: buckets are keyed off the
//! full API key — or the full session cookie, for session-authenticated
//! traffic — never a prefix, so two different keys can never collide into
//! the same bucket). Same sliding-window shape as the teacher's
//! `RateLimiterState`, just keyed differently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::sync::Mutex;
use tower::{Layer, Service};

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { max_requests: 100, window: Duration::from_secs(60) }
    }
}

#[derive(Clone, Default)]
struct RateLimiterState {
    requests: HashMap<String, Vec<Instant>>,
}

impl RateLimiterState {
    fn check_rate_limit(&mut self, bucket: &str, config: &RateLimitConfig) -> bool {
        let now = Instant::now();
        let cutoff = now - config.window;

        let requests = self.requests.entry(bucket.to_string()).or_default();
        requests.retain(|&time| time > cutoff);

        if requests.len() < config.max_requests {
            requests.push(now);
            true
        } else {
            false
        }
    }
}

/// Caller-identifying key for a request: the full `Authorization` header
/// value if present, else the full session cookie, else `"anonymous"` (a
/// single shared bucket, since unauthenticated requests are rejected
/// downstream anyway).
fn bucket_key(req: &Request) -> String {
    if let Some(auth) = req.headers().get(header::AUTHORIZATION) {
        if let Ok(value) = auth.to_str() {
            return format!("auth:{value}");
        }
    }
    if let Some(cookie) = req.headers().get(header::COOKIE) {
        if let Ok(value) = cookie.to_str() {
            return format!("cookie:{value}");
        }
    }
    "anonymous".to_string()
}

#[derive(Clone)]
pub struct RateLimitLayer {
    state: Arc<Mutex<RateLimiterState>>,
    config: RateLimitConfig,
}

impl RateLimitLayer {
    pub fn new(config: RateLimitConfig) -> Self {
        Self { state: Arc::new(Mutex::new(RateLimiterState::default())), config }
    }
}

impl Default for RateLimitLayer {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService { inner, state: self.state.clone(), config: self.config.clone() }
    }
}

#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    state: Arc<Mutex<RateLimiterState>>,
    config: RateLimitConfig,
}

impl<S> Service<Request> for RateLimitService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let mut inner = self.inner.clone();
        let state = self.state.clone();
        let config = self.config.clone();
        let bucket = bucket_key(&req);

        Box::pin(async move {
            let allowed = {
                let mut state = state.lock().await;
                state.check_rate_limit(&bucket, &config)
            };

            if !allowed {
                return Ok((StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded, try again later").into_response());
            }

            inner.call(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_buckets_do_not_share_a_budget() {
        let config = RateLimitConfig { max_requests: 1, window: Duration::from_secs(60) };
        let mut state = RateLimiterState::default();
        assert!(state.check_rate_limit("auth:a", &config));
        assert!(state.check_rate_limit("auth:b", &config));
        assert!(!state.check_rate_limit("auth:a", &config));
    }
}
