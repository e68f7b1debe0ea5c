//! Per-client sliding-window admission control

use super::error::ServerError;
use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_window: u32,
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_window: 100,
            window_seconds: 60,
        }
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    clients: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Record a request for `client_id` and report whether it is admitted
    pub fn is_allowed(&self, client_id: &str) -> bool {
        if !self.config.enabled {
            return true;
        }

        let now = Instant::now();
        let window = Duration::from_secs(self.config.window_seconds);
        let mut clients = self.clients.lock();

        // forget clients whose whole history has aged out
        clients.retain(|_, times| times.last().map_or(false, |t| now.duration_since(*t) < window));

        let times = clients.entry(client_id.to_string()).or_default();
        times.retain(|t| now.duration_since(*t) < window);

        if (times.len() as u32) < self.config.requests_per_window {
            times.push(now);
            true
        } else {
            false
        }
    }

    /// Requests left in the current window
    pub fn remaining(&self, client_id: &str) -> u32 {
        let now = Instant::now();
        let window = Duration::from_secs(self.config.window_seconds);
        let clients = self.clients.lock();
        let used = clients
            .get(client_id)
            .map_or(0, |times| times.iter().filter(|t| now.duration_since(**t) < window).count()) as u32;
        self.config.requests_per_window.saturating_sub(used)
    }
}

/// Client key: first `x-forwarded-for` entry, else `unknown`
pub fn client_key(request: &Request) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

/// Requests the client has left in the current window, set on admitted responses
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";

pub async fn rate_limit_layer(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let client_id = client_key(&request);

    if !limiter.is_allowed(&client_id) {
        warn!(client = %client_id, path = %request.uri().path(), "Rate limit exceeded");
        return ServerError::RateLimited.into_response();
    }

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(REMAINING_HEADER, HeaderValue::from(limiter.remaining(&client_id)));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(n: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            enabled: true,
            requests_per_window: n,
            window_seconds: 60,
        })
    }

    #[test]
    fn test_sliding_window_blocks_after_limit() {
        let limiter = limiter(2);
        assert!(limiter.is_allowed("a"));
        assert!(limiter.is_allowed("a"));
        assert!(!limiter.is_allowed("a"));
        assert_eq!(limiter.remaining("a"), 0);
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = limiter(1);
        assert!(limiter.is_allowed("a"));
        assert!(limiter.is_allowed("b"));
        assert!(!limiter.is_allowed("a"));
        assert_eq!(limiter.remaining("b"), 0);
        assert_eq!(limiter.remaining("c"), 1);
    }

    #[test]
    fn test_disabled_limiter_admits_everything() {
        let limiter = RateLimiter::new(RateLimitConfig {
            enabled: false,
            requests_per_window: 0,
            window_seconds: 60,
        });
        assert!(limiter.is_allowed("a"));
    }

    #[test]
    fn test_client_key() {
        let request = Request::builder()
            .header("x-forwarded-for", "10.0.0.1, 10.0.0.2")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(client_key(&request), "10.0.0.1");

        let anonymous = Request::builder().body(axum::body::Body::empty()).unwrap();
        assert_eq!(client_key(&anonymous), "unknown");
    }
}
