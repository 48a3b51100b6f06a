//! Per-client, per-route request throttling.
//!
//! Fixed window counters: the first hit in a window creates the counter with
//! an expiry of one window, later hits increment it, anything above the
//! budget is rejected until the counter expires.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};
use redis::aio::ConnectionManager;
use tracing::warn;

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub times: u64,
    pub per: Duration,
}

impl RateLimit {
    pub const ONE_PER_SECOND: RateLimit = RateLimit {
        times: 1,
        per: Duration::from_secs(1),
    };
    pub const TWO_PER_FIVE_SECONDS: RateLimit = RateLimit {
        times: 2,
        per: Duration::from_secs(5),
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Limited { retry_after: Duration },
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn hit(&self, key: &str, limit: RateLimit) -> anyhow::Result<Decision>;
}

#[derive(Clone)]
pub struct RedisRateLimiter {
    conn: ConnectionManager,
}

impl RedisRateLimiter {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn hit(&self, key: &str, limit: RateLimit) -> anyhow::Result<Decision> {
        let mut conn = self.conn.clone();
        let window_ms = limit.per.as_millis() as i64;
        let (count, mut ttl_ms): (u64, i64) = redis::pipe()
            .atomic()
            .cmd("INCR")
            .arg(key)
            .cmd("PTTL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .context("redis INCR/PTTL")?;

        // -1: counter has no expiry yet (first hit of the window)
        if ttl_ms < 0 {
            redis::cmd("PEXPIRE")
                .arg(key)
                .arg(window_ms)
                .query_async::<_, ()>(&mut conn)
                .await
                .context("redis PEXPIRE")?;
            ttl_ms = window_ms;
        }

        if count > limit.times {
            Ok(Decision::Limited {
                retry_after: Duration::from_millis(ttl_ms as u64),
            })
        } else {
            Ok(Decision::Allowed)
        }
    }
}

/// In-process counterpart of [`RedisRateLimiter`] for tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryRateLimiter {
    windows: std::sync::Mutex<std::collections::HashMap<String, (std::time::Instant, u64)>>,
}

#[cfg(test)]
#[async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn hit(&self, key: &str, limit: RateLimit) -> anyhow::Result<Decision> {
        let mut windows = self
            .windows
            .lock()
            .map_err(|_| anyhow::anyhow!("rate limiter poisoned"))?;
        let now = std::time::Instant::now();
        let entry = windows.entry(key.to_string()).or_insert((now, 0));
        if now.duration_since(entry.0) >= limit.per {
            *entry = (now, 0);
        }
        entry.1 += 1;

        if entry.1 > limit.times {
            let retry_after = limit.per.saturating_sub(now.duration_since(entry.0));
            Ok(Decision::Limited { retry_after })
        } else {
            Ok(Decision::Allowed)
        }
    }
}

#[derive(Clone)]
pub struct Throttle {
    limiter: Arc<dyn RateLimiter>,
    scope: &'static str,
    limit: RateLimit,
    trust_forwarded_for: bool,
}

/// Wraps a route with a rate limit shared by all its methods.
pub fn limited(
    route: MethodRouter<AppState>,
    state: &AppState,
    scope: &'static str,
    limit: RateLimit,
) -> MethodRouter<AppState> {
    let throttle = Throttle {
        limiter: state.limiter.clone(),
        scope,
        limit,
        trust_forwarded_for: state.config.trust_forwarded_for,
    };
    route.route_layer(middleware::from_fn_with_state(throttle, throttle_request))
}

async fn throttle_request(
    State(throttle): State<Throttle>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = format!(
        "rate:{}:{}",
        throttle.scope,
        client_ip(&req, throttle.trust_forwarded_for)
    );
    match throttle.limiter.hit(&key, throttle.limit).await {
        Ok(Decision::Allowed) => Ok(next.run(req).await),
        Ok(Decision::Limited { retry_after }) => {
            warn!(%key, "rate limit exceeded");
            Err(ApiError::TooManyRequests {
                retry_after_secs: retry_after.as_secs_f64().ceil().max(1.0) as u64,
            })
        }
        Err(e) => {
            // limiter backend down: let the request through
            warn!(error = %e, "rate limiter unavailable");
            Ok(next.run(req).await)
        }
    }
}

/// Peer address, or the first `X-Forwarded-For` hop when the proxy is trusted.
fn client_ip(req: &Request, trust_forwarded_for: bool) -> String {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .filter(|_| trust_forwarded_for)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[tokio::test]
    async fn memory_limiter_allows_budget_then_limits() {
        let limiter = MemoryRateLimiter::default();
        let limit = RateLimit::TWO_PER_FIVE_SECONDS;
        assert_eq!(limiter.hit("k", limit).await.unwrap(), Decision::Allowed);
        assert_eq!(limiter.hit("k", limit).await.unwrap(), Decision::Allowed);
        match limiter.hit("k", limit).await.unwrap() {
            Decision::Limited { retry_after } => assert!(retry_after <= limit.per),
            Decision::Allowed => panic!("third hit should be limited"),
        }
        // other keys have their own window
        assert_eq!(limiter.hit("other", limit).await.unwrap(), Decision::Allowed);
    }

    #[tokio::test]
    async fn memory_limiter_resets_after_window() {
        let limiter = MemoryRateLimiter::default();
        let limit = RateLimit {
            times: 1,
            per: Duration::from_millis(20),
        };
        assert_eq!(limiter.hit("k", limit).await.unwrap(), Decision::Allowed);
        assert!(matches!(
            limiter.hit("k", limit).await.unwrap(),
            Decision::Limited { .. }
        ));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(limiter.hit("k", limit).await.unwrap(), Decision::Allowed);
    }

    fn forwarded(peer: Option<&str>) -> Request {
        let mut req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        if let Some(peer) = peer {
            let addr: SocketAddr = peer.parse().unwrap();
            req.extensions_mut().insert(ConnectInfo(addr));
        }
        req
    }

    #[test]
    fn client_ip_uses_forwarded_header_behind_trusted_proxy() {
        assert_eq!(client_ip(&forwarded(Some("10.0.0.1:4000")), true), "203.0.113.7");

        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_ip(&req, true), "unknown");
    }

    #[test]
    fn client_ip_ignores_forwarded_header_by_default() {
        assert_eq!(client_ip(&forwarded(Some("198.51.100.4:5000")), false), "198.51.100.4");
        assert_eq!(client_ip(&forwarded(None), false), "unknown");
    }

    #[tokio::test]
    async fn spoofed_forwarded_header_does_not_reset_budget() {
        use axum::{http::StatusCode, routing::get, Router};
        use tower::ServiceExt;

        let state = AppState::fake();
        let app = Router::new()
            .route("/", limited(get(|| async { "ok" }), &state, "t", RateLimit::ONE_PER_SECOND))
            .with_state(state);
        let from = |hop: &str| {
            Request::builder()
                .uri("/")
                .header("x-forwarded-for", hop)
                .body(Body::empty())
                .unwrap()
        };

        let first = app.clone().oneshot(from("203.0.113.1")).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let second = app.oneshot(from("203.0.113.2")).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
