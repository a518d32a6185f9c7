//! API middleware.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderName, HeaderValue, Method, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::metrics;

/// Header carrying the per-request id (set and propagated by tower-http).
pub const X_REQUEST_ID: &str = "x-request-id";

/// Tracked callers before idle limiter state is swept.
const MAX_TRACKED_CALLERS: usize = 10_000;

/// Per-IP burst limiter in front of every `/api` route.
pub struct BurstLimiter {
    limiter: DefaultKeyedRateLimiter<IpAddr>,
}

impl BurstLimiter {
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::keyed(Quota::per_second(rps)),
        }
    }

    pub fn check(&self, ip: IpAddr) -> bool {
        if self.limiter.len() >= MAX_TRACKED_CALLERS {
            self.limiter.retain_recent();
        }
        self.limiter.check_key(&ip).is_ok()
    }
}

/// CORS for the configured frontend origins.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN])
        .expose_headers([header::CONTENT_DISPOSITION, header::RETRY_AFTER])
        .allow_credentials(true)
        .max_age(Duration::from_secs(600))
}

const SECURITY_HEADERS: [(&str, &str); 4] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    ("x-permitted-cross-domain-policies", "none"),
];

pub async fn security_headers(request: Request<Body>, next: Next) -> Response<Body> {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    for (name, value) in SECURITY_HEADERS {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
    response
}

/// One log line per handled request. Liveness and scrape traffic is skipped.
pub async fn request_logging(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_owned();
    let start = Instant::now();

    let response = next.run(request).await;

    if !matches!(path.as_str(), "/" | "/health" | "/metrics") {
        info!(
            %method,
            %path,
            status = response.status().as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            request_id,
            "request handled"
        );
    }
    response
}

/// Per-IP burst limiting, independent of the hourly admission budgets.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<BurstLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let ip = client_ip(&request);

    if !limiter.check(ip) {
        warn!(%ip, path = request.uri().path(), "burst limit exceeded");
        metrics::record_rate_limit_hit(request.uri().path());
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, "1")],
            "Too many requests. Please slow down.",
        )
            .into_response();
    }

    next.run(request).await
}

/// Caller identity: first `X-Forwarded-For` hop, then `X-Real-IP`, then the
/// socket peer. Requests with none of these share the unspecified address.
pub fn client_ip<B>(request: &Request<B>) -> IpAddr {
    let header_ip = |name: &str, first_hop: bool| -> Option<IpAddr> {
        let value = request.headers().get(name)?.to_str().ok()?;
        let value = if first_hop { value.split(',').next()? } else { value };
        value.trim().parse().ok()
    };

    header_ip("x-forwarded-for", true)
        .or_else(|| header_ip("x-real-ip", false))
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ip_precedence() {
        let request = Request::builder()
            .header("X-Forwarded-For", "203.0.113.7, 10.0.0.1")
            .header("X-Real-IP", "198.51.100.2")
            .body(())
            .unwrap();
        assert_eq!(client_ip(&request), "203.0.113.7".parse::<IpAddr>().unwrap());

        let request = Request::builder()
            .header("X-Real-IP", "198.51.100.2")
            .body(())
            .unwrap();
        assert_eq!(client_ip(&request), "198.51.100.2".parse::<IpAddr>().unwrap());

        let mut request = Request::builder().body(()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo("192.0.2.4:5000".parse::<SocketAddr>().unwrap()));
        assert_eq!(client_ip(&request), "192.0.2.4".parse::<IpAddr>().unwrap());

        let request = Request::builder().header("X-Forwarded-For", "garbage").body(()).unwrap();
        assert_eq!(client_ip(&request), IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }

    #[test]
    fn test_burst_limiter_is_per_ip() {
        let limiter = BurstLimiter::new(1);
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(limiter.check(a));
        assert!(!limiter.check(a));
        assert!(limiter.check(b));
    }
}
