use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::ApiError;

/// RateLimiter
///
/// Fixed-window, per-IP request counter for the anonymous write endpoints.
pub struct RateLimiter {
    /// IP -> (window start, requests in window)
    requests: DashMap<IpAddr, (Instant, u32)>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            requests: DashMap::new(),
            max_requests,
            window,
        }
    }

    /// Counts a request from `ip`. `Err` carries the time left until the window resets.
    pub fn check(&self, ip: IpAddr) -> Result<(), Duration> {
        let now = Instant::now();

        let mut entry = self.requests.entry(ip).or_insert((now, 0));
        let (window_start, count) = entry.value_mut();

        if now.duration_since(*window_start) >= self.window {
            *window_start = now;
            *count = 1;
            return Ok(());
        }

        if *count >= self.max_requests {
            return Err(self.window - now.duration_since(*window_start));
        }

        *count += 1;
        Ok(())
    }

    /// Drops entries whose window ended long ago. Called periodically from `main`.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.requests
            .retain(|_, (window_start, _)| now.duration_since(*window_start) < self.window * 2);
    }

    pub fn tracked_clients(&self) -> usize {
        self.requests.len()
    }
}

/// client_ip
///
/// First `x-forwarded-for` hop when behind a proxy, else the socket peer (present when
/// served with `into_make_service_with_connect_info`). Requests with neither share the
/// unspecified address bucket.
pub fn client_ip(request: &Request) -> IpAddr {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok());

    forwarded
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// rate_limit
///
/// Middleware applied with `route_layer` to the submission routes. Over budget the
/// request is answered with 429 before reaching the handler.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let ip = client_ip(&request);

    if let Err(wait) = limiter.check(ip) {
        let retry_after = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
        tracing::warn!(%ip, retry_after, "rate limit exceeded");
        return Err(ApiError::TooManyRequests(retry_after.max(1)));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(127, 0, 0, last))
    }

    #[test]
    fn allows_under_limit() {
        let limiter = RateLimiter::new(3, Duration::from_secs(1));

        assert!(limiter.check(ip(1)).is_ok());
        assert!(limiter.check(ip(1)).is_ok());
        assert!(limiter.check(ip(1)).is_ok());
    }

    #[test]
    fn blocks_over_limit() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));

        assert!(limiter.check(ip(1)).is_ok());
        assert!(limiter.check(ip(1)).is_ok());
        let wait = limiter.check(ip(1)).unwrap_err();
        assert!(wait <= Duration::from_secs(60));
    }

    #[test]
    fn clients_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));

        assert!(limiter.check(ip(1)).is_ok());
        assert!(limiter.check(ip(2)).is_ok());
        assert!(limiter.check(ip(1)).is_err());
        assert!(limiter.check(ip(2)).is_err());
    }

    #[test]
    fn window_resets() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));

        assert!(limiter.check(ip(1)).is_ok());
        assert!(limiter.check(ip(1)).is_err());
        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.check(ip(1)).is_ok());
    }

    #[test]
    fn cleanup_drops_stale_entries() {
        let limiter = RateLimiter::new(5, Duration::from_millis(10));
        limiter.check(ip(1)).unwrap();
        assert_eq!(limiter.tracked_clients(), 1);

        std::thread::sleep(Duration::from_millis(30));
        limiter.cleanup();
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn client_ip_prefers_forwarded_header() {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&request), "203.0.113.7".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn client_ip_falls_back_to_peer_then_unspecified() {
        let mut request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_ip(&request), IpAddr::V4(Ipv4Addr::UNSPECIFIED));

        let peer: SocketAddr = "198.51.100.4:51234".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(peer));
        assert_eq!(client_ip(&request), peer.ip());
    }
}
