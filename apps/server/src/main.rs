mod auth;
mod availability;
mod booking;
mod db;
mod error;
mod handlers;
mod models;
mod notify;
mod rate_limit;
mod schedule;
mod whatsapp_layer;

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use sqlx::sqlite::SqlitePoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use notify::WhatsAppNotifier;
use rate_limit::{
    rate_limit_admin, rate_limit_barber, rate_limit_booking, rate_limit_public, RateLimiter,
};

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub admin_token: String,
    pub notifier: WhatsAppNotifier,
    pub started_at: Instant,
}

/// Rate limit cleanup interval (seconds).
const RATE_LIMIT_CLEANUP_SECS: u64 = 300;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // ── Required env vars (read before tracing so WhatsAppLayer can use them) ──
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:barberia.db?mode=rwc".into());
    let admin_token = std::env::var("ADMIN_TOKEN").expect("ADMIN_TOKEN must be set");

    let gateway_url = std::env::var("WHATSAPP_GATEWAY_URL").ok().filter(|s| !s.is_empty());
    let admin_phone = std::env::var("ADMIN_PHONE").ok().filter(|s| !s.is_empty());

    // ── Tracing: console + optional WhatsApp error notifications ──
    let env_filter = EnvFilter::from_default_env().add_directive("info".parse()?);
    let fmt_layer = tracing_subscriber::fmt::layer();
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    match (&gateway_url, &admin_phone) {
        (Some(url), Some(phone)) => {
            let wa_layer = whatsapp_layer::WhatsAppLayer::new(url.clone(), phone.clone());
            registry.with(wa_layer).init();
        }
        _ => registry.init(),
    }

    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".into());
    let webapp_url = std::env::var("WEBAPP_URL").unwrap_or_else(|_| "https://example.com".into());

    if gateway_url.is_none() {
        tracing::warn!("WHATSAPP_GATEWAY_URL not set — notifications disabled");
    }

    // ── Database ──
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    db::run_migrations(&pool).await?;

    let state = Arc::new(AppState {
        db: pool,
        admin_token,
        notifier: WhatsAppNotifier::new(gateway_url, admin_phone),
        started_at: Instant::now(),
    });

    // ── Rate limiter + periodic cleanup of idle IPs ──
    let rate_limiter = RateLimiter::new();
    let cleanup_limiter = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(RATE_LIMIT_CLEANUP_SECS));
        loop {
            interval.tick().await;
            cleanup_limiter.cleanup();
        }
    });

    // ── CORS: whitelist WEBAPP_URL when configured, otherwise allow any ──
    let cors = if webapp_url != "https://example.com" {
        let origins: Vec<axum::http::HeaderValue> = vec![
            webapp_url.parse().expect("WEBAPP_URL must be a valid URL"),
            "http://localhost:5173".parse().unwrap(), // Vite dev server
        ];
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // ── Router (5 groups with per-group rate limits) ──

    // 1. No-limit: health checks
    let no_limit_routes = Router::new().route("/api/health", get(handlers::health::health));

    // 2. Public: read-only endpoints (no auth, 60 req/min)
    let public_routes = Router::new()
        .route("/api/services", get(handlers::client::list_services))
        .route("/api/barbers", get(handlers::client::list_barbers))
        .route("/api/availability", get(handlers::client::day_availability))
        .route("/api/calendar", get(handlers::client::calendar))
        .layer(from_fn_with_state(rate_limiter.clone(), rate_limit_public));

    // 3. Booking creation/cancellation: strictest limit (5 req/5min)
    let booking_routes = Router::new()
        .route(
            "/api/appointments",
            post(handlers::client::create_appointment),
        )
        .route(
            "/api/appointments/{id}/cancel",
            post(handlers::client::cancel_appointment),
        )
        .layer(from_fn_with_state(rate_limiter.clone(), rate_limit_booking));

    // 4. Barber portal (30 req/min)
    let barber_routes = Router::new()
        .route("/api/barber/me", get(handlers::barber::me))
        .route(
            "/api/barber/appointments",
            get(handlers::barber::my_appointments),
        )
        .route("/api/barber/schedule", get(handlers::barber::my_schedule))
        .route(
            "/api/barber/schedule/{day_of_week}",
            put(handlers::barber::upsert_schedule),
        )
        .layer(from_fn_with_state(rate_limiter.clone(), rate_limit_barber));

    // 5. Admin: all admin endpoints (120 req/min)
    let admin_routes = Router::new()
        .route("/api/admin/services", get(handlers::admin::list_services))
        .route("/api/admin/services", post(handlers::admin::create_service))
        .route(
            "/api/admin/services/{id}",
            put(handlers::admin::update_service),
        )
        .route(
            "/api/admin/services/{id}",
            delete(handlers::admin::delete_service),
        )
        .route("/api/admin/barbers", get(handlers::admin::list_barbers))
        .route("/api/admin/barbers", post(handlers::admin::create_barber))
        .route(
            "/api/admin/barbers/{id}",
            put(handlers::admin::update_barber),
        )
        .route(
            "/api/admin/barbers/{id}",
            delete(handlers::admin::delete_barber),
        )
        .route(
            "/api/admin/business-hours",
            get(handlers::admin::list_business_hours),
        )
        .route(
            "/api/admin/business-hours/{day_of_week}",
            put(handlers::admin::upsert_business_hours),
        )
        .route(
            "/api/admin/barber-schedules",
            get(handlers::admin::list_barber_schedules),
        )
        .route(
            "/api/admin/barber-schedules/{barber_id}/{day_of_week}",
            put(handlers::admin::upsert_barber_schedule),
        )
        .route("/api/admin/holidays", get(handlers::admin::list_holidays))
        .route("/api/admin/holidays", post(handlers::admin::create_holiday))
        .route(
            "/api/admin/holidays/{id}",
            delete(handlers::admin::delete_holiday),
        )
        .route(
            "/api/admin/blocked-times",
            get(handlers::admin::list_blocked_times),
        )
        .route(
            "/api/admin/blocked-times",
            post(handlers::admin::create_blocked_time),
        )
        .route(
            "/api/admin/blocked-times/{id}",
            delete(handlers::admin::delete_blocked_time),
        )
        .route("/api/admin/settings", get(handlers::admin::get_settings))
        .route("/api/admin/settings", put(handlers::admin::update_settings))
        .route(
            "/api/admin/appointments",
            get(handlers::admin::list_appointments),
        )
        .route(
            "/api/admin/appointments/{id}/cancel",
            post(handlers::admin::cancel_appointment),
        )
        .route("/api/admin/statistics", get(handlers::admin::statistics))
        .layer(from_fn_with_state(rate_limiter.clone(), rate_limit_admin));

    let app = Router::new()
        .merge(no_limit_routes)
        .merge(public_routes)
        .merge(booking_routes)
        .merge(barber_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", host, port);
    tracing::info!("Barbería server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
