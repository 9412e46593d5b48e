use axum::{
    http::{header, HeaderMap, StatusCode},
    Json,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use sqlx::SqlitePool;

use crate::models::{ApiResponse, Barber};

type HmacSha256 = Hmac<Sha256>;

type AuthRejection = (StatusCode, Json<ApiResponse<()>>);

fn unauthorized(msg: &str) -> AuthRejection {
    (StatusCode::UNAUTHORIZED, Json(ApiResponse::error(msg)))
}

/// Constant-time comparison of the presented admin token against the
/// configured one. Both sides go through HMAC so length differences don't
/// leak through an early-exit byte compare.
pub fn token_matches(provided: &str, expected: &str) -> bool {
    let mut lhs = HmacSha256::new_from_slice(b"admin-token").expect("HMAC can take key of any size");
    lhs.update(provided.as_bytes());
    let digest = lhs.finalize().into_bytes();

    let mut rhs = HmacSha256::new_from_slice(b"admin-token").expect("HMAC can take key of any size");
    rhs.update(expected.as_bytes());
    rhs.verify_slice(&digest).is_ok()
}

/// Generate an access key for a new barber: 32 hex chars derived from the
/// current time. Uniqueness is enforced by the index on `barbers.access_key`.
pub fn generate_access_key() -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let mut mac =
        HmacSha256::new_from_slice(b"barber-access-key").expect("HMAC can take key of any size");
    mac.update(&nanos.to_le_bytes());
    hex::encode(&mac.finalize().into_bytes()[..16])
}

/// Admin guard: requires `Authorization: Bearer <ADMIN_TOKEN>`.
pub fn require_admin(headers: &HeaderMap, admin_token: &str) -> Result<(), AuthRejection> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| unauthorized("No autorizado"))?;

    if !token_matches(token, admin_token) {
        tracing::warn!("admin token mismatch");
        return Err(unauthorized("No autorizado"));
    }
    Ok(())
}

/// Barber guard: resolves the `X-Access-Key` header to an active barber.
pub async fn require_barber(
    headers: &HeaderMap,
    pool: &SqlitePool,
) -> Result<Barber, AuthRejection> {
    let key = headers
        .get("x-access-key")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| unauthorized("No autorizado"))?;

    sqlx::query_as::<_, Barber>(
        "SELECT id, name, phone, access_key, is_active FROM barbers
         WHERE access_key = ? AND is_active = 1",
    )
    .bind(key)
    .fetch_optional(pool)
    .await
    .map_err(|e| {
        tracing::error!("barber lookup failed: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error("Error interno")),
        )
    })?
    .ok_or_else(|| unauthorized("Clave de acceso inválida"))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_matches_exact() {
        assert!(token_matches("s3cret", "s3cret"));
        assert!(!token_matches("s3cret", "other"));
        assert!(!token_matches("", "s3cret"));
        assert!(!token_matches("s3cret-longer", "s3cret"));
    }

    #[test]
    fn test_access_keys_are_hex_and_distinct() {
        let a = generate_access_key();
        let b = generate_access_key();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_require_admin_header_shapes() {
        let mut headers = HeaderMap::new();
        assert!(require_admin(&headers, "tok").is_err());

        headers.insert(header::AUTHORIZATION, "tok".parse().unwrap());
        assert!(require_admin(&headers, "tok").is_err()); // missing Bearer prefix

        headers.insert(header::AUTHORIZATION, "Bearer wrong".parse().unwrap());
        assert!(require_admin(&headers, "tok").is_err());

        headers.insert(header::AUTHORIZATION, "Bearer tok".parse().unwrap());
        assert!(require_admin(&headers, "tok").is_ok());
    }

    #[tokio::test]
    async fn test_require_barber_resolves_active_key() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::run_migrations(&pool).await.unwrap();
        sqlx::query(
            "INSERT INTO barbers (name, phone, access_key, is_active)
             VALUES ('Luis', '555', 'key-luis', 1), ('Ana', '556', 'key-ana', 0)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("x-access-key", "key-luis".parse().unwrap());
        let barber = require_barber(&headers, &pool).await.unwrap();
        assert_eq!(barber.name, "Luis");

        // Deactivated barbers can't log in
        headers.insert("x-access-key", "key-ana".parse().unwrap());
        assert!(require_barber(&headers, &pool).await.is_err());

        headers.remove("x-access-key");
        assert!(require_barber(&headers, &pool).await.is_err());
    }
}
