//! Barber self-service endpoints, authenticated by `X-Access-Key`.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;

use crate::auth;
use crate::booking::APPOINTMENT_DETAIL_SELECT;
use crate::models::*;
use crate::schedule::shop_today;
use crate::AppState;

type Rejection = (StatusCode, Json<ApiResponse<()>>);

fn internal(context: &str, e: sqlx::Error) -> Rejection {
    tracing::error!("{}: {}", context, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::error("Error interno")),
    )
}

/// GET /api/barber/me — the authenticated barber's own profile.
pub async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Barber>>, Rejection> {
    let barber = auth::require_barber(&headers, &state.db).await?;
    Ok(Json(ApiResponse::success(barber)))
}

/// GET /api/barber/appointments?date=YYYY-MM-DD — own appointments for a day
/// (today when the date is omitted).
pub async fn my_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BarberDayQuery>,
) -> Result<Json<ApiResponse<Vec<AppointmentDetail>>>, Rejection> {
    let barber = auth::require_barber(&headers, &state.db).await?;
    let date = query.date.unwrap_or_else(shop_today);

    let sql = format!(
        "{} WHERE a.barber_id = ? AND a.date = ? AND a.cancelled = 0 ORDER BY a.time ASC",
        APPOINTMENT_DETAIL_SELECT
    );
    let appointments = sqlx::query_as::<_, AppointmentDetail>(&sql)
        .bind(barber.id)
        .bind(&date)
        .fetch_all(&state.db)
        .await
        .map_err(|e| internal("barber appointments", e))?;

    Ok(Json(ApiResponse::success(appointments)))
}

/// GET /api/barber/schedule — own weekly overrides, if any.
pub async fn my_schedule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<BarberScheduleRow>>>, Rejection> {
    let barber = auth::require_barber(&headers, &state.db).await?;

    let rows = sqlx::query_as::<_, BarberScheduleRow>(
        "SELECT id, barber_id, day_of_week, is_available,
                morning_start, morning_end, afternoon_start, afternoon_end
         FROM barber_schedules WHERE barber_id = ? ORDER BY day_of_week ASC",
    )
    .bind(barber.id)
    .fetch_all(&state.db)
    .await
    .map_err(|e| internal("barber schedule", e))?;

    Ok(Json(ApiResponse::success(rows)))
}

/// PUT /api/barber/schedule/{day_of_week} — upsert one weekday override.
pub async fn upsert_schedule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(day_of_week): Path<i64>,
    Json(body): Json<UpsertBarberScheduleRequest>,
) -> Result<Json<ApiResponse<BarberScheduleRow>>, Rejection> {
    let barber = auth::require_barber(&headers, &state.db).await?;

    if !(0..=6).contains(&day_of_week) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Día de la semana inválido")),
        ));
    }

    sqlx::query(
        "INSERT INTO barber_schedules
            (barber_id, day_of_week, is_available,
             morning_start, morning_end, afternoon_start, afternoon_end)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(barber_id, day_of_week) DO UPDATE SET
            is_available = excluded.is_available,
            morning_start = excluded.morning_start,
            morning_end = excluded.morning_end,
            afternoon_start = excluded.afternoon_start,
            afternoon_end = excluded.afternoon_end",
    )
    .bind(barber.id)
    .bind(day_of_week)
    .bind(body.is_available)
    .bind(&body.morning_start)
    .bind(&body.morning_end)
    .bind(&body.afternoon_start)
    .bind(&body.afternoon_end)
    .execute(&state.db)
    .await
    .map_err(|e| internal("barber schedule upsert", e))?;

    let row = sqlx::query_as::<_, BarberScheduleRow>(
        "SELECT id, barber_id, day_of_week, is_available,
                morning_start, morning_end, afternoon_start, afternoon_end
         FROM barber_schedules WHERE barber_id = ? AND day_of_week = ?",
    )
    .bind(barber.id)
    .bind(day_of_week)
    .fetch_one(&state.db)
    .await
    .map_err(|e| internal("barber schedule readback", e))?;

    Ok(Json(ApiResponse::success(row)))
}
