//! Admin panel endpoints, authenticated by `Authorization: Bearer <token>`.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;

use crate::auth;
use crate::booking::{self, APPOINTMENT_DETAIL_SELECT};
use crate::error::BookingError;
use crate::models::*;
use crate::schedule::{parse_date, parse_label, shop_today};
use crate::AppState;

type Rejection = (StatusCode, Json<ApiResponse<()>>);

fn internal(context: &str, e: sqlx::Error) -> Rejection {
    tracing::error!("{}: {}", context, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::error("Error interno")),
    )
}

fn bad_request(msg: &str) -> Rejection {
    (StatusCode::BAD_REQUEST, Json(ApiResponse::error(msg)))
}

fn not_found(msg: &str) -> Rejection {
    (StatusCode::NOT_FOUND, Json(ApiResponse::error(msg)))
}

fn booking_error(e: BookingError) -> Rejection {
    (e.status(), Json(ApiResponse::error(e.user_message())))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

// ── Services ──

/// GET /api/admin/services — every service, active or not.
pub async fn list_services(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<Service>>>, Rejection> {
    auth::require_admin(&headers, &state.admin_token)?;

    let services = sqlx::query_as::<_, Service>(
        "SELECT id, name, price, duration_min, is_active, sort_order
         FROM services ORDER BY sort_order ASC",
    )
    .fetch_all(&state.db)
    .await
    .map_err(|e| internal("admin list_services", e))?;

    Ok(Json(ApiResponse::success(services)))
}

/// POST /api/admin/services
pub async fn create_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateServiceRequest>,
) -> Result<Json<ApiResponse<Service>>, Rejection> {
    auth::require_admin(&headers, &state.admin_token)?;

    if body.name.trim().is_empty() || body.price < 0 || body.duration_min <= 0 {
        return Err(bad_request("Datos del servicio inválidos"));
    }

    let id = sqlx::query(
        "INSERT INTO services (name, price, duration_min, is_active, sort_order)
         VALUES (?, ?, ?, 1, ?)",
    )
    .bind(body.name.trim())
    .bind(body.price)
    .bind(body.duration_min)
    .bind(body.sort_order.unwrap_or(0))
    .execute(&state.db)
    .await
    .map_err(|e| internal("create_service", e))?
    .last_insert_rowid();

    let service = fetch_service(&state, id).await?;
    Ok(Json(ApiResponse::success(service)))
}

/// PUT /api/admin/services/{id} — partial update; absent fields keep their value.
pub async fn update_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<UpdateServiceRequest>,
) -> Result<Json<ApiResponse<Service>>, Rejection> {
    auth::require_admin(&headers, &state.admin_token)?;

    let updated = sqlx::query(
        "UPDATE services SET
            name = COALESCE(?, name),
            price = COALESCE(?, price),
            duration_min = COALESCE(?, duration_min),
            is_active = COALESCE(?, is_active),
            sort_order = COALESCE(?, sort_order)
         WHERE id = ?",
    )
    .bind(&body.name)
    .bind(body.price)
    .bind(body.duration_min)
    .bind(body.is_active)
    .bind(body.sort_order)
    .bind(id)
    .execute(&state.db)
    .await
    .map_err(|e| internal("update_service", e))?;

    if updated.rows_affected() == 0 {
        return Err(not_found("Servicio no encontrado"));
    }

    let service = fetch_service(&state, id).await?;
    Ok(Json(ApiResponse::success(service)))
}

/// DELETE /api/admin/services/{id} — deactivate. Appointments keep their
/// reference so history and statistics stay intact.
pub async fn delete_service(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, Rejection> {
    auth::require_admin(&headers, &state.admin_token)?;

    let updated = sqlx::query("UPDATE services SET is_active = 0 WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(|e| internal("delete_service", e))?;

    if updated.rows_affected() == 0 {
        return Err(not_found("Servicio no encontrado"));
    }
    Ok(Json(ApiResponse::success(())))
}

async fn fetch_service(state: &AppState, id: i64) -> Result<Service, Rejection> {
    sqlx::query_as::<_, Service>(
        "SELECT id, name, price, duration_min, is_active, sort_order FROM services WHERE id = ?",
    )
    .bind(id)
    .fetch_one(&state.db)
    .await
    .map_err(|e| internal("fetch_service", e))
}

// ── Barbers ──

/// GET /api/admin/barbers — full rows, access keys included.
pub async fn list_barbers(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<Barber>>>, Rejection> {
    auth::require_admin(&headers, &state.admin_token)?;

    let barbers = sqlx::query_as::<_, Barber>(
        "SELECT id, name, phone, access_key, is_active FROM barbers ORDER BY name ASC",
    )
    .fetch_all(&state.db)
    .await
    .map_err(|e| internal("admin list_barbers", e))?;

    Ok(Json(ApiResponse::success(barbers)))
}

/// POST /api/admin/barbers — an access key is generated when none is given.
pub async fn create_barber(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateBarberRequest>,
) -> Result<Json<ApiResponse<Barber>>, Rejection> {
    auth::require_admin(&headers, &state.admin_token)?;

    if body.name.trim().is_empty() {
        return Err(bad_request("El nombre es obligatorio"));
    }
    let access_key = body
        .access_key
        .filter(|k| !k.trim().is_empty())
        .unwrap_or_else(auth::generate_access_key);

    let result = sqlx::query(
        "INSERT INTO barbers (name, phone, access_key, is_active) VALUES (?, ?, ?, 1)",
    )
    .bind(body.name.trim())
    .bind(body.phone.unwrap_or_default())
    .bind(&access_key)
    .execute(&state.db)
    .await;

    let id = match result {
        Ok(r) => r.last_insert_rowid(),
        Err(e) if is_unique_violation(&e) => {
            return Err((
                StatusCode::CONFLICT,
                Json(ApiResponse::error("Esa clave de acceso ya está en uso")),
            ));
        }
        Err(e) => return Err(internal("create_barber", e)),
    };

    let barber = fetch_barber(&state, id).await?;
    Ok(Json(ApiResponse::success(barber)))
}

/// PUT /api/admin/barbers/{id}
pub async fn update_barber(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<UpdateBarberRequest>,
) -> Result<Json<ApiResponse<Barber>>, Rejection> {
    auth::require_admin(&headers, &state.admin_token)?;

    let result = sqlx::query(
        "UPDATE barbers SET
            name = COALESCE(?, name),
            phone = COALESCE(?, phone),
            access_key = COALESCE(?, access_key),
            is_active = COALESCE(?, is_active)
         WHERE id = ?",
    )
    .bind(&body.name)
    .bind(&body.phone)
    .bind(&body.access_key)
    .bind(body.is_active)
    .bind(id)
    .execute(&state.db)
    .await;

    match result {
        Ok(r) if r.rows_affected() == 0 => Err(not_found("Barbero no encontrado")),
        Ok(_) => {
            let barber = fetch_barber(&state, id).await?;
            Ok(Json(ApiResponse::success(barber)))
        }
        Err(e) if is_unique_violation(&e) => Err((
            StatusCode::CONFLICT,
            Json(ApiResponse::error("Esa clave de acceso ya está en uso")),
        )),
        Err(e) => Err(internal("update_barber", e)),
    }
}

/// DELETE /api/admin/barbers/{id} — deactivate, revoking portal access.
pub async fn delete_barber(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, Rejection> {
    auth::require_admin(&headers, &state.admin_token)?;

    let updated = sqlx::query("UPDATE barbers SET is_active = 0 WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(|e| internal("delete_barber", e))?;

    if updated.rows_affected() == 0 {
        return Err(not_found("Barbero no encontrado"));
    }
    Ok(Json(ApiResponse::success(())))
}

async fn fetch_barber(state: &AppState, id: i64) -> Result<Barber, Rejection> {
    sqlx::query_as::<_, Barber>(
        "SELECT id, name, phone, access_key, is_active FROM barbers WHERE id = ?",
    )
    .bind(id)
    .fetch_one(&state.db)
    .await
    .map_err(|e| internal("fetch_barber", e))
}

// ── Business hours ──

/// GET /api/admin/business-hours — all seven weekday rows.
pub async fn list_business_hours(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<BusinessHoursRow>>>, Rejection> {
    auth::require_admin(&headers, &state.admin_token)?;

    let rows = sqlx::query_as::<_, BusinessHoursRow>(
        "SELECT day_of_week, is_open, morning_start, morning_end, afternoon_start, afternoon_end
         FROM business_hours ORDER BY day_of_week ASC",
    )
    .fetch_all(&state.db)
    .await
    .map_err(|e| internal("list_business_hours", e))?;

    Ok(Json(ApiResponse::success(rows)))
}

/// PUT /api/admin/business-hours/{day_of_week}
pub async fn upsert_business_hours(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(day_of_week): Path<i64>,
    Json(body): Json<UpsertBusinessHoursRequest>,
) -> Result<Json<ApiResponse<BusinessHoursRow>>, Rejection> {
    auth::require_admin(&headers, &state.admin_token)?;

    if !(0..=6).contains(&day_of_week) {
        return Err(bad_request("Día de la semana inválido"));
    }

    sqlx::query(
        "INSERT INTO business_hours
            (day_of_week, is_open, morning_start, morning_end, afternoon_start, afternoon_end)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(day_of_week) DO UPDATE SET
            is_open = excluded.is_open,
            morning_start = excluded.morning_start,
            morning_end = excluded.morning_end,
            afternoon_start = excluded.afternoon_start,
            afternoon_end = excluded.afternoon_end",
    )
    .bind(day_of_week)
    .bind(body.is_open)
    .bind(&body.morning_start)
    .bind(&body.morning_end)
    .bind(&body.afternoon_start)
    .bind(&body.afternoon_end)
    .execute(&state.db)
    .await
    .map_err(|e| internal("upsert_business_hours", e))?;

    let row = sqlx::query_as::<_, BusinessHoursRow>(
        "SELECT day_of_week, is_open, morning_start, morning_end, afternoon_start, afternoon_end
         FROM business_hours WHERE day_of_week = ?",
    )
    .bind(day_of_week)
    .fetch_one(&state.db)
    .await
    .map_err(|e| internal("business_hours readback", e))?;

    Ok(Json(ApiResponse::success(row)))
}

// ── Barber schedules ──

/// GET /api/admin/barber-schedules?barber_id=N
pub async fn list_barber_schedules(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BarberSchedulesQuery>,
) -> Result<Json<ApiResponse<Vec<BarberScheduleRow>>>, Rejection> {
    auth::require_admin(&headers, &state.admin_token)?;

    let rows = sqlx::query_as::<_, BarberScheduleRow>(
        "SELECT id, barber_id, day_of_week, is_available,
                morning_start, morning_end, afternoon_start, afternoon_end
         FROM barber_schedules WHERE barber_id = ? ORDER BY day_of_week ASC",
    )
    .bind(query.barber_id)
    .fetch_all(&state.db)
    .await
    .map_err(|e| internal("list_barber_schedules", e))?;

    Ok(Json(ApiResponse::success(rows)))
}

/// PUT /api/admin/barber-schedules/{barber_id}/{day_of_week}
pub async fn upsert_barber_schedule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((barber_id, day_of_week)): Path<(i64, i64)>,
    Json(body): Json<UpsertBarberScheduleRequest>,
) -> Result<Json<ApiResponse<BarberScheduleRow>>, Rejection> {
    auth::require_admin(&headers, &state.admin_token)?;

    if !(0..=6).contains(&day_of_week) {
        return Err(bad_request("Día de la semana inválido"));
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
    .bind(barber_id)
    .bind(day_of_week)
    .bind(body.is_available)
    .bind(&body.morning_start)
    .bind(&body.morning_end)
    .bind(&body.afternoon_start)
    .bind(&body.afternoon_end)
    .execute(&state.db)
    .await
    .map_err(|e| internal("upsert_barber_schedule", e))?;

    let row = sqlx::query_as::<_, BarberScheduleRow>(
        "SELECT id, barber_id, day_of_week, is_available,
                morning_start, morning_end, afternoon_start, afternoon_end
         FROM barber_schedules WHERE barber_id = ? AND day_of_week = ?",
    )
    .bind(barber_id)
    .bind(day_of_week)
    .fetch_one(&state.db)
    .await
    .map_err(|e| internal("barber_schedule readback", e))?;

    Ok(Json(ApiResponse::success(row)))
}

// ── Holidays ──

/// GET /api/admin/holidays?from=&to=
pub async fn list_holidays(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<DateRangeQuery>,
) -> Result<Json<ApiResponse<Vec<Holiday>>>, Rejection> {
    auth::require_admin(&headers, &state.admin_token)?;

    let from = query.from.unwrap_or_else(shop_today);
    let to = query.to.unwrap_or_else(|| "9999-12-31".into());

    let holidays = sqlx::query_as::<_, Holiday>(
        "SELECT id, date, description, barber_id FROM holidays
         WHERE date BETWEEN ? AND ? ORDER BY date ASC",
    )
    .bind(&from)
    .bind(&to)
    .fetch_all(&state.db)
    .await
    .map_err(|e| internal("list_holidays", e))?;

    Ok(Json(ApiResponse::success(holidays)))
}

/// POST /api/admin/holidays — one global or per-barber holiday per date.
pub async fn create_holiday(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateHolidayRequest>,
) -> Result<Json<ApiResponse<Holiday>>, Rejection> {
    auth::require_admin(&headers, &state.admin_token)?;

    if parse_date(&body.date).is_err() {
        return Err(bad_request("Formato de fecha inválido"));
    }

    let result = sqlx::query("INSERT INTO holidays (date, description, barber_id) VALUES (?, ?, ?)")
        .bind(&body.date)
        .bind(body.description.unwrap_or_default())
        .bind(body.barber_id)
        .execute(&state.db)
        .await;

    let id = match result {
        Ok(r) => r.last_insert_rowid(),
        Err(e) if is_unique_violation(&e) => {
            return Err((
                StatusCode::CONFLICT,
                Json(ApiResponse::error("Ya existe un feriado para esa fecha")),
            ));
        }
        Err(e) => return Err(internal("create_holiday", e)),
    };

    let holiday = sqlx::query_as::<_, Holiday>(
        "SELECT id, date, description, barber_id FROM holidays WHERE id = ?",
    )
    .bind(id)
    .fetch_one(&state.db)
    .await
    .map_err(|e| internal("holiday readback", e))?;

    Ok(Json(ApiResponse::success(holiday)))
}

/// DELETE /api/admin/holidays/{id}
pub async fn delete_holiday(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, Rejection> {
    auth::require_admin(&headers, &state.admin_token)?;

    let deleted = sqlx::query("DELETE FROM holidays WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(|e| internal("delete_holiday", e))?;

    if deleted.rows_affected() == 0 {
        return Err(not_found("Feriado no encontrado"));
    }
    Ok(Json(ApiResponse::success(())))
}

// ── Blocked times ──

/// GET /api/admin/blocked-times?date=
pub async fn list_blocked_times(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BlockedTimesQuery>,
) -> Result<Json<ApiResponse<Vec<BlockedTime>>>, Rejection> {
    auth::require_admin(&headers, &state.admin_token)?;

    let rows = match query.date {
        Some(date) => {
            sqlx::query_as::<_, BlockedTime>(
                "SELECT id, date, time_slots, reason, barber_id FROM blocked_times
                 WHERE date = ? ORDER BY id ASC",
            )
            .bind(date)
            .fetch_all(&state.db)
            .await
        }
        None => {
            sqlx::query_as::<_, BlockedTime>(
                "SELECT id, date, time_slots, reason, barber_id FROM blocked_times
                 WHERE date >= ? ORDER BY date ASC",
            )
            .bind(shop_today())
            .fetch_all(&state.db)
            .await
        }
    }
    .map_err(|e| internal("list_blocked_times", e))?;

    Ok(Json(ApiResponse::success(rows)))
}

/// POST /api/admin/blocked-times — every label must parse; a typo here would
/// silently block nothing.
pub async fn create_blocked_time(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateBlockedTimeRequest>,
) -> Result<Json<ApiResponse<BlockedTime>>, Rejection> {
    auth::require_admin(&headers, &state.admin_token)?;

    if parse_date(&body.date).is_err() {
        return Err(bad_request("Formato de fecha inválido"));
    }
    if body.time_slots.is_empty() {
        return Err(bad_request("Selecciona al menos una hora"));
    }
    for label in &body.time_slots {
        if parse_label(label).is_err() {
            return Err(bad_request("Formato de hora inválido"));
        }
    }

    let slots_json = serde_json::to_string(&body.time_slots)
        .map_err(|_| bad_request("Formato de hora inválido"))?;

    let id = sqlx::query(
        "INSERT INTO blocked_times (date, time_slots, reason, barber_id) VALUES (?, ?, ?, ?)",
    )
    .bind(&body.date)
    .bind(&slots_json)
    .bind(body.reason.unwrap_or_default())
    .bind(body.barber_id)
    .execute(&state.db)
    .await
    .map_err(|e| internal("create_blocked_time", e))?
    .last_insert_rowid();

    let row = sqlx::query_as::<_, BlockedTime>(
        "SELECT id, date, time_slots, reason, barber_id FROM blocked_times WHERE id = ?",
    )
    .bind(id)
    .fetch_one(&state.db)
    .await
    .map_err(|e| internal("blocked_time readback", e))?;

    Ok(Json(ApiResponse::success(row)))
}

/// DELETE /api/admin/blocked-times/{id}
pub async fn delete_blocked_time(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<()>>, Rejection> {
    auth::require_admin(&headers, &state.admin_token)?;

    let deleted = sqlx::query("DELETE FROM blocked_times WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(|e| internal("delete_blocked_time", e))?;

    if deleted.rows_affected() == 0 {
        return Err(not_found("Bloqueo no encontrado"));
    }
    Ok(Json(ApiResponse::success(())))
}

// ── Settings ──

/// GET /api/admin/settings
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<AdminSettings>>, Rejection> {
    auth::require_admin(&headers, &state.admin_token)?;

    let settings = crate::db::load_settings(&state.db)
        .await
        .map_err(|e| internal("get_settings", e))?;
    Ok(Json(ApiResponse::success(settings)))
}

/// PUT /api/admin/settings — full replacement of the singleton.
pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<UpdateSettingsRequest>,
) -> Result<Json<ApiResponse<AdminSettings>>, Rejection> {
    auth::require_admin(&headers, &state.admin_token)?;

    if body.early_booking_hours <= 0 {
        return Err(bad_request("Las horas de anticipación deben ser positivas"));
    }
    for label in &body.restricted_hours {
        if parse_label(label).is_err() {
            return Err(bad_request("Formato de hora inválido"));
        }
    }

    let restricted_json = serde_json::to_string(&body.restricted_hours)
        .map_err(|_| bad_request("Formato de hora inválido"))?;

    sqlx::query(
        "UPDATE admin_settings SET
            early_booking_restriction = ?,
            early_booking_hours = ?,
            restricted_hours = ?,
            multiple_barbers_enabled = ?,
            default_barber_id = ?,
            reviews_enabled = ?
         WHERE id = 1",
    )
    .bind(body.early_booking_restriction)
    .bind(body.early_booking_hours)
    .bind(&restricted_json)
    .bind(body.multiple_barbers_enabled)
    .bind(body.default_barber_id)
    .bind(body.reviews_enabled)
    .execute(&state.db)
    .await
    .map_err(|e| internal("update_settings", e))?;

    let settings = crate::db::load_settings(&state.db)
        .await
        .map_err(|e| internal("settings readback", e))?;
    Ok(Json(ApiResponse::success(settings)))
}

// ── Appointments ──

/// GET /api/admin/appointments — by date, by range, or upcoming by default.
/// Cancelled appointments are excluded; they show up in statistics instead.
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AppointmentsQuery>,
) -> Result<Json<ApiResponse<Vec<AppointmentDetail>>>, Rejection> {
    auth::require_admin(&headers, &state.admin_token)?;

    let appointments = match (query.date, query.from, query.to) {
        (Some(date), _, _) => {
            let sql = format!(
                "{} WHERE a.date = ? AND a.cancelled = 0 ORDER BY a.time ASC",
                APPOINTMENT_DETAIL_SELECT
            );
            sqlx::query_as::<_, AppointmentDetail>(&sql)
                .bind(date)
                .fetch_all(&state.db)
                .await
        }
        (None, Some(from), Some(to)) => {
            let sql = format!(
                "{} WHERE a.date BETWEEN ? AND ? AND a.cancelled = 0
                 ORDER BY a.date ASC, a.time ASC",
                APPOINTMENT_DETAIL_SELECT
            );
            sqlx::query_as::<_, AppointmentDetail>(&sql)
                .bind(from)
                .bind(to)
                .fetch_all(&state.db)
                .await
        }
        _ => {
            let sql = format!(
                "{} WHERE a.date >= ? AND a.cancelled = 0 ORDER BY a.date ASC, a.time ASC",
                APPOINTMENT_DETAIL_SELECT
            );
            sqlx::query_as::<_, AppointmentDetail>(&sql)
                .bind(shop_today())
                .fetch_all(&state.db)
                .await
        }
    }
    .map_err(|e| internal("list_appointments", e))?;

    Ok(Json(ApiResponse::success(appointments)))
}

/// POST /api/admin/appointments/{id}/cancel — same soft-cancel path the
/// client uses, without the phone check.
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<AppointmentDetail>>, Rejection> {
    auth::require_admin(&headers, &state.admin_token)?;

    let detail = booking::cancel_appointment(&state.db, &state.notifier, id)
        .await
        .map_err(booking_error)?;
    Ok(Json(ApiResponse::success(detail)))
}

// ── Statistics ──

/// GET /api/admin/statistics?from=&to= — totals over non-cancelled
/// appointments, plus the cancellation count for the same range.
pub async fn statistics(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<DateRangeQuery>,
) -> Result<Json<ApiResponse<StatisticsResponse>>, Rejection> {
    auth::require_admin(&headers, &state.admin_token)?;

    let from = query.from.unwrap_or_else(|| "0000-01-01".into());
    let to = query.to.unwrap_or_else(|| "9999-12-31".into());

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM appointments WHERE date BETWEEN ? AND ? AND cancelled = 0",
    )
    .bind(&from)
    .bind(&to)
    .fetch_one(&state.db)
    .await
    .map_err(|e| internal("statistics total", e))?;

    let cancelled: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM appointments WHERE date BETWEEN ? AND ? AND cancelled = 1",
    )
    .bind(&from)
    .bind(&to)
    .fetch_one(&state.db)
    .await
    .map_err(|e| internal("statistics cancelled", e))?;

    let by_service = sqlx::query_as::<_, ServiceCount>(
        "SELECT s.name AS service_name, COUNT(*) AS count, SUM(s.price) AS revenue
         FROM appointments a JOIN services s ON s.id = a.service_id
         WHERE a.date BETWEEN ? AND ? AND a.cancelled = 0
         GROUP BY s.name ORDER BY count DESC",
    )
    .bind(&from)
    .bind(&to)
    .fetch_all(&state.db)
    .await
    .map_err(|e| internal("statistics by_service", e))?;

    let revenue = by_service.iter().map(|s| s.revenue).sum();

    Ok(Json(ApiResponse::success(StatisticsResponse {
        total,
        cancelled,
        revenue,
        by_service,
    })))
}
