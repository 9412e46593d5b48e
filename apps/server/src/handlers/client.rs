use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Datelike;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::error::BookingError;
use crate::availability::{self, compose_availability, excluded_labels, SlotStatus};
use crate::booking::{self, NewAppointment};
use crate::models::*;
use crate::schedule::{self, resolve_day_hours, shop_today};
use crate::{db, AppState};

// ── Endpoints ──

/// GET /api/services — active services in display order.
pub async fn list_services(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<Service>>>, BookingError> {
    let services = sqlx::query_as::<_, Service>(
        "SELECT id, name, price, duration_min, is_active, sort_order
         FROM services WHERE is_active = 1 ORDER BY sort_order ASC",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(ApiResponse::success(services)))
}

/// GET /api/barbers — active barbers, stripped of phone and access key.
pub async fn list_barbers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<BarberPublic>>>, BookingError> {
    let barbers = sqlx::query_as::<_, BarberPublic>(
        "SELECT id, name FROM barbers WHERE is_active = 1 ORDER BY name ASC",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(ApiResponse::success(barbers)))
}

/// GET /api/availability?date=YYYY-MM-DD&barber_id=N — the full slot mapping
/// for one day. Unavailable labels are included with `available: false` so
/// the booking form can render them greyed out.
pub async fn day_availability(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<ApiResponse<Vec<SlotStatus>>>, BookingError> {
    let statuses =
        availability::day_availability(&state.db, &query.date, query.barber_id).await?;
    Ok(Json(ApiResponse::success(statuses)))
}

/// GET /api/calendar?year=2030&month=3&barber_id=N — free/total counts per
/// day of the month, for the date picker.
///
/// Everything for the month is fetched up front (one query per table) and the
/// per-day work is done in memory; 31 days must not mean 31×5 queries.
pub async fn calendar(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<ApiResponse<Vec<CalendarDay>>>, BookingError> {
    let (year, month) = (query.year, query.month);
    if !(1..=12).contains(&month) {
        return Err(BookingError::InvalidDate(format!("{}-{}", year, month)));
    }
    let days_in_month = chrono::NaiveDate::from_ymd_opt(
        if month == 12 { year + 1 } else { year },
        if month == 12 { 1 } else { month + 1 },
        1,
    )
    .and_then(|d| d.pred_opt())
    .map(|d| d.day())
    .unwrap_or(28);

    let month_start = format!("{:04}-{:02}-01", year, month);
    let month_end = format!("{:04}-{:02}-{:02}", year, month, days_in_month);

    let settings = db::load_settings(&state.db).await?;

    let business: HashMap<i64, BusinessHoursRow> = sqlx::query_as::<_, BusinessHoursRow>(
        "SELECT day_of_week, is_open, morning_start, morning_end, afternoon_start, afternoon_end
         FROM business_hours",
    )
    .fetch_all(&state.db)
    .await?
    .into_iter()
    .map(|row| (row.day_of_week, row))
    .collect();

    let overrides: HashMap<i64, BarberScheduleRow> = match query.barber_id {
        Some(b) if settings.multiple_barbers_enabled => {
            sqlx::query_as::<_, BarberScheduleRow>(
                "SELECT id, barber_id, day_of_week, is_available,
                        morning_start, morning_end, afternoon_start, afternoon_end
                 FROM barber_schedules WHERE barber_id = ?",
            )
            .bind(b)
            .fetch_all(&state.db)
            .await?
            .into_iter()
            .map(|row| (row.day_of_week, row))
            .collect()
        }
        _ => HashMap::new(),
    };

    let mut holidays_by_date: HashMap<String, Vec<Holiday>> = HashMap::new();
    for h in sqlx::query_as::<_, Holiday>(
        "SELECT id, date, description, barber_id FROM holidays WHERE date BETWEEN ? AND ?",
    )
    .bind(&month_start)
    .bind(&month_end)
    .fetch_all(&state.db)
    .await?
    {
        holidays_by_date.entry(h.date.clone()).or_default().push(h);
    }

    let mut blocked_by_date: HashMap<String, Vec<BlockedTime>> = HashMap::new();
    for b in sqlx::query_as::<_, BlockedTime>(
        "SELECT id, date, time_slots, reason, barber_id FROM blocked_times WHERE date BETWEEN ? AND ?",
    )
    .bind(&month_start)
    .bind(&month_end)
    .fetch_all(&state.db)
    .await?
    {
        blocked_by_date.entry(b.date.clone()).or_default().push(b);
    }

    let mut booked_by_date: HashMap<String, HashSet<String>> = HashMap::new();
    let taken: Vec<(String, String, Option<i64>)> = sqlx::query_as(
        "SELECT date, time, barber_id FROM appointments
         WHERE date BETWEEN ? AND ? AND cancelled = 0",
    )
    .bind(&month_start)
    .bind(&month_end)
    .fetch_all(&state.db)
    .await?;
    for (date, time, barber_id) in taken {
        if query.barber_id.is_some() && barber_id != query.barber_id {
            continue;
        }
        booked_by_date.entry(date).or_default().insert(time);
    }

    let today = shop_today();
    let now = schedule::shop_now().naive_local();
    let empty_booked = HashSet::new();
    let mut days = Vec::new();

    for day in 1..=days_in_month {
        let date = format!("{:04}-{:02}-{:02}", year, month, day);
        if date < today {
            continue;
        }
        let Ok(parsed) = schedule::parse_date(&date) else {
            continue;
        };

        let dow = parsed.weekday().num_days_from_sunday() as i64;
        let candidates = resolve_day_hours(
            business.get(&dow),
            overrides.get(&dow),
            settings.multiple_barbers_enabled,
        );
        if candidates.is_empty() {
            days.push(CalendarDay { date, total: 0, free: 0 });
            continue;
        }

        let excluded = excluded_labels(
            parsed,
            &candidates,
            holidays_by_date.get(&date).map(Vec::as_slice).unwrap_or_default(),
            blocked_by_date.get(&date).map(Vec::as_slice).unwrap_or_default(),
            &settings,
            query.barber_id,
            now,
        );
        let booked = booked_by_date.get(&date).unwrap_or(&empty_booked);
        let statuses = compose_availability(candidates, &excluded, booked);

        days.push(CalendarDay {
            total: statuses.len() as i64,
            free: statuses.iter().filter(|s| s.available).count() as i64,
            date,
        });
    }

    Ok(Json(ApiResponse::success(days)))
}

/// POST /api/appointments — book a slot.
pub async fn create_appointment(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateAppointmentRequest>,
) -> Result<Json<ApiResponse<AppointmentDetail>>, BookingError> {
    let detail = booking::create_appointment(
        &state.db,
        &state.notifier,
        NewAppointment {
            date: body.date,
            time: body.time,
            service_id: body.service_id,
            barber_id: body.barber_id,
            client_name: body.client_name.trim().to_string(),
            client_phone: body.client_phone.trim().to_string(),
        },
    )
    .await?;

    Ok(Json(ApiResponse::success(detail)))
}

/// POST /api/appointments/{id}/cancel — client-side cancellation. The phone
/// in the body must match the one on the appointment; a mismatch reads the
/// same as a missing appointment so ids can't be probed.
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<CancelAppointmentRequest>,
) -> Result<Json<ApiResponse<AppointmentDetail>>, BookingError> {
    let owner: Option<String> = sqlx::query_scalar(
        "SELECT client_phone FROM appointments WHERE id = ? AND cancelled = 0",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?;

    match owner {
        Some(phone) if phone == body.client_phone.trim() => {}
        _ => return Err(BookingError::AppointmentNotFound(id)),
    }

    let detail = booking::cancel_appointment(&state.db, &state.notifier, id).await?;
    Ok(Json(ApiResponse::success(detail)))
}
