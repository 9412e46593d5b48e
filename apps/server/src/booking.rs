//! Booking creation and cancellation.
//!
//! The availability pre-check is advisory (fast rejection, friendly error);
//! the partial unique index on `appointments(date, time, barber, cancelled=0)`
//! is the authoritative guard. A concurrent request that slipped past the
//! pre-check loses at insert time with [`BookingError::DuplicateSlot`].

use sqlx::SqlitePool;

use crate::availability::is_slot_available;
use crate::db;
use crate::error::BookingError;
use crate::models::{AppointmentDetail, Barber, Service};
use crate::notify::{BookingEvent, EventData, EventKind, WhatsAppNotifier};
use crate::schedule::{parse_date, parse_label, shop_now};

/// Shared SELECT for appointment detail rows (joined service/barber names).
pub const APPOINTMENT_DETAIL_SELECT: &str =
    "SELECT a.id, a.date, a.time, a.client_name, a.client_phone,
            s.name AS service_name, s.price AS service_price,
            b.name AS barber_name,
            a.confirmed, a.cancelled, a.created_at
     FROM appointments a
     JOIN services s ON s.id = a.service_id
     LEFT JOIN barbers b ON b.id = a.barber_id";

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub date: String,
    pub time: String,
    pub service_id: i64,
    pub barber_id: Option<i64>,
    pub client_name: String,
    pub client_phone: String,
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

async fn fetch_detail(pool: &SqlitePool, id: i64) -> Result<AppointmentDetail, BookingError> {
    let query = format!("{} WHERE a.id = ?", APPOINTMENT_DETAIL_SELECT);
    Ok(sqlx::query_as::<_, AppointmentDetail>(&query)
        .bind(id)
        .fetch_one(pool)
        .await?)
}

/// Effective barber for a booking: explicit choice, else the configured
/// default, else none — which is only an error in multi-barber mode.
async fn resolve_barber(
    pool: &SqlitePool,
    explicit: Option<i64>,
) -> Result<Option<Barber>, BookingError> {
    let settings = db::load_settings(pool).await?;
    let barber_id = match explicit.or(settings.default_barber_id) {
        Some(id) => id,
        None if settings.multiple_barbers_enabled => return Err(BookingError::NoBarberResolved),
        None => return Ok(None),
    };

    let barber = sqlx::query_as::<_, Barber>(
        "SELECT id, name, phone, access_key, is_active FROM barbers
         WHERE id = ? AND is_active = 1",
    )
    .bind(barber_id)
    .fetch_optional(pool)
    .await?
    .ok_or(BookingError::UnknownBarber(barber_id))?;

    Ok(Some(barber))
}

/// Create an appointment for a (date, time, barber) slot.
///
/// Validates before any write, re-checks availability right before the
/// insert, and dispatches the created-notification only after the row is in.
pub async fn create_appointment(
    pool: &SqlitePool,
    notifier: &WhatsAppNotifier,
    req: NewAppointment,
) -> Result<AppointmentDetail, BookingError> {
    parse_date(&req.date)?;
    parse_label(&req.time)?;

    let service = sqlx::query_as::<_, Service>(
        "SELECT id, name, price, duration_min, is_active, sort_order FROM services
         WHERE id = ? AND is_active = 1",
    )
    .bind(req.service_id)
    .fetch_optional(pool)
    .await?
    .ok_or(BookingError::UnknownService(req.service_id))?;

    let barber = resolve_barber(pool, req.barber_id).await?;
    let barber_id = barber.as_ref().map(|b| b.id);

    // Advisory check, close to the write. The unique index is the real guard.
    if !is_slot_available(pool, &req.date, &req.time, barber_id).await? {
        return Err(BookingError::SlotUnavailable {
            date: req.date,
            time: req.time,
        });
    }

    let created_at = shop_now().format("%Y-%m-%d %H:%M:%S").to_string();
    let insert = sqlx::query(
        "INSERT INTO appointments
            (date, time, client_name, client_phone, service_id, barber_id,
             confirmed, cancelled, created_at)
         VALUES (?, ?, ?, ?, ?, ?, 1, 0, ?)",
    )
    .bind(&req.date)
    .bind(&req.time)
    .bind(&req.client_name)
    .bind(&req.client_phone)
    .bind(service.id)
    .bind(barber_id)
    .bind(&created_at)
    .execute(pool)
    .await;

    let id = match insert {
        Ok(result) => result.last_insert_rowid(),
        Err(e) if is_unique_violation(&e) => {
            return Err(BookingError::DuplicateSlot {
                date: req.date,
                time: req.time,
            });
        }
        Err(e) => return Err(e.into()),
    };

    notifier.dispatch(BookingEvent {
        kind: EventKind::Created,
        client_phone: req.client_phone.clone(),
        barber_phone: barber.as_ref().map(|b| b.phone.clone()),
        data: EventData {
            client_name: req.client_name.clone(),
            date: req.date.clone(),
            time: req.time.clone(),
            service: service.name.clone(),
            barber_name: barber.as_ref().map(|b| b.name.clone()),
        },
    });

    fetch_detail(pool, id).await
}

/// Soft-cancel an appointment and notify the client (best-effort).
/// Cancelled rows stay queryable for statistics; the partial unique index
/// ignores them, so the slot frees up immediately.
pub async fn cancel_appointment(
    pool: &SqlitePool,
    notifier: &WhatsAppNotifier,
    id: i64,
) -> Result<AppointmentDetail, BookingError> {
    let query = format!("{} WHERE a.id = ? AND a.cancelled = 0", APPOINTMENT_DETAIL_SELECT);
    let detail = sqlx::query_as::<_, AppointmentDetail>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(BookingError::AppointmentNotFound(id))?;

    let cancelled_at = shop_now().format("%Y-%m-%d %H:%M:%S").to_string();
    sqlx::query("UPDATE appointments SET cancelled = 1, cancelled_at = ? WHERE id = ?")
        .bind(&cancelled_at)
        .bind(id)
        .execute(pool)
        .await?;

    let barber_phone = match detail.barber_name {
        Some(_) => sqlx::query_scalar::<_, String>(
            "SELECT b.phone FROM barbers b
             JOIN appointments a ON a.barber_id = b.id WHERE a.id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .unwrap_or(None),
        None => None,
    };

    notifier.dispatch(BookingEvent {
        kind: EventKind::Cancelled,
        client_phone: detail.client_phone.clone(),
        barber_phone,
        data: EventData {
            client_name: detail.client_name.clone(),
            date: detail.date.clone(),
            time: detail.time.clone(),
            service: detail.service_name.clone(),
            barber_name: detail.barber_name.clone(),
        },
    });

    fetch_detail(pool, id).await
}

// ── Tests ──
