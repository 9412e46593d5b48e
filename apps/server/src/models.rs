use serde::{Deserialize, Serialize};

// ── Database models ──

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub price: i64,
    pub duration_min: i64,
    pub is_active: bool,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Barber {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub access_key: String,
    pub is_active: bool,
}

/// Default bookable windows for one weekday (0 = Sunday .. 6 = Saturday).
/// Window boundaries are "HH:MM" strings; an absent window contributes no hours.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BusinessHoursRow {
    pub day_of_week: i64,
    pub is_open: bool,
    pub morning_start: Option<String>,
    pub morning_end: Option<String>,
    pub afternoon_start: Option<String>,
    pub afternoon_end: Option<String>,
}

/// Per-(barber, weekday) override of the business hours. Only consulted when
/// multi-barber mode is enabled.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BarberScheduleRow {
    pub id: i64,
    pub barber_id: i64,
    pub day_of_week: i64,
    pub is_available: bool,
    pub morning_start: Option<String>,
    pub morning_end: Option<String>,
    pub afternoon_start: Option<String>,
    pub afternoon_end: Option<String>,
}

/// A holiday blocks the whole day: globally when `barber_id` is NULL,
/// for a single barber otherwise.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Holiday {
    pub id: i64,
    pub date: String,
    pub description: String,
    pub barber_id: Option<i64>,
}

/// Manually blocked time labels on a date. `time_slots` is a JSON array of
/// labels ("9:00 AM", ...); same global/barber duality as [`Holiday`].
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlockedTime {
    pub id: i64,
    pub date: String,
    pub time_slots: String,
    pub reason: String,
    pub barber_id: Option<i64>,
}

impl BlockedTime {
    pub fn labels(&self) -> Vec<String> {
        serde_json::from_str(&self.time_slots).unwrap_or_default()
    }
}

/// Settings singleton (row id 1). `restricted_hours` is a JSON array of labels.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AdminSettings {
    pub id: i64,
    pub early_booking_restriction: bool,
    pub early_booking_hours: i64,
    pub restricted_hours: String,
    pub multiple_barbers_enabled: bool,
    pub default_barber_id: Option<i64>,
    pub reviews_enabled: bool,
}

impl AdminSettings {
    pub fn restricted_labels(&self) -> Vec<String> {
        serde_json::from_str(&self.restricted_hours).unwrap_or_default()
    }
}

// ── API request/response types ──

/// Barber as exposed on public endpoints (no phone, no access key).
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct BarberPublic {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: String,
    pub barber_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub year: i32,
    pub month: u32,
    pub barber_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CalendarDay {
    pub date: String,
    pub total: i64,
    pub free: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub date: String,
    pub time: String,
    pub service_id: i64,
    pub barber_id: Option<i64>,
    pub client_name: String,
    pub client_phone: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelAppointmentRequest {
    pub client_phone: String,
}

/// Appointment joined with service and barber names for display.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AppointmentDetail {
    pub id: i64,
    pub date: String,
    pub time: String,
    pub client_name: String,
    pub client_phone: String,
    pub service_name: String,
    pub service_price: i64,
    pub barber_name: Option<String>,
    pub confirmed: bool,
    pub cancelled: bool,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct AppointmentsQuery {
    pub date: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateServiceRequest {
    pub name: String,
    pub price: i64,
    pub duration_min: i64,
    pub sort_order: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateServiceRequest {
    pub name: Option<String>,
    pub price: Option<i64>,
    pub duration_min: Option<i64>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBarberRequest {
    pub name: String,
    pub phone: Option<String>,
    pub access_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBarberRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub access_key: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpsertBusinessHoursRequest {
    pub is_open: bool,
    pub morning_start: Option<String>,
    pub morning_end: Option<String>,
    pub afternoon_start: Option<String>,
    pub afternoon_end: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpsertBarberScheduleRequest {
    pub is_available: bool,
    pub morning_start: Option<String>,
    pub morning_end: Option<String>,
    pub afternoon_start: Option<String>,
    pub afternoon_end: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BarberSchedulesQuery {
    pub barber_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateHolidayRequest {
    pub date: String,
    pub description: Option<String>,
    pub barber_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBlockedTimeRequest {
    pub date: String,
    pub time_slots: Vec<String>,
    pub reason: Option<String>,
    pub barber_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct BlockedTimesQuery {
    pub date: Option<String>,
}

/// Full replacement of the settings singleton (the admin panel always saves
/// the whole object).
#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub early_booking_restriction: bool,
    pub early_booking_hours: i64,
    pub restricted_hours: Vec<String>,
    pub multiple_barbers_enabled: bool,
    pub default_barber_id: Option<i64>,
    pub reviews_enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct BarberDayQuery {
    pub date: Option<String>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ServiceCount {
    pub service_name: String,
    pub count: i64,
    pub revenue: i64,
}

#[derive(Debug, Serialize)]
pub struct StatisticsResponse {
    pub total: i64,
    pub cancelled: i64,
    pub revenue: i64,
    pub by_service: Vec<ServiceCount>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub ok: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
