//! Time labels and per-day schedule resolution.
//!
//! The whole system works on human 12-hour labels ("7:00 AM") at a fixed
//! 1-hour granularity. This module owns the label grammar and turns the
//! business-hours / barber-schedule tables into the ordered list of bookable
//! labels for a calendar date.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use sqlx::SqlitePool;

use crate::db;
use crate::error::BookingError;
use crate::models::{BarberScheduleRow, BusinessHoursRow};

/// Santo Domingo timezone offset (UTC-4, no DST).
const SHOP_OFFSET_SECS: i32 = -4 * 3600;

/// Current instant in the shop's timezone.
pub fn shop_now() -> DateTime<FixedOffset> {
    let tz = FixedOffset::east_opt(SHOP_OFFSET_SECS).unwrap();
    Utc::now().with_timezone(&tz)
}

pub fn shop_today() -> String {
    shop_now().format("%Y-%m-%d").to_string()
}

/// Parse a stored calendar date. Dates are naive "YYYY-MM-DD" strings in the
/// shop's timezone; no UTC conversion is ever applied to them.
pub fn parse_date(s: &str) -> Result<NaiveDate, BookingError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| BookingError::InvalidDate(s.to_string()))
}

// ── Time grammar ──

/// Parse a "H:MM AM|PM" label into minutes since midnight.
///
/// 12 AM is midnight (0), 12 PM is noon; other PM hours add 12.
pub fn parse_label(label: &str) -> Result<u32, BookingError> {
    let invalid = || BookingError::InvalidTimeFormat(label.to_string());

    let (clock, suffix) = label.rsplit_once(' ').ok_or_else(invalid)?;
    let pm = match suffix {
        "AM" => false,
        "PM" => true,
        _ => return Err(invalid()),
    };

    let (h, m) = clock.split_once(':').ok_or_else(invalid)?;
    if m.len() != 2 {
        return Err(invalid());
    }
    let hour: u32 = h.parse().map_err(|_| invalid())?;
    let minute: u32 = m.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&hour) || minute > 59 {
        return Err(invalid());
    }

    let hour24 = match (hour, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, false) => h,
        (h, true) => h + 12,
    };
    Ok(hour24 * 60 + minute)
}

/// Format minutes since midnight back into a "H:MM AM|PM" label.
/// Inverse of [`parse_label`]: minutes are zero-padded, hour is not.
pub fn format_label(minutes: u32) -> String {
    let hour24 = (minutes / 60) % 24;
    let minute = minutes % 60;
    let suffix = if hour24 < 12 { "AM" } else { "PM" };
    let hour12 = match hour24 % 12 {
        0 => 12,
        h => h,
    };
    format!("{}:{:02} {}", hour12, minute, suffix)
}

/// One label per whole hour in `[start_hour, end_hour_exclusive)`.
/// Slot granularity is fixed at 1 hour.
pub fn range_labels(start_hour: u32, end_hour_exclusive: u32) -> Vec<String> {
    (start_hour..end_hour_exclusive.min(24))
        .map(|h| format_label(h * 60))
        .collect()
}

// ── Schedule resolver ──

/// Hour component of an "HH:MM" window boundary. Minutes are truncated —
/// "07:30" contributes the same hours as "07:00". This mirrors the historical
/// behavior and must be preserved for compatibility.
fn boundary_hour(boundary: &str) -> Option<u32> {
    let hour: u32 = boundary.split(':').next()?.parse().ok()?;
    (hour <= 24).then_some(hour)
}

fn window_labels(start: Option<&str>, end: Option<&str>) -> Vec<String> {
    match (
        start.and_then(boundary_hour),
        end.and_then(boundary_hour),
    ) {
        (Some(s), Some(e)) if s < e => range_labels(s, e),
        _ => Vec::new(),
    }
}

fn windows_of(
    morning_start: Option<&str>,
    morning_end: Option<&str>,
    afternoon_start: Option<&str>,
    afternoon_end: Option<&str>,
) -> Vec<String> {
    let mut labels = window_labels(morning_start, morning_end);
    for label in window_labels(afternoon_start, afternoon_end) {
        if !labels.contains(&label) {
            labels.push(label);
        }
    }
    labels
}

/// Resolve the bookable labels for one day from its schedule sources.
///
/// A barber override wins only when multi-barber mode is enabled; with
/// `is_available = false` (or `is_open = false` on the fallback) the day has
/// zero slots. Output is chronological with no duplicates.
pub fn resolve_day_hours(
    business: Option<&BusinessHoursRow>,
    barber_override: Option<&BarberScheduleRow>,
    multi_barber: bool,
) -> Vec<String> {
    if multi_barber {
        if let Some(sched) = barber_override {
            if !sched.is_available {
                return Vec::new();
            }
            return windows_of(
                sched.morning_start.as_deref(),
                sched.morning_end.as_deref(),
                sched.afternoon_start.as_deref(),
                sched.afternoon_end.as_deref(),
            );
        }
    }

    let Some(hours) = business else {
        return Vec::new();
    };
    if !hours.is_open {
        return Vec::new();
    }
    windows_of(
        hours.morning_start.as_deref(),
        hours.morning_end.as_deref(),
        hours.afternoon_start.as_deref(),
        hours.afternoon_end.as_deref(),
    )
}

/// Ordered bookable labels for `date`, honoring a barber override when one
/// applies. Pure apart from the read-only table fetches.
pub async fn hours_for_date(
    pool: &SqlitePool,
    date: &str,
    barber_id: Option<i64>,
) -> Result<Vec<String>, BookingError> {
    let day = parse_date(date)?.weekday().num_days_from_sunday() as i64;
    let settings = db::load_settings(pool).await?;

    let business = sqlx::query_as::<_, BusinessHoursRow>(
        "SELECT day_of_week, is_open, morning_start, morning_end, afternoon_start, afternoon_end
         FROM business_hours WHERE day_of_week = ?",
    )
    .bind(day)
    .fetch_optional(pool)
    .await?;

    let barber_override = match barber_id {
        Some(b) if settings.multiple_barbers_enabled => {
            sqlx::query_as::<_, BarberScheduleRow>(
                "SELECT id, barber_id, day_of_week, is_available,
                        morning_start, morning_end, afternoon_start, afternoon_end
                 FROM barber_schedules WHERE barber_id = ? AND day_of_week = ?",
            )
            .bind(b)
            .bind(day)
            .fetch_optional(pool)
            .await?
        }
        _ => None,
    };

    Ok(resolve_day_hours(
        business.as_ref(),
        barber_override.as_ref(),
        settings.multiple_barbers_enabled,
    ))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn open_day(
        morning: Option<(&str, &str)>,
        afternoon: Option<(&str, &str)>,
    ) -> BusinessHoursRow {
        BusinessHoursRow {
            day_of_week: 3,
            is_open: true,
            morning_start: morning.map(|(s, _)| s.to_string()),
            morning_end: morning.map(|(_, e)| e.to_string()),
            afternoon_start: afternoon.map(|(s, _)| s.to_string()),
            afternoon_end: afternoon.map(|(_, e)| e.to_string()),
        }
    }

    fn barber_day(
        available: bool,
        morning: Option<(&str, &str)>,
        afternoon: Option<(&str, &str)>,
    ) -> BarberScheduleRow {
        BarberScheduleRow {
            id: 1,
            barber_id: 7,
            day_of_week: 3,
            is_available: available,
            morning_start: morning.map(|(s, _)| s.to_string()),
            morning_end: morning.map(|(_, e)| e.to_string()),
            afternoon_start: afternoon.map(|(s, _)| s.to_string()),
            afternoon_end: afternoon.map(|(_, e)| e.to_string()),
        }
    }

    // ── parse_label / format_label ──

    #[test]
    fn test_parse_morning() {
        assert_eq!(parse_label("7:00 AM").unwrap(), 7 * 60);
        assert_eq!(parse_label("11:30 AM").unwrap(), 11 * 60 + 30);
    }

    #[test]
    fn test_parse_noon_and_midnight() {
        assert_eq!(parse_label("12:00 PM").unwrap(), 12 * 60);
        assert_eq!(parse_label("12:00 AM").unwrap(), 0);
    }

    #[test]
    fn test_parse_afternoon() {
        assert_eq!(parse_label("3:00 PM").unwrap(), 15 * 60);
        assert_eq!(parse_label("11:59 PM").unwrap(), 23 * 60 + 59);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in [
            "", "7:00", "7 AM", "07:0 AM", "13:00 PM", "0:00 AM", "7:60 AM", "7:00 am",
            "7:00  AM", "siete AM",
        ] {
            assert!(parse_label(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_format_basic() {
        assert_eq!(format_label(7 * 60), "7:00 AM");
        assert_eq!(format_label(15 * 60), "3:00 PM");
        assert_eq!(format_label(0), "12:00 AM");
        assert_eq!(format_label(12 * 60), "12:00 PM");
        assert_eq!(format_label(9 * 60 + 5), "9:05 AM");
    }

    #[test]
    fn test_round_trip_every_hour() {
        for minutes in (0..24 * 60).step_by(60) {
            let label = format_label(minutes);
            assert_eq!(parse_label(&label).unwrap(), minutes, "label {}", label);
        }
    }

    // ── range_labels ──

    #[test]
    fn test_range_basic() {
        assert_eq!(
            range_labels(7, 10),
            vec!["7:00 AM", "8:00 AM", "9:00 AM"]
        );
    }

    #[test]
    fn test_range_crosses_noon() {
        assert_eq!(range_labels(11, 13), vec!["11:00 AM", "12:00 PM"]);
    }

    #[test]
    fn test_range_empty_and_inverted() {
        assert!(range_labels(7, 7).is_empty());
        assert!(range_labels(10, 7).is_empty());
    }

    // ── resolve_day_hours ──

    #[test]
    fn test_wednesday_scenario() {
        // Morning 07-12, afternoon 15-19: end hours excluded.
        let hours = open_day(Some(("07:00", "12:00")), Some(("15:00", "19:00")));
        assert_eq!(
            resolve_day_hours(Some(&hours), None, false),
            vec![
                "7:00 AM", "8:00 AM", "9:00 AM", "10:00 AM", "11:00 AM", "3:00 PM", "4:00 PM",
                "5:00 PM", "6:00 PM"
            ]
        );
    }

    #[test]
    fn test_closed_day_is_empty() {
        let mut hours = open_day(Some(("07:00", "12:00")), None);
        hours.is_open = false;
        assert!(resolve_day_hours(Some(&hours), None, false).is_empty());
    }

    #[test]
    fn test_missing_row_is_empty() {
        assert!(resolve_day_hours(None, None, false).is_empty());
    }

    #[test]
    fn test_morning_only_window() {
        let hours = open_day(Some(("10:00", "15:00")), None);
        assert_eq!(
            resolve_day_hours(Some(&hours), None, false),
            vec!["10:00 AM", "11:00 AM", "12:00 PM", "1:00 PM", "2:00 PM"]
        );
    }

    #[test]
    fn test_boundary_minutes_truncated() {
        // "07:30" behaves exactly like "07:00" (hour component only).
        let hours = open_day(Some(("07:30", "09:45")), None);
        assert_eq!(
            resolve_day_hours(Some(&hours), None, false),
            vec!["7:00 AM", "8:00 AM"]
        );
    }

    #[test]
    fn test_override_wins_in_multi_barber_mode() {
        let hours = open_day(Some(("07:00", "12:00")), Some(("15:00", "20:00")));
        let sched = barber_day(true, Some(("09:00", "11:00")), None);
        assert_eq!(
            resolve_day_hours(Some(&hours), Some(&sched), true),
            vec!["9:00 AM", "10:00 AM"]
        );
    }

    #[test]
    fn test_override_off_day_is_empty() {
        let hours = open_day(Some(("07:00", "12:00")), None);
        let sched = barber_day(false, Some(("09:00", "11:00")), None);
        assert!(resolve_day_hours(Some(&hours), Some(&sched), true).is_empty());
    }

    #[test]
    fn test_override_ignored_when_multi_barber_off() {
        let hours = open_day(Some(("07:00", "09:00")), None);
        let sched = barber_day(true, Some(("10:00", "12:00")), None);
        assert_eq!(
            resolve_day_hours(Some(&hours), Some(&sched), false),
            vec!["7:00 AM", "8:00 AM"]
        );
    }

    #[test]
    fn test_overlapping_windows_deduplicated() {
        let hours = open_day(Some(("09:00", "13:00")), Some(("12:00", "14:00")));
        assert_eq!(
            resolve_day_hours(Some(&hours), None, false),
            vec!["9:00 AM", "10:00 AM", "11:00 AM", "12:00 PM", "1:00 PM"]
        );
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert!(parse_date("2030-03-06").is_ok());
        assert!(parse_date("06/03/2030").is_err());
        assert!(parse_date("not-a-date").is_err());
    }
}
