//! The availability engine: one shared answer to "can this slot be booked?".
//!
//! Every caller — the booking form, the admin block-time panel, the calendar
//! view and the booking transaction's pre-commit guard — goes through
//! [`day_availability`] / [`is_slot_available`] so the exclusion rules can
//! never drift apart again.

use std::collections::HashSet;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db;
use crate::error::BookingError;
use crate::models::{AdminSettings, BlockedTime, Holiday};
use crate::schedule::{self, hours_for_date, parse_date, parse_label};

/// One entry of the full label→available mapping. The UI renders unavailable
/// labels as disabled rather than hiding them, so both states are returned.
#[derive(Debug, Clone, Serialize)]
pub struct SlotStatus {
    pub time: String,
    pub available: bool,
}

// ── Overlay filter (pure) ──

/// Labels excluded by holidays, manual blocks and the advance-notice rule.
///
/// Precedence: a global holiday or a matching barber holiday excludes every
/// candidate; blocks and the notice rule exclude individual labels. The
/// notice rule compares against wall-clock `now`, so results are only valid
/// at the moment of the query.
pub fn excluded_labels(
    date: NaiveDate,
    candidates: &[String],
    holidays: &[Holiday],
    blocked: &[BlockedTime],
    settings: &AdminSettings,
    barber_id: Option<i64>,
    now: NaiveDateTime,
) -> HashSet<String> {
    let whole_day_off = holidays.iter().any(|h| {
        h.barber_id.is_none() || (barber_id.is_some() && h.barber_id == barber_id)
    });
    if whole_day_off {
        return candidates.iter().cloned().collect();
    }

    let mut excluded = HashSet::new();

    for block in blocked {
        let applies = block.barber_id.is_none()
            || (barber_id.is_some() && block.barber_id == barber_id);
        if !applies {
            continue;
        }
        for label in block.labels() {
            if candidates.contains(&label) {
                excluded.insert(label);
            }
        }
    }

    if settings.early_booking_restriction {
        let restricted = settings.restricted_labels();
        for label in candidates {
            if excluded.contains(label) || !restricted.contains(label) {
                continue;
            }
            let Ok(minutes) = parse_label(label) else {
                continue;
            };
            let Some(target) = date.and_hms_opt(minutes / 60, minutes % 60, 0) else {
                continue;
            };
            if target - now < Duration::hours(settings.early_booking_hours) {
                excluded.insert(label.clone());
            }
        }
    }

    excluded
}

/// Fold candidates, exclusions and existing bookings into the final mapping.
pub fn compose_availability(
    candidates: Vec<String>,
    excluded: &HashSet<String>,
    booked: &HashSet<String>,
) -> Vec<SlotStatus> {
    candidates
        .into_iter()
        .map(|time| {
            let available = !excluded.contains(&time) && !booked.contains(&time);
            SlotStatus { time, available }
        })
        .collect()
}

// ── Data access ──

pub async fn holidays_for_date(
    pool: &SqlitePool,
    date: &str,
) -> Result<Vec<Holiday>, BookingError> {
    Ok(sqlx::query_as::<_, Holiday>(
        "SELECT id, date, description, barber_id FROM holidays WHERE date = ?",
    )
    .bind(date)
    .fetch_all(pool)
    .await?)
}

pub async fn blocked_for_date(
    pool: &SqlitePool,
    date: &str,
) -> Result<Vec<BlockedTime>, BookingError> {
    Ok(sqlx::query_as::<_, BlockedTime>(
        "SELECT id, date, time_slots, reason, barber_id FROM blocked_times WHERE date = ?",
    )
    .bind(date)
    .fetch_all(pool)
    .await?)
}

/// Labels already taken by non-cancelled appointments on `date`. With a
/// barber the lookup is scoped to that barber; without one every appointment
/// on the date competes for the same labels (single-barber deployments).
pub async fn booked_labels(
    pool: &SqlitePool,
    date: &str,
    barber_id: Option<i64>,
) -> Result<HashSet<String>, BookingError> {
    let times: Vec<String> = match barber_id {
        Some(b) => {
            sqlx::query_scalar(
                "SELECT time FROM appointments WHERE date = ? AND barber_id = ? AND cancelled = 0",
            )
            .bind(date)
            .bind(b)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_scalar("SELECT time FROM appointments WHERE date = ? AND cancelled = 0")
                .bind(date)
                .fetch_all(pool)
                .await?
        }
    };
    Ok(times.into_iter().collect())
}

// ── Engine ──

/// The full label→available mapping for a date (and optional barber).
/// Empty when the schedule resolver yields no hours for the day.
pub async fn day_availability(
    pool: &SqlitePool,
    date: &str,
    barber_id: Option<i64>,
) -> Result<Vec<SlotStatus>, BookingError> {
    let candidates = hours_for_date(pool, date, barber_id).await?;
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let day = parse_date(date)?;
    let holidays = holidays_for_date(pool, date).await?;
    let blocked = blocked_for_date(pool, date).await?;
    let settings = db::load_settings(pool).await?;
    let excluded = excluded_labels(
        day,
        &candidates,
        &holidays,
        &blocked,
        &settings,
        barber_id,
        schedule::shop_now().naive_local(),
    );
    let booked = booked_labels(pool, date, barber_id).await?;

    Ok(compose_availability(candidates, &excluded, &booked))
}

/// Single-label convenience over the same three checks. Used as the booking
/// transaction's advisory pre-commit guard.
pub async fn is_slot_available(
    pool: &SqlitePool,
    date: &str,
    time: &str,
    barber_id: Option<i64>,
) -> Result<bool, BookingError> {
    let statuses = day_availability(pool, date, barber_id).await?;
    Ok(statuses.iter().any(|s| s.time == time && s.available))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> Vec<String> {
        ["7:00 AM", "8:00 AM", "9:00 AM", "3:00 PM"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn settings_off() -> AdminSettings {
        AdminSettings {
            id: 1,
            early_booking_restriction: false,
            early_booking_hours: 12,
            restricted_hours: "[]".into(),
            multiple_barbers_enabled: false,
            default_barber_id: None,
            reviews_enabled: false,
        }
    }

    fn holiday(barber_id: Option<i64>) -> Holiday {
        Holiday {
            id: 1,
            date: "2030-03-06".into(),
            description: "Feriado".into(),
            barber_id,
        }
    }

    fn block(labels: &[&str], barber_id: Option<i64>) -> BlockedTime {
        BlockedTime {
            id: 1,
            date: "2030-03-06".into(),
            time_slots: serde_json::to_string(labels).unwrap(),
            reason: "Diligencias".into(),
            barber_id,
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 3, 6).unwrap()
    }

    fn noon_before() -> NaiveDateTime {
        // Long before any slot on `day()` — notice rule never triggers.
        NaiveDate::from_ymd_opt(2030, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    // ── Holidays ──

    #[test]
    fn test_global_holiday_excludes_everything() {
        let cands = candidates();
        let excluded = excluded_labels(
            day(),
            &cands,
            &[holiday(None)],
            &[],
            &settings_off(),
            Some(5),
            noon_before(),
        );
        assert_eq!(excluded.len(), cands.len());
    }

    #[test]
    fn test_barber_holiday_hits_only_that_barber() {
        let cands = candidates();
        let holidays = [holiday(Some(5))];
        let hit = excluded_labels(
            day(), &cands, &holidays, &[], &settings_off(), Some(5), noon_before(),
        );
        assert_eq!(hit.len(), cands.len());

        let other = excluded_labels(
            day(), &cands, &holidays, &[], &settings_off(), Some(6), noon_before(),
        );
        assert!(other.is_empty());

        // No barber in the query: a barber-specific holiday does not apply.
        let global_ctx = excluded_labels(
            day(), &cands, &holidays, &[], &settings_off(), None, noon_before(),
        );
        assert!(global_ctx.is_empty());
    }

    // ── Blocked times ──

    #[test]
    fn test_global_block_excludes_listed_labels_only() {
        let cands = candidates();
        let excluded = excluded_labels(
            day(),
            &cands,
            &[],
            &[block(&["8:00 AM", "3:00 PM"], None)],
            &settings_off(),
            None,
            noon_before(),
        );
        assert!(excluded.contains("8:00 AM"));
        assert!(excluded.contains("3:00 PM"));
        assert!(!excluded.contains("7:00 AM"));
    }

    #[test]
    fn test_barber_block_does_not_leak() {
        let cands = candidates();
        let blocks = [block(&["8:00 AM"], Some(5))];
        let mine = excluded_labels(
            day(), &cands, &[], &blocks, &settings_off(), Some(5), noon_before(),
        );
        assert!(mine.contains("8:00 AM"));

        let theirs = excluded_labels(
            day(), &cands, &[], &blocks, &settings_off(), Some(6), noon_before(),
        );
        assert!(theirs.is_empty());
    }

    #[test]
    fn test_block_label_outside_candidates_ignored() {
        let cands = candidates();
        let excluded = excluded_labels(
            day(),
            &cands,
            &[],
            &[block(&["11:00 PM"], None)],
            &settings_off(),
            None,
            noon_before(),
        );
        assert!(excluded.is_empty());
    }

    // ── Advance-notice rule ──

    fn settings_notice() -> AdminSettings {
        AdminSettings {
            early_booking_restriction: true,
            restricted_hours: r#"["7:00 AM"]"#.into(),
            ..settings_off()
        }
    }

    #[test]
    fn test_notice_excludes_inside_window() {
        // 7:00 AM slot, now = 11 hours before → inside the 12h window.
        let now = day().and_hms_opt(7, 0, 0).unwrap() - Duration::hours(11);
        let excluded = excluded_labels(
            day(), &candidates(), &[], &[], &settings_notice(), None, now,
        );
        assert!(excluded.contains("7:00 AM"));
        assert!(!excluded.contains("8:00 AM"));
    }

    #[test]
    fn test_notice_boundary() {
        let slot = day().and_hms_opt(7, 0, 0).unwrap();

        // 12 hours and 1 minute before → bookable.
        let excluded = excluded_labels(
            day(),
            &candidates(),
            &[],
            &[],
            &settings_notice(),
            None,
            slot - Duration::hours(12) - Duration::minutes(1),
        );
        assert!(!excluded.contains("7:00 AM"));

        // Exactly 12 hours before → still bookable (strict less-than).
        let excluded = excluded_labels(
            day(),
            &candidates(),
            &[],
            &[],
            &settings_notice(),
            None,
            slot - Duration::hours(12),
        );
        assert!(!excluded.contains("7:00 AM"));
    }

    #[test]
    fn test_notice_disabled_does_nothing() {
        let now = day().and_hms_opt(7, 0, 0).unwrap() - Duration::hours(1);
        let mut settings = settings_notice();
        settings.early_booking_restriction = false;
        let excluded =
            excluded_labels(day(), &candidates(), &[], &[], &settings, None, now);
        assert!(excluded.is_empty());
    }

    #[test]
    fn test_notice_only_applies_to_restricted_labels() {
        // 8:00 AM is not in restricted_hours, so even 1 hour ahead it stays.
        let now = day().and_hms_opt(8, 0, 0).unwrap() - Duration::hours(1);
        let excluded = excluded_labels(
            day(), &candidates(), &[], &[], &settings_notice(), None, now,
        );
        assert!(!excluded.contains("8:00 AM"));
    }

    // ── compose_availability ──

    #[test]
    fn test_compose_full_mapping_in_order() {
        let excluded: HashSet<String> = ["8:00 AM".to_string()].into_iter().collect();
        let booked: HashSet<String> = ["3:00 PM".to_string()].into_iter().collect();
        let statuses = compose_availability(candidates(), &excluded, &booked);

        let times: Vec<&str> = statuses.iter().map(|s| s.time.as_str()).collect();
        assert_eq!(times, vec!["7:00 AM", "8:00 AM", "9:00 AM", "3:00 PM"]);

        let avail: Vec<bool> = statuses.iter().map(|s| s.available).collect();
        assert_eq!(avail, vec![true, false, true, false]);
    }

    #[test]
    fn test_compose_empty_candidates() {
        let statuses =
            compose_availability(Vec::new(), &HashSet::new(), &HashSet::new());
        assert!(statuses.is_empty());
    }
}
