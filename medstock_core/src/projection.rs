//! Stock projection for scheduled medicines.
//!
//! Two computations, normally run in sequence:
//!
//! 1. **Current stock**: initial stock minus every dose that has come due
//!    between the medicine's creation and `now` (a dose due exactly at `now`
//!    counts as taken).
//! 2. **End date**: simulate the schedule forward from `now` (a dose due at
//!    `now`'s minute counts as already past) until the stock runs out, for at
//!    most [`MAX_PROJECTION_DAYS`] days.
//!
//! Calendar days and times of day are wall-clock values in the time zone of
//! the `now` passed in.

use crate::{Dosage, DoseTime, Medicine, ProcessedMedicine, Projection};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Offset, TimeZone, Timelike, Utc};
use chrono::LocalResult;

/// Simulation horizon for end-date projection (5 years of daily cycles)
pub const MAX_PROJECTION_DAYS: u32 = 365 * 5;

/// Stock remaining at `now`, never negative
pub fn compute_current_stock<Tz: TimeZone>(medicine: &Medicine, now: &DateTime<Tz>) -> f64 {
    let initial = f64::from(medicine.stock);
    if medicine.dosages.is_empty() {
        return initial;
    }

    let tz = now.timezone();
    let created = medicine.created_at.with_timezone(&tz);
    let created_day = created.date_naive();
    let mut total_taken = 0.0;

    for dosage in &medicine.dosages {
        let mut day = created_day;
        let mut dose_at = wall_clock_instant(&tz, day, dosage.time);

        // A dose earlier in the day than creation was not taken from this stock
        if dose_at < created {
            let Some(next) = day.succ_opt() else { continue };
            day = next;
            dose_at = wall_clock_instant(&tz, day, dosage.time);
        }

        while dose_at <= *now {
            total_taken += dosage.amount;
            let Some(next) = day.succ_opt() else { break };
            day = next;
            dose_at = wall_clock_instant(&tz, day, dosage.time);
        }
    }

    (initial - total_taken).max(0.0)
}

/// Instant of the dose that takes the stock to zero, if within the horizon
pub fn compute_end_date<Tz: TimeZone>(
    current_stock: f64,
    dosages: &[Dosage],
    now: &DateTime<Tz>,
) -> Option<DateTime<Tz>> {
    if dosages.is_empty() || current_stock <= 0.0 {
        return None;
    }

    let daily_amount: f64 = dosages.iter().map(|d| d.amount).sum();
    if daily_amount <= 0.0 {
        return None;
    }

    let mut sorted: Vec<&Dosage> = dosages.iter().collect();
    sorted.sort_by_key(|d| d.time);

    let tz = now.timezone();
    let local_now = now.naive_local();
    let now_minutes = local_now.hour() * 60 + local_now.minute();
    let mut day = local_now.date();
    let mut remaining = current_stock;

    for cycle in 0..MAX_PROJECTION_DAYS {
        for dosage in &sorted {
            if cycle == 0 && dosage.time.minutes_since_midnight() <= now_minutes {
                continue;
            }

            remaining -= dosage.amount;

            if remaining <= 0.0 {
                let at = wall_clock_instant(&tz, day, dosage.time);
                if at < *now {
                    // Second pass through a repeated hour
                    return wall_clock_latest(&tz, day, dosage.time).filter(|t| t >= now);
                }
                return Some(at);
            }
        }
        day = day.succ_opt()?;
    }

    tracing::debug!(
        "No depletion within {} days (stock {}, {} per day)",
        MAX_PROJECTION_DAYS,
        current_stock,
        daily_amount
    );
    None
}

/// Run both computations for one medicine
pub fn project<Tz: TimeZone>(medicine: &Medicine, now: &DateTime<Tz>) -> Projection<Tz> {
    let current_stock = compute_current_stock(medicine, now);
    let end_date = compute_end_date(current_stock, &medicine.dosages, now);
    Projection {
        current_stock,
        end_date,
    }
}

/// Project a snapshot of medicines, soonest depletion first
///
/// Medicines without an end date sort last; ties keep input order.
pub fn project_all<Tz: TimeZone>(medicines: &[Medicine], now: &DateTime<Tz>) -> Vec<ProcessedMedicine> {
    let mut processed: Vec<ProcessedMedicine> = medicines
        .iter()
        .map(|medicine| {
            let projection = project(medicine, now);
            ProcessedMedicine {
                medicine: medicine.clone(),
                current_stock: projection.current_stock,
                end_date: projection.end_date.map(|t| t.with_timezone(&Utc)),
            }
        })
        .collect();

    processed.sort_by_key(|p| (p.end_date.is_none(), p.end_date));

    tracing::debug!("Projected {} medicines", processed.len());
    processed
}

/// The instant at which the wall clock in `tz` reads `time` on `day`
///
/// Repeated wall times resolve to their first occurrence. Wall times skipped
/// by a forward transition are pushed forward by the size of the gap.
fn wall_clock_instant<Tz: TimeZone>(tz: &Tz, day: NaiveDate, time: DoseTime) -> DateTime<Tz> {
    let naive = day.and_time(time.to_naive_time());
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(at) => at,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => skip_gap(tz, naive),
    }
}

/// Like [`wall_clock_instant`] but preferring the second of two repeated wall times
fn wall_clock_latest<Tz: TimeZone>(tz: &Tz, day: NaiveDate, time: DoseTime) -> Option<DateTime<Tz>> {
    let naive = day.and_time(time.to_naive_time());
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(at) => Some(at),
        LocalResult::Ambiguous(_, latest) => Some(latest),
        LocalResult::None => Some(skip_gap(tz, naive)),
    }
}

/// Interpret a nonexistent wall time with the offset in force a day earlier
fn skip_gap<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    let before = naive - Duration::days(1);
    let offset = tz.offset_from_utc_datetime(&before).fix();
    let utc = naive - Duration::seconds(i64::from(offset.local_minus_utc()));
    tz.from_utc_datetime(&utc)
}
