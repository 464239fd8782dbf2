//! Presentation helpers for projected end dates.

use crate::ProcessedMedicine;
use chrono::{DateTime, TimeZone, Utc};
use std::fmt::Display;

const MINUTES_IN_DAY: i64 = 1440;
const MINUTES_IN_MONTH: i64 = 43200;
const MINUTES_IN_TWO_MONTHS: i64 = 86400;

/// Render an end date as `"Mar 4, 2024 at 8:00 AM (in 3 days)"`
///
/// Returns `"N/A"` when there is no end date and `"Depleted"` when it lies
/// before `now`.
pub fn format_end_date<Tz>(end: Option<&DateTime<Tz>>, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let Some(end) = end else {
        return "N/A".into();
    };
    if end < now {
        return "Depleted".into();
    }

    let absolute = end.format("%b %-d, %Y at %-I:%M %p");
    format!("{} ({})", absolute, format_distance(end, now))
}

/// Human distance between `target` and `now`, with `in ...` / `... ago`
pub fn format_distance<Tz: TimeZone>(target: &DateTime<Tz>, now: &DateTime<Tz>) -> String {
    let seconds = target.clone().signed_duration_since(now.clone()).num_seconds();
    let phrase = distance_phrase(seconds.abs());
    if seconds >= 0 {
        format!("in {}", phrase)
    } else {
        format!("{} ago", phrase)
    }
}

fn distance_phrase(seconds: i64) -> String {
    let minutes = (seconds as f64 / 60.0).round() as i64;

    if minutes < 2 {
        return if minutes == 0 {
            "less than a minute".into()
        } else {
            "1 minute".into()
        };
    }
    if minutes < 45 {
        return format!("{} minutes", minutes);
    }
    if minutes < 90 {
        return "about 1 hour".into();
    }
    if minutes < MINUTES_IN_DAY {
        let hours = (minutes as f64 / 60.0).round() as i64;
        return format!("about {} hours", hours);
    }
    if minutes < 2520 {
        return "1 day".into();
    }
    if minutes < MINUTES_IN_MONTH {
        let days = (minutes as f64 / MINUTES_IN_DAY as f64).round() as i64;
        return format!("{} days", days);
    }
    if minutes < MINUTES_IN_TWO_MONTHS {
        let months = (minutes as f64 / MINUTES_IN_MONTH as f64).round() as i64;
        return plural("about", months, "month");
    }

    let months = minutes / MINUTES_IN_MONTH;
    if months < 12 {
        let nearest = (minutes as f64 / MINUTES_IN_MONTH as f64).round() as i64;
        return plural("", nearest.max(1), "month");
    }

    let years = months / 12;
    match months % 12 {
        0..=2 => plural("about", years, "year"),
        3..=8 => plural("over", years, "year"),
        _ => plural("almost", years + 1, "year"),
    }
}

fn plural(prefix: &str, count: i64, unit: &str) -> String {
    let suffix = if count == 1 { "" } else { "s" };
    if prefix.is_empty() {
        format!("{} {}{}", count, unit, suffix)
    } else {
        format!("{} {} {}{}", prefix, count, unit, suffix)
    }
}

impl ProcessedMedicine {
    /// End date label as shown on a medicine card
    pub fn end_date_label<Tz>(&self, now: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        if self.current_stock <= 0.0 {
            return "Depleted".into();
        }
        let tz = now.timezone();
        let end = self.end_date.map(|t: DateTime<Utc>| t.with_timezone(&tz));
        format_end_date(end.as_ref(), now)
    }
}
