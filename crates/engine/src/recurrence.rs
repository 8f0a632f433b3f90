//! Pure next-occurrence computation for recurrence rules.
//!
//! No side effects, no I/O: `(anchor time, rule) -> next fire time`. All
//! arithmetic is plain UTC offset math — calendar timezone semantics are out
//! of scope.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use chime_domain::{Error, Result};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceKind {
    Daily,
    Weekly,
    Monthly,
    /// Fixed-duration cadence; `interval` is seconds, not a calendar unit.
    Custom,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub kind: RecurrenceKind,
    /// Interval in `kind` units: days, weeks, months, or seconds for custom.
    pub interval: u32,
    /// Once the computed next occurrence exceeds this, the job is done.
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Weekly only: snap forward to this weekday (0 = Sunday .. 6 = Saturday).
    #[serde(default)]
    pub anchor_day_of_week: Option<u8>,
    /// Monthly only: force this day-of-month (1..=31), clamped to the target
    /// month's last valid day.
    #[serde(default)]
    pub anchor_day_of_month: Option<u32>,
}

/// Compute the next occurrence strictly after `from`.
///
/// A result that does not advance past `from` (e.g. a zero interval that
/// slipped past validation) is a programming error and is reported as
/// [`Error::InvalidRecurrenceRule`] rather than silently looping.
pub fn next_occurrence(from: DateTime<Utc>, rule: &RecurrenceRule) -> Result<DateTime<Utc>> {
    let candidate = match rule.kind {
        RecurrenceKind::Daily => from + chrono::Duration::days(i64::from(rule.interval)),
        RecurrenceKind::Weekly => {
            let mut candidate = from + chrono::Duration::weeks(i64::from(rule.interval));
            if let Some(anchor) = rule.anchor_day_of_week {
                // Forward-only: 0..=6 days ahead to the anchor weekday.
                let dow = candidate.weekday().num_days_from_sunday();
                let ahead = (u32::from(anchor) + 7 - dow) % 7;
                candidate += chrono::Duration::days(i64::from(ahead));
            }
            candidate
        }
        RecurrenceKind::Monthly => add_months(from, rule.interval, rule.anchor_day_of_month)?,
        RecurrenceKind::Custom => from + chrono::Duration::seconds(i64::from(rule.interval)),
    };

    if candidate <= from {
        return Err(Error::InvalidRecurrenceRule(format!(
            "computed occurrence {candidate} does not advance past {from}"
        )));
    }
    Ok(candidate)
}

/// Advance `from` by `months`, forcing the day-of-month to `anchor_day` when
/// set. The day is clamped to the target month's last valid day — naive
/// date-add would roll Jan 31 + 1 month into March.
fn add_months(
    from: DateTime<Utc>,
    months: u32,
    anchor_day: Option<u32>,
) -> Result<DateTime<Utc>> {
    let total = from.year() * 12 + from.month0() as i32 + months as i32;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) as u32 + 1;

    let day = anchor_day
        .unwrap_or_else(|| from.day())
        .clamp(1, days_in_month(year, month));

    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        Error::InvalidRecurrenceRule(format!("no such date: {year:04}-{month:02}-{day:02}"))
    })?;
    Ok(date.and_time(from.time()).and_utc())
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}
