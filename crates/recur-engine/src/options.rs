//! The configuration record a [`Rule`](crate::Rule) is compiled from.
//!
//! [`RuleOptions`] mirrors the parts of an RFC 5545 `RRULE` value one to one. It is a
//! plain data record: nothing is checked until it is handed to
//! [`Rule::new`](crate::Rule::new), which calls [`RuleOptions::validate`].

use chrono::{DateTime, Weekday};
use chrono_tz::Tz;
use serde::Serialize;

use crate::error::{RecurError, Result};

// ── Frequency ───────────────────────────────────────────────────────────────

/// The period on which a rule is evaluated.
///
/// Ordered from coarsest to finest, so `Frequency::Daily < Frequency::Hourly`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Frequency {
    #[default]
    Yearly,
    Monthly,
    Weekly,
    Daily,
    Hourly,
    Minutely,
    Secondly,
}

// ── NthWeekday ──────────────────────────────────────────────────────────────

/// A `BYDAY` entry: a weekday, optionally qualified by an ordinal.
///
/// `n == 0` means every such weekday in the period; `n == 2` the second one;
/// `n == -1` the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NthWeekday {
    pub weekday: Weekday,
    pub n: i32,
}

impl NthWeekday {
    /// Every `weekday` of the period.
    pub const fn every(weekday: Weekday) -> Self {
        Self { weekday, n: 0 }
    }

    /// The `n`th `weekday` of the period (negative counts from the end).
    pub const fn nth(weekday: Weekday, n: i32) -> Self {
        Self { weekday, n }
    }
}

impl From<Weekday> for NthWeekday {
    fn from(weekday: Weekday) -> Self {
        Self::every(weekday)
    }
}

// ── RuleOptions ─────────────────────────────────────────────────────────────

/// User-facing recurrence rule configuration.
///
/// Build with struct update syntax over [`Default`]:
///
/// ```
/// use chrono::TimeZone;
/// use chrono_tz::Tz;
/// use recur_engine::{Frequency, Rule, RuleOptions};
///
/// let rule = Rule::new(RuleOptions {
///     freq: Frequency::Daily,
///     count: 3,
///     dtstart: Some(Tz::UTC.with_ymd_and_hms(1997, 9, 2, 9, 0, 0).unwrap()),
///     ..Default::default()
/// })
/// .unwrap();
/// assert_eq!(rule.all().len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleOptions {
    pub freq: Frequency,
    /// First instant of the recurrence. `None` means "now" at compile time.
    pub dtstart: Option<DateTime<Tz>>,
    /// Period multiplier, at least 1.
    pub interval: i32,
    pub week_start: Weekday,
    /// Total number of occurrences; 0 means unbounded.
    pub count: u32,
    /// Last instant an occurrence may fall on.
    pub until: Option<DateTime<Tz>>,
    pub by_set_pos: Vec<i32>,
    pub by_month: Vec<i32>,
    pub by_month_day: Vec<i32>,
    pub by_year_day: Vec<i32>,
    pub by_week_no: Vec<i32>,
    pub by_weekday: Vec<NthWeekday>,
    pub by_hour: Vec<i32>,
    pub by_minute: Vec<i32>,
    pub by_second: Vec<i32>,
    /// Day offsets from Easter Sunday.
    pub by_easter: Vec<i32>,
}

impl Default for RuleOptions {
    fn default() -> Self {
        Self {
            freq: Frequency::Yearly,
            dtstart: None,
            interval: 1,
            week_start: Weekday::Mon,
            count: 0,
            until: None,
            by_set_pos: Vec::new(),
            by_month: Vec::new(),
            by_month_day: Vec::new(),
            by_year_day: Vec::new(),
            by_week_no: Vec::new(),
            by_weekday: Vec::new(),
            by_hour: Vec::new(),
            by_minute: Vec::new(),
            by_second: Vec::new(),
            by_easter: Vec::new(),
        }
    }
}

/// Inclusive bound of one by-field, optionally mirrored into the negatives.
struct FieldBound {
    field: &'static str,
    min: i32,
    max: i32,
    signed: bool,
}

impl FieldBound {
    const fn new(field: &'static str, min: i32, max: i32, signed: bool) -> Self {
        Self {
            field,
            min,
            max,
            signed,
        }
    }

    fn check(&self, value: i32) -> Result<()> {
        let in_range = (self.min..=self.max).contains(&value)
            || (self.signed && (-self.max..=-self.min).contains(&value));
        if in_range {
            return Ok(());
        }
        let range = if self.signed {
            format!(
                "between {} and {} or {} and {}",
                self.min, self.max, -self.min, -self.max
            )
        } else {
            format!("between {} and {}", self.min, self.max)
        };
        Err(RecurError::InvalidField {
            field: self.field,
            value,
            range,
        })
    }
}

impl RuleOptions {
    /// Options for `freq` with every other field at its default.
    pub fn new(freq: Frequency) -> Self {
        Self {
            freq,
            ..Default::default()
        }
    }

    /// Check every by-field against its RFC 5545 bound.
    ///
    /// # Errors
    ///
    /// Returns [`RecurError::InvalidField`] naming the first offending field and its
    /// valid range, or [`RecurError::InvalidInterval`] if `interval < 1`.
    pub fn validate(&self) -> Result<()> {
        let checks: [(&[i32], FieldBound); 8] = [
            (self.by_second.as_slice(), FieldBound::new("BYSECOND", 0, 59, false)),
            (self.by_minute.as_slice(), FieldBound::new("BYMINUTE", 0, 59, false)),
            (self.by_hour.as_slice(), FieldBound::new("BYHOUR", 0, 23, false)),
            (self.by_month_day.as_slice(), FieldBound::new("BYMONTHDAY", 1, 31, true)),
            (self.by_year_day.as_slice(), FieldBound::new("BYYEARDAY", 1, 366, true)),
            (self.by_week_no.as_slice(), FieldBound::new("BYWEEKNO", 1, 53, true)),
            (self.by_month.as_slice(), FieldBound::new("BYMONTH", 1, 12, false)),
            (self.by_set_pos.as_slice(), FieldBound::new("BYSETPOS", 1, 366, true)),
        ];
        for (values, bound) in &checks {
            for &value in values.iter() {
                bound.check(value)?;
            }
        }

        // Weekdays may carry an ordinal, e.g. +2MO for the second Monday.
        for wday in &self.by_weekday {
            if !(-53..=53).contains(&wday.n) {
                return Err(RecurError::InvalidField {
                    field: "BYDAY",
                    value: wday.n,
                    range: "between -53 and 53".to_string(),
                });
            }
        }

        if self.interval < 1 {
            return Err(RecurError::InvalidInterval(self.interval));
        }

        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
