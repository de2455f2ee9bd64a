//! Compiled recurrence rules.
//!
//! [`Rule::new`] is the only validation point: it checks a [`RuleOptions`] record,
//! fills in the RFC 5545 defaults that depend on the start instant, and splits the
//! by-fields into the shapes the occurrence generator consumes. A compiled [`Rule`] is
//! immutable; [`Rule::with_start`] and [`Rule::with_until`] return new values.

use chrono::{DateTime, Datelike, NaiveTime, SubsecRound, TimeDelta, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::calendar::weekday_index;
use crate::error::Result;
use crate::iter::RuleIter;
use crate::options::{Frequency, NthWeekday, RuleOptions};
use crate::query;

/// Horizon used as `until` when a rule has none (roughly 292 years).
const UNTIL_HORIZON_SECS: i64 = i64::MAX / 1_000_000_000;

/// A validated, compiled recurrence rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// The record this rule was compiled from, with `dtstart` and `until` truncated
    /// to whole seconds.
    options: RuleOptions,
    pub(crate) freq: Frequency,
    pub(crate) interval: i64,
    /// Monday-based index of the week-start day.
    pub(crate) week_start: u32,
    pub(crate) count: u32,
    pub(crate) start: DateTime<Tz>,
    pub(crate) until: DateTime<Tz>,
    pub(crate) by_set_pos: Vec<i32>,
    pub(crate) by_month: Vec<u32>,
    pub(crate) by_month_day: Vec<i32>,
    pub(crate) by_neg_month_day: Vec<i32>,
    pub(crate) by_year_day: Vec<i32>,
    pub(crate) by_week_no: Vec<i32>,
    /// Plain weekdays as Monday-based indices.
    pub(crate) by_weekday: Vec<u32>,
    /// Ordinal weekdays as (Monday-based index, ordinal).
    pub(crate) by_nth_weekday: Vec<(u32, i32)>,
    pub(crate) by_hour: Vec<u32>,
    pub(crate) by_minute: Vec<u32>,
    pub(crate) by_second: Vec<u32>,
    pub(crate) by_easter: Vec<i32>,
    /// Sorted times of day, only populated for daily and coarser frequencies.
    pub(crate) time_set: Vec<NaiveTime>,
}

impl Rule {
    /// Compile `options` into a rule.
    ///
    /// # Errors
    ///
    /// Returns [`RecurError::InvalidField`](crate::RecurError::InvalidField) or
    /// [`RecurError::InvalidInterval`](crate::RecurError::InvalidInterval) if any
    /// field is out of its RFC 5545 bound.
    pub fn new(options: RuleOptions) -> Result<Self> {
        options.validate()?;
        let rule = compile(options);
        tracing::debug!(
            freq = ?rule.freq,
            interval = rule.interval,
            count = rule.count,
            start = %rule.start,
            "Compiled recurrence rule"
        );
        Ok(rule)
    }

    /// A copy of this rule starting at `start`.
    pub fn with_start(&self, start: DateTime<Tz>) -> Self {
        let mut options = self.options.clone();
        options.dtstart = Some(start);
        compile(options)
    }

    /// A copy of this rule ending at `until`.
    pub fn with_until(&self, until: DateTime<Tz>) -> Self {
        let mut options = self.options.clone();
        options.until = Some(until);
        compile(options)
    }

    /// The record this rule was compiled from.
    pub fn options(&self) -> &RuleOptions {
        &self.options
    }

    pub fn freq(&self) -> Frequency {
        self.freq
    }

    /// The effective start instant.
    pub fn start(&self) -> DateTime<Tz> {
        self.start
    }

    /// The effective end bound; a far-future horizon when the rule has no `UNTIL`.
    pub fn until(&self) -> DateTime<Tz> {
        self.until
    }

    /// The zone occurrences are computed in.
    pub fn timezone(&self) -> Tz {
        self.start.timezone()
    }

    /// A fresh cursor over this rule's occurrences.
    pub fn iter(&self) -> RuleIter<'_> {
        RuleIter::new(self)
    }

    /// Every occurrence.
    ///
    /// Only terminates in reasonable time when the rule is bounded by `count` or
    /// `until`; otherwise it runs up to year 9999.
    pub fn all(&self) -> Vec<DateTime<Tz>> {
        self.iter().collect()
    }

    /// Occurrences between `after` and `before`.
    ///
    /// With `inclusive`, occurrences equal to either bound are kept.
    pub fn between<T: TimeZone>(
        &self,
        after: &DateTime<T>,
        before: &DateTime<T>,
        inclusive: bool,
    ) -> Vec<DateTime<Tz>> {
        query::between(self.iter(), after, before, inclusive)
    }

    /// The last occurrence before `dt` (or at `dt`, with `inclusive`).
    pub fn before<T: TimeZone>(&self, dt: &DateTime<T>, inclusive: bool) -> Option<DateTime<Tz>> {
        query::before(self.iter(), dt, inclusive)
    }

    /// The first occurrence after `dt` (or at `dt`, with `inclusive`).
    pub fn after<T: TimeZone>(&self, dt: &DateTime<T>, inclusive: bool) -> Option<DateTime<Tz>> {
        query::after(self.iter(), dt, inclusive)
    }
}

impl<'a> IntoIterator for &'a Rule {
    type Item = DateTime<Tz>;
    type IntoIter = RuleIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Build a rule from options that already passed validation.
fn compile(mut options: RuleOptions) -> Rule {
    options.dtstart = options.dtstart.map(|dt| dt.trunc_subsecs(0));
    options.until = options.until.map(|dt| dt.trunc_subsecs(0));

    let freq = options.freq;
    let start = options
        .dtstart
        .unwrap_or_else(|| Utc::now().with_timezone(&Tz::UTC))
        .trunc_subsecs(0);
    let until = match options.until {
        Some(until) => until,
        None => start
            .checked_add_signed(TimeDelta::seconds(UNTIL_HORIZON_SECS))
            .unwrap_or_else(|| DateTime::<Utc>::MAX_UTC.with_timezone(&start.timezone())),
    };

    let mut by_month = to_unsigned(&options.by_month);
    let mut month_days = options.by_month_day.clone();
    let mut weekdays = options.by_weekday.clone();

    // Without anything pinning the day, the start instant decides it.
    if options.by_week_no.is_empty()
        && options.by_year_day.is_empty()
        && options.by_month_day.is_empty()
        && options.by_weekday.is_empty()
        && options.by_easter.is_empty()
    {
        match freq {
            Frequency::Yearly => {
                if by_month.is_empty() {
                    by_month = vec![start.month()];
                }
                month_days = vec![start.day() as i32];
            }
            Frequency::Monthly => month_days = vec![start.day() as i32],
            Frequency::Weekly => weekdays = vec![NthWeekday::every(start.weekday())],
            _ => {}
        }
    }

    let by_month_day = month_days.iter().copied().filter(|&d| d > 0).collect();
    let by_neg_month_day = month_days.iter().copied().filter(|&d| d < 0).collect();

    let mut by_weekday = Vec::new();
    let mut by_nth_weekday = Vec::new();
    for wday in &weekdays {
        let index = weekday_index(wday.weekday);
        // Ordinals only make sense within a month or a year.
        if wday.n == 0 || freq > Frequency::Monthly {
            by_weekday.push(index);
        } else {
            by_nth_weekday.push((index, wday.n));
        }
    }

    let by_hour = time_field(&options.by_hour, freq, Frequency::Hourly, start.hour());
    let by_minute = time_field(&options.by_minute, freq, Frequency::Minutely, start.minute());
    let by_second = time_field(&options.by_second, freq, Frequency::Secondly, start.second());

    let mut time_set = Vec::new();
    if freq < Frequency::Hourly {
        for &hour in &by_hour {
            for &minute in &by_minute {
                for &second in &by_second {
                    if let Some(time) = NaiveTime::from_hms_opt(hour, minute, second) {
                        time_set.push(time);
                    }
                }
            }
        }
        time_set.sort();
    }

    Rule {
        freq,
        interval: i64::from(options.interval.max(1)),
        week_start: weekday_index(options.week_start),
        count: options.count,
        start,
        until,
        by_set_pos: options.by_set_pos.clone(),
        by_month,
        by_month_day,
        by_neg_month_day,
        by_year_day: options.by_year_day.clone(),
        by_week_no: options.by_week_no.clone(),
        by_weekday,
        by_nth_weekday,
        by_hour,
        by_minute,
        by_second,
        by_easter: options.by_easter.clone(),
        time_set,
        options,
    }
}

/// Sorted, deduplicated by-hour/minute/second values; defaults to the start's value
/// when the frequency is coarser than the unit.
fn time_field(values: &[i32], freq: Frequency, unit: Frequency, from_start: u32) -> Vec<u32> {
    if values.is_empty() {
        return if freq < unit { vec![from_start] } else { Vec::new() };
    }
    let mut out = to_unsigned(values);
    out.sort_unstable();
    out.dedup();
    out
}

fn to_unsigned(values: &[i32]) -> Vec<u32> {
    values
        .iter()
        .filter_map(|&v| u32::try_from(v).ok())
        .collect()
}

// ── Tests ───────────────────────────────────────────────────────────────────
