//! Precomputed Gregorian calendar tables.
//!
//! Day-of-year layouts for 365- and 366-day years, built once on first use and shared
//! by every cursor. Each per-day table is padded seven entries past the end of the year
//! so that a weekly window starting in late December can be evaluated without bounds
//! checks on the year length.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, Weekday};

/// Last year a cursor will step into before giving up.
pub const MAX_YEAR: i32 = 9999;

/// Number of days each layout extends past the end of the year.
pub(crate) const YEAR_PADDING: usize = 7;

/// Day-of-year maps for one year length.
#[derive(Debug)]
pub(crate) struct YearLayout {
    /// Day-of-year → month (1-12).
    pub month: Vec<u32>,
    /// Day-of-year → day of month (1-31).
    pub month_day: Vec<i32>,
    /// Day-of-year → day of month counted from the end (-1 is the last day).
    pub neg_month_day: Vec<i32>,
    /// `month_range[m - 1]..month_range[m]` is the day-of-year span of month `m`.
    pub month_range: [usize; 13],
}

impl YearLayout {
    fn build(leap: bool) -> Self {
        let year_len = if leap { 366 } else { 365 };
        let mut month = Vec::with_capacity(year_len + YEAR_PADDING);
        let mut month_day = Vec::with_capacity(year_len + YEAR_PADDING);
        let mut neg_month_day = Vec::with_capacity(year_len + YEAR_PADDING);
        let mut month_range = [0usize; 13];

        for m in 1..=12u32 {
            let len = month_length(m, leap);
            for d in 1..=len {
                month.push(m);
                month_day.push(d as i32);
                neg_month_day.push(d as i32 - len as i32 - 1);
            }
            month_range[m as usize] = month.len();
        }

        // The padding is the first week of the following January.
        for d in 1..=YEAR_PADDING as i32 {
            month.push(1);
            month_day.push(d);
            neg_month_day.push(d - 32);
        }

        Self {
            month,
            month_day,
            neg_month_day,
            month_range,
        }
    }
}

static COMMON_YEAR: LazyLock<YearLayout> = LazyLock::new(|| YearLayout::build(false));
static LEAP_YEAR: LazyLock<YearLayout> = LazyLock::new(|| YearLayout::build(true));

/// Repeating Monday-based weekday indices, long enough to be sliced at any
/// January 1st weekday and still cover a padded leap year.
static WEEKDAY_CYCLE: LazyLock<Vec<u32>> = LazyLock::new(|| (0..55 * 7).map(|i| i % 7).collect());

/// The layout matching a year of `year_len` days.
pub(crate) fn layout(year_len: usize) -> &'static YearLayout {
    if year_len == 366 {
        &LEAP_YEAR
    } else {
        &COMMON_YEAR
    }
}

/// Weekday indices starting at `first_weekday` (0 = Monday).
pub(crate) fn weekday_cycle(first_weekday: u32) -> &'static [u32] {
    &WEEKDAY_CYCLE[first_weekday as usize..]
}

fn month_length(month: u32, leap: bool) -> usize {
    match month {
        2 if leap => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

pub(crate) fn is_leap(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

pub(crate) fn year_length(year: i32) -> usize {
    if is_leap(year) {
        366
    } else {
        365
    }
}

pub(crate) fn days_in_month(year: i32, month: u32) -> u32 {
    month_length(month, is_leap(year)) as u32
}

/// Monday-based weekday index (Monday = 0 … Sunday = 6).
pub(crate) fn weekday_index(weekday: Weekday) -> u32 {
    weekday.num_days_from_monday()
}

/// Zero-based day of the year for a civil date.
pub(crate) fn day_of_year(year: i32, month: u32, day: u32) -> Option<usize> {
    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.ordinal0() as usize)
}

/// Gregorian (western) Easter Sunday for `year`.
pub fn easter(year: i32) -> Option<NaiveDate> {
    let g = year % 19;
    let c = year / 100;
    let h = (c - c / 4 - (8 * c + 13) / 25 + 19 * g + 15) % 30;
    let i = h - (h / 28) * (1 - (h / 28) * (29 / (h + 1)) * ((21 - g) / 11));
    let j = (year + year / 4 + i + 2 - c + c / 4) % 7;
    let p = i - j;
    let day = 1 + (p + 27 + (p + 6) / 40) % 31;
    let month = 3 + (p + 26) / 30;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

/// Floored division and modulo, matching the sign of the divisor.
pub(crate) fn div_mod(a: i64, b: i64) -> (i64, i64) {
    (a.div_euclid(b), a.rem_euclid(b))
}
