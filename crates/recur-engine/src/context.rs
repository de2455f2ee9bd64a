//! Per-year (and per-month) masks used to filter candidate days.
//!
//! A [`YearContext`] belongs to a single cursor. It is rebuilt whenever the cursor
//! crosses into a new year, and its nth-weekday mask again when the month changes.

use std::ops::Range;

use chrono::{Datelike, Days, NaiveDate, NaiveTime};

use crate::calendar::{
    self, day_of_year, easter, layout, weekday_cycle, year_length, YearLayout, YEAR_PADDING,
};
use crate::options::Frequency;
use crate::rule::Rule;

#[derive(Debug)]
pub(crate) struct YearContext {
    last_year: Option<i32>,
    last_month: Option<u32>,
    pub year_len: usize,
    pub next_year_len: usize,
    /// January 1st of the current year.
    pub first_day: NaiveDate,
    /// Monday-based weekday of January 1st.
    year_weekday: u32,
    pub layout: &'static YearLayout,
    /// Day-of-year → Monday-based weekday, padded like the layout.
    pub weekdays: &'static [u32],
    pub week_no_mask: Option<Vec<bool>>,
    pub nth_weekday_mask: Option<Vec<bool>>,
    pub easter_mask: Option<Vec<bool>>,
}

impl YearContext {
    /// A context for the cursor's first position.
    pub fn new(rule: &Rule, year: i32, month: u32) -> Option<Self> {
        let mut ctx = Self {
            last_year: None,
            last_month: None,
            year_len: 365,
            next_year_len: 365,
            first_day: NaiveDate::from_ymd_opt(year, 1, 1)?,
            year_weekday: 0,
            layout: layout(365),
            weekdays: weekday_cycle(0),
            week_no_mask: None,
            nth_weekday_mask: None,
            easter_mask: None,
        };
        ctx.rebuild(rule, year, month)?;
        Some(ctx)
    }

    /// Recompute the masks for `year`/`month`.
    ///
    /// Returns `None` if `year` is outside the representable calendar.
    pub fn rebuild(&mut self, rule: &Rule, year: i32, month: u32) -> Option<()> {
        if self.last_year != Some(year) {
            self.first_day = NaiveDate::from_ymd_opt(year, 1, 1)?;
            self.year_len = year_length(year);
            self.next_year_len = year_length(year + 1);
            self.year_weekday = calendar::weekday_index(self.first_day.weekday());
            self.weekdays = weekday_cycle(self.year_weekday);
            self.layout = layout(self.year_len);
            self.week_no_mask = if rule.by_week_no.is_empty() {
                None
            } else {
                Some(self.week_number_mask(rule, year)?)
            };
            self.easter_mask = if rule.by_easter.is_empty() {
                None
            } else {
                Some(self.easter_offset_mask(rule, year)?)
            };
        }

        if !rule.by_nth_weekday.is_empty()
            && (self.last_month != Some(month) || self.last_year != Some(year))
        {
            self.nth_weekday_mask = self.ordinal_weekday_mask(rule, month);
        }

        self.last_year = Some(year);
        self.last_month = Some(month);
        Some(())
    }

    /// Days belonging to the requested ISO-like week numbers.
    ///
    /// Week 1 is the first week (starting on the rule's week-start day) with at
    /// least four days in the year. Days of next year's week 1 and of last year's
    /// final week that fall inside this year are marked too.
    fn week_number_mask(&self, rule: &Rule, year: i32) -> Option<Vec<bool>> {
        let wkst = i64::from(rule.week_start);
        let year_len = self.year_len as i64;
        let year_weekday = i64::from(self.year_weekday);
        let mut mask = vec![false; self.year_len + YEAR_PADDING];

        let first_wkst = (7 - year_weekday + wkst).rem_euclid(7);
        let (week1_start, week_year_len) = if first_wkst >= 4 {
            // Week 1 borrows days from last year.
            (0, year_len + (year_weekday - wkst).rem_euclid(7))
        } else {
            (first_wkst, year_len - first_wkst)
        };
        let num_weeks = week_year_len / 7 + (week_year_len % 7) / 4;

        let week_offset = |n: i64| -> i64 {
            if n > 1 {
                let mut i = week1_start + (n - 1) * 7;
                if week1_start != first_wkst {
                    i -= 7 - first_wkst;
                }
                i
            } else {
                week1_start
            }
        };

        for &week in &rule.by_week_no {
            let mut n = i64::from(week);
            if n < 0 {
                n += num_weeks + 1;
            }
            if !(0 < n && n <= num_weeks) {
                continue;
            }
            self.mark_week(&mut mask, week_offset(n), rule.week_start);
        }

        if rule.by_week_no.contains(&1) {
            // Week 1 of next year may start before this year ends.
            let mut i = week1_start + num_weeks * 7;
            if week1_start != first_wkst {
                i -= 7 - first_wkst;
            }
            if i < year_len {
                self.mark_week(&mut mask, i, rule.week_start);
            }
        }

        if week1_start != 0 {
            // The days before week 1 belong to last year's final week.
            let last_num_weeks = if rule.by_week_no.contains(&-1) {
                -1
            } else {
                let prev_jan1 = NaiveDate::from_ymd_opt(year - 1, 1, 1)?;
                let prev_weekday = i64::from(calendar::weekday_index(prev_jan1.weekday()));
                let prev_week1 = (7 - prev_weekday + wkst).rem_euclid(7);
                let prev_year_len = year_length(year - 1) as i64;
                if prev_week1 >= 4 {
                    52 + (prev_year_len + (prev_weekday - wkst).rem_euclid(7)).rem_euclid(7) / 4
                } else {
                    52 + (year_len - week1_start).rem_euclid(7) / 4
                }
            };
            if rule.by_week_no.iter().any(|&w| i64::from(w) == last_num_weeks) {
                for flag in mask.iter_mut().take(week1_start as usize) {
                    *flag = true;
                }
            }
        }

        Some(mask)
    }

    /// Mark up to seven days from `start`, stopping before the next week start.
    fn mark_week(&self, mask: &mut [bool], start: i64, week_start: u32) {
        let Ok(mut i) = usize::try_from(start) else {
            return;
        };
        for _ in 0..7 {
            if i >= mask.len() {
                return;
            }
            mask[i] = true;
            i += 1;
            if self.weekdays.get(i) == Some(&week_start) {
                break;
            }
        }
    }

    /// Days matching ordinal weekdays such as "the 2nd Tuesday" or "the last Friday".
    ///
    /// Yearly rules with `BYMONTH` evaluate the ordinal within each listed month,
    /// other yearly rules within the whole year, monthly rules within `month`.
    fn ordinal_weekday_mask(&self, rule: &Rule, month: u32) -> Option<Vec<bool>> {
        let ranges = &self.layout.month_range;
        let spans: Vec<(usize, usize)> = match rule.freq {
            Frequency::Yearly if !rule.by_month.is_empty() => rule
                .by_month
                .iter()
                .map(|&m| (ranges[m as usize - 1], ranges[m as usize]))
                .collect(),
            Frequency::Yearly => vec![(0, self.year_len)],
            Frequency::Monthly => vec![(ranges[month as usize - 1], ranges[month as usize])],
            _ => return None,
        };

        let mut mask = vec![false; self.year_len];
        for (first, end) in spans {
            let (first, last) = (first as i64, end as i64 - 1);
            for &(wday, n) in &rule.by_nth_weekday {
                let (wday, n) = (i64::from(wday), i64::from(n));
                let anchor = if n < 0 {
                    last + (n + 1) * 7
                } else {
                    first + (n - 1) * 7
                };
                let Some(&anchor_wday) = usize::try_from(anchor)
                    .ok()
                    .and_then(|a| self.weekdays.get(a))
                else {
                    continue;
                };
                let i = if n < 0 {
                    anchor - (i64::from(anchor_wday) - wday).rem_euclid(7)
                } else {
                    anchor + (7 - i64::from(anchor_wday) + wday).rem_euclid(7)
                };
                if first <= i && i <= last {
                    mask[i as usize] = true;
                }
            }
        }
        Some(mask)
    }

    fn easter_offset_mask(&self, rule: &Rule, year: i32) -> Option<Vec<bool>> {
        let easter_day = easter(year)?.ordinal0() as i64;
        let mut mask = vec![false; self.year_len + YEAR_PADDING];
        for &offset in &rule.by_easter {
            let day = easter_day + i64::from(offset);
            if let Some(flag) = usize::try_from(day).ok().and_then(|d| mask.get_mut(d)) {
                *flag = true;
            }
        }
        Some(mask)
    }

    /// The day-of-year offsets making up one period of `freq` around the cursor.
    pub fn day_set(&self, rule: &Rule, year: i32, month: u32, day: u32) -> Option<Range<usize>> {
        match rule.freq {
            Frequency::Yearly => Some(0..self.year_len),
            Frequency::Monthly => {
                let ranges = &self.layout.month_range;
                Some(ranges[month as usize - 1]..ranges[month as usize])
            }
            Frequency::Weekly => {
                let start = day_of_year(year, month, day)?;
                let mut end = start;
                // May run into the padding past December 31st.
                for _ in 0..7 {
                    end += 1;
                    match self.weekdays.get(end) {
                        Some(&w) if w != rule.week_start => {}
                        _ => break,
                    }
                }
                Some(start..end)
            }
            _ => {
                let i = day_of_year(year, month, day)?;
                Some(i..i + 1)
            }
        }
    }

    /// Times of day to try for the current hour/minute/second of a sub-daily rule.
    pub fn time_set(rule: &Rule, hour: u32, minute: u32, second: u32) -> Vec<NaiveTime> {
        let mut times: Vec<NaiveTime> = match rule.freq {
            Frequency::Hourly => rule
                .by_minute
                .iter()
                .flat_map(|&m| rule.by_second.iter().map(move |&s| (m, s)))
                .filter_map(|(m, s)| NaiveTime::from_hms_opt(hour, m, s))
                .collect(),
            Frequency::Minutely => rule
                .by_second
                .iter()
                .filter_map(|&s| NaiveTime::from_hms_opt(hour, minute, s))
                .collect(),
            Frequency::Secondly => NaiveTime::from_hms_opt(hour, minute, second)
                .into_iter()
                .collect(),
            _ => Vec::new(),
        };
        times.sort();
        times
    }

    /// Whether day-of-year `i` passes every by-day filter of `rule`.
    pub fn is_candidate(&self, rule: &Rule, i: usize) -> bool {
        let layout = self.layout;

        if !rule.by_month.is_empty() && !rule.by_month.contains(&layout.month[i]) {
            return false;
        }
        if let Some(mask) = &self.week_no_mask {
            if !mask[i] {
                return false;
            }
        }
        if !rule.by_weekday.is_empty() && !rule.by_weekday.contains(&self.weekdays[i]) {
            return false;
        }
        if let Some(mask) = &self.nth_weekday_mask {
            if !mask.get(i).copied().unwrap_or(false) {
                return false;
            }
        }
        if let Some(mask) = &self.easter_mask {
            if !mask[i] {
                return false;
            }
        }
        if (!rule.by_month_day.is_empty() || !rule.by_neg_month_day.is_empty())
            && !rule.by_month_day.contains(&layout.month_day[i])
            && !rule.by_neg_month_day.contains(&layout.neg_month_day[i])
        {
            return false;
        }
        if !rule.by_year_day.is_empty() {
            let i = i as i32;
            let (year_len, next_len) = (self.year_len as i32, self.next_year_len as i32);
            let matches = if i < year_len {
                rule.by_year_day.contains(&(i + 1)) || rule.by_year_day.contains(&(i - year_len))
            } else {
                rule.by_year_day.contains(&(i + 1 - year_len))
                    || rule.by_year_day.contains(&(i - year_len - next_len))
            };
            if !matches {
                return false;
            }
        }
        true
    }

    /// Civil date of day-of-year `i` (which may spill into next year).
    pub fn date_of(&self, i: usize) -> Option<NaiveDate> {
        self.first_day.checked_add_days(Days::new(i as u64))
    }
}
