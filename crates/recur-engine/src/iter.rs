//! The occurrence generator behind [`Rule::iter`](crate::Rule::iter).
//!
//! A [`RuleIter`] walks the calendar one period (year, month, week, day, hour, minute
//! or second, times the interval) at a time. For each period it filters the candidate
//! days through the rule's by-fields, combines them with the candidate times of day,
//! optionally selects by set position, and buffers the accepted instants. Pulling from
//! the iterator drains that buffer and only computes the next period once it is empty.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::ops::ControlFlow;

use chrono::{DateTime, Datelike, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use chrono_tz::Tz;

use crate::calendar::{days_in_month, div_mod, weekday_index, MAX_YEAR};
use crate::context::YearContext;
use crate::options::Frequency;
use crate::rule::Rule;

/// Single-pass cursor over a rule's occurrences, in ascending order.
///
/// Only forward iteration is supported; to start over, call
/// [`Rule::iter`](crate::Rule::iter) again.
#[derive(Debug)]
pub struct RuleIter<'a> {
    rule: &'a Rule,
    ctx: Option<YearContext>,
    year: i32,
    month: u32,
    day: i64,
    hour: i64,
    minute: i64,
    second: i64,
    /// Monday-based weekday of the cursor position.
    weekday: u32,
    time_set: Cow<'a, [NaiveTime]>,
    buffer: VecDeque<DateTime<Tz>>,
    /// Occurrences still allowed by `COUNT`; 0 when unbounded.
    remaining: u32,
    emitted: usize,
    finished: bool,
}

impl<'a> RuleIter<'a> {
    pub(crate) fn new(rule: &'a Rule) -> Self {
        let start = rule.start.naive_local();
        let (year, month, day) = (start.year(), start.month(), start.day());
        let (hour, minute, second) = (start.hour(), start.minute(), start.second());
        let ctx = YearContext::new(rule, year, month);

        let time_set = if rule.freq < Frequency::Hourly {
            Cow::Borrowed(rule.time_set.as_slice())
        } else if excluded_tick(&rule.by_hour, hour, rule.freq >= Frequency::Hourly)
            || excluded_tick(&rule.by_minute, minute, rule.freq >= Frequency::Minutely)
            || excluded_tick(&rule.by_second, second, rule.freq >= Frequency::Secondly)
        {
            Cow::Owned(Vec::new())
        } else {
            Cow::Owned(YearContext::time_set(rule, hour, minute, second))
        };

        Self {
            rule,
            finished: ctx.is_none(),
            ctx,
            year,
            month,
            day: i64::from(day),
            hour: i64::from(hour),
            minute: i64::from(minute),
            second: i64::from(second),
            weekday: weekday_index(start.weekday()),
            time_set,
            buffer: VecDeque::new(),
            remaining: rule.count,
            emitted: 0,
        }
    }

    /// Number of occurrences produced so far, including buffered ones.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Compute periods until at least one occurrence is buffered or the rule ends.
    fn generate(&mut self) {
        while self.buffer.is_empty() && !self.finished {
            if self.generate_period().is_break() {
                self.finished = true;
                return;
            }
        }
    }

    /// Emit the current period's occurrences, then step to the next period.
    fn generate_period(&mut self) -> ControlFlow<()> {
        let rule = self.rule;
        let Some(ctx) = self.ctx.as_ref() else {
            return ControlFlow::Break(());
        };
        let Some(day_set) = ctx.day_set(rule, self.year, self.month, self.day as u32) else {
            return ControlFlow::Break(());
        };

        let period_len = day_set.len();
        let days: Vec<usize> = day_set.filter(|&i| ctx.is_candidate(rule, i)).collect();
        let filtered = days.len() != period_len;

        let candidates = if !rule.by_set_pos.is_empty() && !self.time_set.is_empty() {
            self.select_positions(ctx, &days)
        } else {
            let mut all = Vec::with_capacity(days.len() * self.time_set.len());
            for &i in &days {
                let Some(date) = ctx.date_of(i) else {
                    continue;
                };
                all.extend(self.time_set.iter().map(|&time| date.and_time(time)));
            }
            all
        };

        for civil in candidates {
            self.accept(civil)?;
        }

        self.advance(filtered)
    }

    /// Apply `BYSETPOS` to the period's surviving (day, time) combinations.
    fn select_positions(&self, ctx: &YearContext, days: &[usize]) -> Vec<NaiveDateTime> {
        let times = self.time_set.len() as i64;
        let mut picked: Vec<NaiveDateTime> = Vec::new();
        for &pos in &self.rule.by_set_pos {
            let pos = i64::from(pos);
            let (day_pos, time_pos) = if pos < 0 {
                div_mod(pos, times)
            } else {
                div_mod(pos - 1, times)
            };
            let index = if day_pos < 0 {
                days.len() as i64 + day_pos
            } else {
                day_pos
            };
            let Some(&day) = usize::try_from(index).ok().and_then(|i| days.get(i)) else {
                continue;
            };
            let Some(date) = ctx.date_of(day) else {
                continue;
            };
            let civil = date.and_time(self.time_set[time_pos as usize]);
            if !picked.contains(&civil) {
                picked.push(civil);
            }
        }
        picked.sort();
        picked
    }

    /// Resolve a civil candidate in the rule's zone and buffer it if it qualifies.
    ///
    /// Breaks once `until` is passed or the `count` budget is spent.
    fn accept(&mut self, civil: NaiveDateTime) -> ControlFlow<()> {
        let rule = self.rule;
        let instant = match rule.timezone().from_local_datetime(&civil) {
            LocalResult::Single(dt) => dt,
            LocalResult::Ambiguous(earliest, _) => earliest,
            // Falls in a DST gap: this wall-clock time never happens.
            LocalResult::None => return ControlFlow::Continue(()),
        };

        if instant > rule.until {
            return ControlFlow::Break(());
        }
        if instant < rule.start {
            return ControlFlow::Continue(());
        }

        self.emitted += 1;
        self.buffer.push_back(instant);
        if self.remaining > 0 {
            self.remaining -= 1;
            if self.remaining == 0 {
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Step the cursor forward by one interval of the rule's frequency.
    ///
    /// `filtered` is set when some day of the period failed the by-day filters; the
    /// sub-daily frequencies use it to skip the rest of a day that cannot match.
    fn advance(&mut self, filtered: bool) -> ControlFlow<()> {
        let rule = self.rule;
        let interval = rule.interval;
        let mut fix_day = false;

        match rule.freq {
            Frequency::Yearly => {
                let year = i64::from(self.year) + interval;
                if year > i64::from(MAX_YEAR) {
                    tracing::trace!(year, "Reached maximum year");
                    return ControlFlow::Break(());
                }
                self.year = year as i32;
                self.rebuild()?;
            }
            Frequency::Monthly => {
                let (years, month) = div_mod(i64::from(self.month) - 1 + interval, 12);
                let year = i64::from(self.year) + years;
                if year > i64::from(MAX_YEAR) {
                    tracing::trace!(year, "Reached maximum year");
                    return ControlFlow::Break(());
                }
                self.year = year as i32;
                self.month = month as u32 + 1;
                self.rebuild()?;
            }
            Frequency::Weekly => {
                let (wkst, wday) = (i64::from(rule.week_start), i64::from(self.weekday));
                // Back to the start of the current week, then forward.
                self.day += if wkst > wday {
                    -(wday + 1 + (6 - wkst)) + interval * 7
                } else {
                    -(wday - wkst) + interval * 7
                };
                self.weekday = rule.week_start;
                fix_day = true;
            }
            Frequency::Daily => {
                self.day += interval;
                fix_day = true;
            }
            Frequency::Hourly => {
                if filtered {
                    // Jump to the last tick of the day.
                    self.hour += ((23 - self.hour) / interval) * interval;
                }
                let mut steps = 0;
                loop {
                    self.hour += interval;
                    let (days, hour) = div_mod(self.hour, 24);
                    if days != 0 {
                        self.hour = hour;
                        self.day += days;
                        fix_day = true;
                    }
                    if tick_matches(&rule.by_hour, self.hour) {
                        break;
                    }
                    steps += 1;
                    if steps > 24 {
                        tracing::trace!("No hour can ever match BYHOUR at this interval");
                        return ControlFlow::Break(());
                    }
                }
                self.refresh_time_set();
            }
            Frequency::Minutely => {
                if filtered {
                    let minute_of_day = self.hour * 60 + self.minute;
                    self.minute += ((1439 - minute_of_day) / interval) * interval;
                }
                let mut steps = 0;
                loop {
                    self.minute += interval;
                    let (hours, minute) = div_mod(self.minute, 60);
                    if hours != 0 {
                        self.minute = minute;
                        self.hour += hours;
                        let (days, hour) = div_mod(self.hour, 24);
                        if days != 0 {
                            self.hour = hour;
                            self.day += days;
                            fix_day = true;
                        }
                    }
                    if tick_matches(&rule.by_hour, self.hour)
                        && tick_matches(&rule.by_minute, self.minute)
                    {
                        break;
                    }
                    steps += 1;
                    if steps > 1440 {
                        tracing::trace!("No minute can ever match BYHOUR/BYMINUTE at this interval");
                        return ControlFlow::Break(());
                    }
                }
                self.refresh_time_set();
            }
            Frequency::Secondly => {
                if filtered {
                    let second_of_day = self.hour * 3600 + self.minute * 60 + self.second;
                    self.second += ((86399 - second_of_day) / interval) * interval;
                }
                let mut steps = 0;
                loop {
                    self.second += interval;
                    let (minutes, second) = div_mod(self.second, 60);
                    if minutes != 0 {
                        self.second = second;
                        self.minute += minutes;
                        let (hours, minute) = div_mod(self.minute, 60);
                        if hours != 0 {
                            self.minute = minute;
                            self.hour += hours;
                            let (days, hour) = div_mod(self.hour, 24);
                            if days != 0 {
                                self.hour = hour;
                                self.day += days;
                                fix_day = true;
                            }
                        }
                    }
                    if tick_matches(&rule.by_hour, self.hour)
                        && tick_matches(&rule.by_minute, self.minute)
                        && tick_matches(&rule.by_second, self.second)
                    {
                        break;
                    }
                    steps += 1;
                    if steps > 86400 {
                        tracing::trace!("No second can ever match the time filters at this interval");
                        return ControlFlow::Break(());
                    }
                }
                self.refresh_time_set();
            }
        }

        if fix_day && self.day > 28 {
            self.normalize_day()?;
        }
        ControlFlow::Continue(())
    }

    /// Carry a day-of-month overflow into the following months.
    fn normalize_day(&mut self) -> ControlFlow<()> {
        let mut month_len = i64::from(days_in_month(self.year, self.month));
        if self.day <= month_len {
            return ControlFlow::Continue(());
        }
        while self.day > month_len {
            self.day -= month_len;
            self.month += 1;
            if self.month == 13 {
                self.month = 1;
                self.year += 1;
                if self.year > MAX_YEAR {
                    tracing::trace!(year = self.year, "Reached maximum year");
                    return ControlFlow::Break(());
                }
            }
            month_len = i64::from(days_in_month(self.year, self.month));
        }
        self.rebuild()
    }

    fn rebuild(&mut self) -> ControlFlow<()> {
        let (rule, year, month) = (self.rule, self.year, self.month);
        match self.ctx.as_mut().and_then(|ctx| ctx.rebuild(rule, year, month)) {
            Some(()) => ControlFlow::Continue(()),
            None => ControlFlow::Break(()),
        }
    }

    fn refresh_time_set(&mut self) {
        self.time_set = Cow::Owned(YearContext::time_set(
            self.rule,
            self.hour as u32,
            self.minute as u32,
            self.second as u32,
        ));
    }
}

impl Iterator for RuleIter<'_> {
    type Item = DateTime<Tz>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() {
            self.generate();
        }
        self.buffer.pop_front()
    }
}

/// Whether a sub-daily tick passes an optional by-hour/minute/second filter.
fn tick_matches(filter: &[u32], value: i64) -> bool {
    filter.is_empty() || filter.iter().any(|&v| i64::from(v) == value)
}

/// Whether the start's own hour/minute/second is ruled out by an active filter.
fn excluded_tick(filter: &[u32], value: u32, active: bool) -> bool {
    active && !filter.is_empty() && !filter.contains(&value)
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{NthWeekday, RuleOptions};
    use chrono::Weekday;

    fn utc(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Tz> {
        Tz::UTC.with_ymd_and_hms(y, m, d, h, mi, s).unwrap()
    }

    fn start() -> DateTime<Tz> {
        utc(1997, 9, 2, 9, 0, 0)
    }

    fn expand(options: RuleOptions) -> Vec<DateTime<Tz>> {
        Rule::new(RuleOptions {
            dtstart: Some(options.dtstart.unwrap_or_else(start)),
            ..options
        })
        .unwrap()
        .all()
    }

    // ── Yearly ──────────────────────────────────────────────────────────

    #[test]
    fn test_yearly() {
        let got = expand(RuleOptions {
            freq: Frequency::Yearly,
            count: 3,
            ..Default::default()
        });
        assert_eq!(
            got,
            vec![utc(1997, 9, 2, 9, 0, 0), utc(1998, 9, 2, 9, 0, 0), utc(1999, 9, 2, 9, 0, 0)]
        );
    }

    #[test]
    fn test_yearly_by_nth_weekday() {
        let got = expand(RuleOptions {
            freq: Frequency::Yearly,
            count: 3,
            by_weekday: vec![NthWeekday::nth(Weekday::Tue, 1), NthWeekday::nth(Weekday::Thu, -1)],
            ..Default::default()
        });
        assert_eq!(
            got,
            vec![
                utc(1997, 12, 25, 9, 0, 0),
                utc(1998, 1, 6, 9, 0, 0),
                utc(1998, 12, 31, 9, 0, 0)
            ]
        );
    }

    #[test]
    fn test_yearly_by_nth_weekday_large() {
        let got = expand(RuleOptions {
            freq: Frequency::Yearly,
            count: 3,
            by_weekday: vec![NthWeekday::nth(Weekday::Tue, 3), NthWeekday::nth(Weekday::Thu, -3)],
            ..Default::default()
        });
        assert_eq!(
            got,
            vec![
                utc(1997, 12, 11, 9, 0, 0),
                utc(1998, 1, 20, 9, 0, 0),
                utc(1998, 12, 17, 9, 0, 0)
            ]
        );
    }

    #[test]
    fn test_yearly_by_month_and_year_day_negative() {
        let got = expand(RuleOptions {
            freq: Frequency::Yearly,
            count: 4,
            by_month: vec![4, 7],
            by_year_day: vec![-365, -266, -166, -1],
            ..Default::default()
        });
        assert_eq!(
            got,
            vec![
                utc(1998, 4, 10, 9, 0, 0),
                utc(1998, 7, 19, 9, 0, 0),
                utc(1999, 4, 10, 9, 0, 0),
                utc(1999, 7, 19, 9, 0, 0)
            ]
        );
    }

    #[test]
    fn test_yearly_by_week_no() {
        let got = expand(RuleOptions {
            freq: Frequency::Yearly,
            count: 3,
            by_week_no: vec![20],
            ..Default::default()
        });
        assert_eq!(
            got,
            vec![
                utc(1998, 5, 11, 9, 0, 0),
                utc(1998, 5, 12, 9, 0, 0),
                utc(1998, 5, 13, 9, 0, 0)
            ]
        );
    }

    #[test]
    fn test_yearly_by_week_no_one_starts_in_previous_year() {
        let got = expand(RuleOptions {
            freq: Frequency::Yearly,
            count: 3,
            by_week_no: vec![1],
            by_weekday: vec![NthWeekday::every(Weekday::Mon)],
            ..Default::default()
        });
        assert_eq!(
            got,
            vec![
                utc(1997, 12, 29, 9, 0, 0),
                utc(1999, 1, 4, 9, 0, 0),
                utc(2000, 1, 3, 9, 0, 0)
            ]
        );
    }

    #[test]
    fn test_yearly_by_week_no_52_ends_in_next_year() {
        let got = expand(RuleOptions {
            freq: Frequency::Yearly,
            count: 3,
            by_week_no: vec![52],
            by_weekday: vec![NthWeekday::every(Weekday::Sun)],
            ..Default::default()
        });
        assert_eq!(
            got,
            vec![
                utc(1997, 12, 28, 9, 0, 0),
                utc(1998, 12, 27, 9, 0, 0),
                utc(2000, 1, 2, 9, 0, 0)
            ]
        );
    }

    #[test]
    fn test_yearly_by_last_week_no() {
        let got = expand(RuleOptions {
            freq: Frequency::Yearly,
            count: 3,
            by_week_no: vec![-1],
            by_weekday: vec![NthWeekday::every(Weekday::Sun)],
            ..Default::default()
        });
        assert_eq!(
            got,
            vec![
                utc(1997, 12, 28, 9, 0, 0),
                utc(1999, 1, 3, 9, 0, 0),
                utc(2000, 1, 2, 9, 0, 0)
            ]
        );
    }

    #[test]
    fn test_yearly_by_week_no_53() {
        let got = expand(RuleOptions {
            freq: Frequency::Yearly,
            count: 3,
            by_week_no: vec![53],
            by_weekday: vec![NthWeekday::every(Weekday::Mon)],
            ..Default::default()
        });
        assert_eq!(
            got,
            vec![
                utc(1998, 12, 28, 9, 0, 0),
                utc(2004, 12, 27, 9, 0, 0),
                utc(2009, 12, 28, 9, 0, 0)
            ]
        );
    }

    #[test]
    fn test_yearly_by_easter_offsets() {
        let easter = expand(RuleOptions {
            freq: Frequency::Yearly,
            count: 3,
            by_easter: vec![0],
            ..Default::default()
        });
        assert_eq!(
            easter,
            vec![utc(1998, 4, 12, 9, 0, 0), utc(1999, 4, 4, 9, 0, 0), utc(2000, 4, 23, 9, 0, 0)]
        );

        let monday_after = expand(RuleOptions {
            freq: Frequency::Yearly,
            count: 3,
            by_easter: vec![1],
            ..Default::default()
        });
        assert_eq!(
            monday_after,
            vec![utc(1998, 4, 13, 9, 0, 0), utc(1999, 4, 5, 9, 0, 0), utc(2000, 4, 24, 9, 0, 0)]
        );

        let saturday_before = expand(RuleOptions {
            freq: Frequency::Yearly,
            count: 3,
            by_easter: vec![-1],
            ..Default::default()
        });
        assert_eq!(
            saturday_before,
            vec![utc(1998, 4, 11, 9, 0, 0), utc(1999, 4, 3, 9, 0, 0), utc(2000, 4, 22, 9, 0, 0)]
        );
    }

    #[test]
    fn test_yearly_by_set_pos() {
        let got = expand(RuleOptions {
            freq: Frequency::Yearly,
            count: 3,
            by_month_day: vec![15],
            by_hour: vec![6, 18],
            by_set_pos: vec![3, -3],
            ..Default::default()
        });
        assert_eq!(
            got,
            vec![
                utc(1997, 11, 15, 18, 0, 0),
                utc(1998, 2, 15, 6, 0, 0),
                utc(1998, 11, 15, 18, 0, 0)
            ]
        );
    }

    #[test]
    fn test_yearly_impossible_date_stops_at_max_year() {
        let got = expand(RuleOptions {
            freq: Frequency::Yearly,
            count: 3,
            by_month: vec![2],
            by_month_day: vec![31],
            ..Default::default()
        });
        assert!(got.is_empty());
    }

    // ── Monthly ─────────────────────────────────────────────────────────

    #[test]
    fn test_monthly_last_day() {
        let got = expand(RuleOptions {
            freq: Frequency::Monthly,
            count: 3,
            by_month_day: vec![-1],
            ..Default::default()
        });
        assert_eq!(
            got,
            vec![
                utc(1997, 9, 30, 9, 0, 0),
                utc(1997, 10, 31, 9, 0, 0),
                utc(1997, 11, 30, 9, 0, 0)
            ]
        );
    }

    #[test]
    fn test_monthly_interval_crosses_years() {
        let rule = Rule::new(RuleOptions {
            freq: Frequency::Monthly,
            interval: 15,
            dtstart: Some(start()),
            ..Default::default()
        })
        .unwrap();
        let got: Vec<_> = rule.iter().take(2).collect();
        assert_eq!(got, vec![utc(1997, 9, 2, 9, 0, 0), utc(1998, 12, 2, 9, 0, 0)]);
    }

    #[test]
    fn test_monthly_by_nth_weekday() {
        let got = expand(RuleOptions {
            freq: Frequency::Monthly,
            count: 3,
            by_weekday: vec![NthWeekday::nth(Weekday::Tue, 1), NthWeekday::nth(Weekday::Thu, -1)],
            ..Default::default()
        });
        assert_eq!(
            got,
            vec![
                utc(1997, 9, 2, 9, 0, 0),
                utc(1997, 9, 25, 9, 0, 0),
                utc(1997, 10, 7, 9, 0, 0)
            ]
        );
    }

    #[test]
    fn test_monthly_by_set_pos_last_weekday() {
        // Last weekday of the month.
        let got = expand(RuleOptions {
            freq: Frequency::Monthly,
            count: 3,
            by_weekday: [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri]
                .into_iter()
                .map(NthWeekday::every)
                .collect(),
            by_set_pos: vec![-1],
            ..Default::default()
        });
        assert_eq!(
            got,
            vec![
                utc(1997, 9, 30, 9, 0, 0),
                utc(1997, 10, 31, 9, 0, 0),
                utc(1997, 11, 28, 9, 0, 0)
            ]
        );
    }

    #[test]
    fn test_monthly_skips_short_months() {
        let got = expand(RuleOptions {
            freq: Frequency::Monthly,
            count: 4,
            dtstart: Some(utc(2024, 1, 31, 8, 0, 0)),
            ..Default::default()
        });
        assert_eq!(
            got,
            vec![
                utc(2024, 1, 31, 8, 0, 0),
                utc(2024, 3, 31, 8, 0, 0),
                utc(2024, 5, 31, 8, 0, 0),
                utc(2024, 7, 31, 8, 0, 0)
            ]
        );
    }

    // ── Weekly ──────────────────────────────────────────────────────────

    #[test]
    fn test_weekly_by_week_no_crosses_year() {
        let got = expand(RuleOptions {
            freq: Frequency::Weekly,
            count: 1,
            by_week_no: vec![1],
            by_weekday: vec![NthWeekday::every(Weekday::Mon)],
            ..Default::default()
        });
        assert_eq!(got, vec![utc(1997, 12, 29, 9, 0, 0)]);
    }

    #[test]
    fn test_weekly_interval_week_start_monday() {
        let got = expand(RuleOptions {
            freq: Frequency::Weekly,
            count: 3,
            interval: 2,
            by_weekday: vec![NthWeekday::every(Weekday::Tue), NthWeekday::every(Weekday::Sun)],
            week_start: Weekday::Mon,
            ..Default::default()
        });
        assert_eq!(
            got,
            vec![utc(1997, 9, 2, 9, 0, 0), utc(1997, 9, 7, 9, 0, 0), utc(1997, 9, 16, 9, 0, 0)]
        );
    }

    #[test]
    fn test_weekly_interval_week_start_sunday() {
        let got = expand(RuleOptions {
            freq: Frequency::Weekly,
            count: 3,
            interval: 2,
            by_weekday: vec![NthWeekday::every(Weekday::Tue), NthWeekday::every(Weekday::Sun)],
            week_start: Weekday::Sun,
            ..Default::default()
        });
        assert_eq!(
            got,
            vec![utc(1997, 9, 2, 9, 0, 0), utc(1997, 9, 14, 9, 0, 0), utc(1997, 9, 16, 9, 0, 0)]
        );
    }

    #[test]
    fn test_weekly_never_matching_terminates() {
        let got = expand(RuleOptions {
            freq: Frequency::Weekly,
            by_month_day: vec![31],
            by_year_day: vec![1],
            ..Default::default()
        });
        assert!(got.is_empty());
    }

    // ── Daily ───────────────────────────────────────────────────────────

    #[test]
    fn test_daily_count() {
        let got = expand(RuleOptions {
            freq: Frequency::Daily,
            count: 10,
            ..Default::default()
        });
        assert_eq!(got.len(), 10);
        for (i, dt) in got.iter().enumerate() {
            assert_eq!(*dt, start() + chrono::Duration::days(i as i64));
        }
    }

    #[test]
    fn test_daily_until_matching_is_inclusive() {
        let got = expand(RuleOptions {
            freq: Frequency::Daily,
            until: Some(utc(1997, 9, 4, 9, 0, 0)),
            ..Default::default()
        });
        assert_eq!(
            got,
            vec![utc(1997, 9, 2, 9, 0, 0), utc(1997, 9, 3, 9, 0, 0), utc(1997, 9, 4, 9, 0, 0)]
        );
    }

    #[test]
    fn test_daily_until_before_start_is_empty() {
        let got = expand(RuleOptions {
            freq: Frequency::Daily,
            count: 3,
            until: Some(utc(1997, 9, 1, 9, 0, 0)),
            ..Default::default()
        });
        assert!(got.is_empty());
    }

    // ── Sub-daily ───────────────────────────────────────────────────────

    #[test]
    fn test_hourly_by_hour() {
        let got = expand(RuleOptions {
            freq: Frequency::Hourly,
            count: 3,
            by_hour: vec![6, 18],
            ..Default::default()
        });
        assert_eq!(
            got,
            vec![utc(1997, 9, 2, 18, 0, 0), utc(1997, 9, 3, 6, 0, 0), utc(1997, 9, 3, 18, 0, 0)]
        );
    }

    #[test]
    fn test_hourly_by_minute() {
        let got = expand(RuleOptions {
            freq: Frequency::Hourly,
            count: 3,
            by_minute: vec![6, 18],
            ..Default::default()
        });
        assert_eq!(
            got,
            vec![utc(1997, 9, 2, 9, 6, 0), utc(1997, 9, 2, 9, 18, 0), utc(1997, 9, 2, 10, 6, 0)]
        );
    }

    #[test]
    fn test_hourly_unreachable_hour_terminates() {
        // Every other hour from 09:00 never lands on an even hour.
        let got = expand(RuleOptions {
            freq: Frequency::Hourly,
            interval: 2,
            by_hour: vec![10],
            ..Default::default()
        });
        assert!(got.is_empty());
    }

    #[test]
    fn test_minutely_by_hour() {
        let got = expand(RuleOptions {
            freq: Frequency::Minutely,
            count: 3,
            by_hour: vec![6, 18],
            ..Default::default()
        });
        assert_eq!(
            got,
            vec![utc(1997, 9, 2, 18, 0, 0), utc(1997, 9, 2, 18, 1, 0), utc(1997, 9, 2, 18, 2, 0)]
        );
    }

    #[test]
    fn test_minutely_every_fifteen_in_working_hours() {
        let got = expand(RuleOptions {
            freq: Frequency::Minutely,
            interval: 15,
            by_hour: (9..17).collect(),
            dtstart: Some(utc(2024, 3, 4, 16, 30, 0)),
            count: 4,
            ..Default::default()
        });
        assert_eq!(
            got,
            vec![
                utc(2024, 3, 4, 16, 30, 0),
                utc(2024, 3, 4, 16, 45, 0),
                utc(2024, 3, 5, 9, 0, 0),
                utc(2024, 3, 5, 9, 15, 0)
            ]
        );
    }

    #[test]
    fn test_minutely_fast_forwards_over_filtered_days() {
        let got = expand(RuleOptions {
            freq: Frequency::Minutely,
            count: 2,
            by_weekday: vec![NthWeekday::every(Weekday::Sat)],
            ..Default::default()
        });
        assert_eq!(got, vec![utc(1997, 9, 6, 0, 0, 0), utc(1997, 9, 6, 0, 1, 0)]);
    }

    #[test]
    fn test_secondly_by_hour_minute_second() {
        let got = expand(RuleOptions {
            freq: Frequency::Secondly,
            count: 3,
            by_hour: vec![6, 18],
            by_minute: vec![6, 18],
            by_second: vec![6, 18],
            ..Default::default()
        });
        assert_eq!(
            got,
            vec![utc(1997, 9, 2, 18, 6, 6), utc(1997, 9, 2, 18, 6, 18), utc(1997, 9, 2, 18, 18, 6)]
        );
    }

    // ── Time zones ──────────────────────────────────────────────────────

    #[test]
    fn test_hourly_skips_spring_forward_gap() {
        let sydney: Tz = "Australia/Sydney".parse().unwrap();
        let got = expand(RuleOptions {
            freq: Frequency::Hourly,
            count: 3,
            dtstart: Some(sydney.with_ymd_and_hms(2022, 10, 2, 1, 0, 0).unwrap()),
            ..Default::default()
        });
        let local: Vec<String> = got.iter().map(|dt| dt.format("%H:%M %Z").to_string()).collect();
        assert_eq!(local, vec!["01:00 AEST", "03:00 AEDT", "04:00 AEDT"]);

        let utc_hours: Vec<u32> = got.iter().map(|dt| dt.naive_utc().hour()).collect();
        assert_eq!(utc_hours, vec![15, 16, 17]);
    }

    #[test]
    fn test_daily_keeps_wall_clock_across_dst() {
        let new_york: Tz = "America/New_York".parse().unwrap();
        let got = expand(RuleOptions {
            freq: Frequency::Daily,
            count: 3,
            dtstart: Some(new_york.with_ymd_and_hms(2026, 3, 7, 9, 0, 0).unwrap()),
            ..Default::default()
        });
        for dt in &got {
            assert_eq!(dt.hour(), 9);
        }
        // EST on the 7th, EDT from the 8th.
        assert_eq!(got[0].naive_utc().hour(), 14);
        assert_eq!(got[1].naive_utc().hour(), 13);
    }

    #[test]
    fn test_iterator_is_lazy_and_resumable() {
        let rule = Rule::new(RuleOptions {
            freq: Frequency::Daily,
            dtstart: Some(start()),
            ..Default::default()
        })
        .unwrap();
        let mut iter = rule.iter();
        assert_eq!(iter.next(), Some(utc(1997, 9, 2, 9, 0, 0)));
        assert_eq!(iter.next(), Some(utc(1997, 9, 3, 9, 0, 0)));
        assert_eq!(iter.emitted(), 2);

        // A fresh cursor starts over.
        assert_eq!(rule.iter().next(), Some(utc(1997, 9, 2, 9, 0, 0)));
    }

    #[test]
    fn test_finished_iterator_stays_finished() {
        let rule = Rule::new(RuleOptions {
            freq: Frequency::Daily,
            count: 1,
            dtstart: Some(start()),
            ..Default::default()
        })
        .unwrap();
        let mut iter = rule.iter();
        assert!(iter.next().is_some());
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_huge_interval_stops_after_start() {
        for freq in [
            Frequency::Yearly,
            Frequency::Monthly,
            Frequency::Weekly,
            Frequency::Daily,
            Frequency::Hourly,
        ] {
            let rule = Rule::new(RuleOptions {
                freq,
                interval: i32::MAX,
                count: 2,
                dtstart: Some(start()),
                ..Default::default()
            })
            .unwrap();
            assert_eq!(rule.all(), vec![start()], "{freq:?}");
        }
    }
}
