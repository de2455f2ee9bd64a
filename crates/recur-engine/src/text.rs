//! RFC 5545 text form of rules, sets, and date lists.
//!
//! Rendering goes through [`Display`](fmt::Display); parsing through the `parse_*`
//! functions or [`FromStr`]. Every value renders back to text that parses to an
//! equivalent value.
//!
//! Supported date-time tokens:
//! - `YYYYMMDDTHHMMSSZ`: a UTC instant
//! - `YYYYMMDDTHHMMSS`: a local time, in the `TZID` zone if one applies, else UTC
//! - `YYYYMMDD`: midnight local time
//!
//! # Example
//!
//! ```
//! use recur_engine::text::parse_rule;
//!
//! let rule = parse_rule("DTSTART:19970902T090000Z\nRRULE:FREQ=DAILY;COUNT=3").unwrap();
//! assert_eq!(rule.all().len(), 3);
//! assert_eq!(rule.to_string(), "DTSTART:19970902T090000Z\nFREQ=DAILY;COUNT=3");
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Weekday};
use chrono_tz::Tz;

use crate::error::{RecurError, Result};
use crate::options::{Frequency, NthWeekday, RuleOptions};
use crate::rule::Rule;
use crate::set::RecurrenceSet;

// ── Tokens ──────────────────────────────────────────────────────────────────

/// `YYYYMMDDTHHMMSSZ` for `dt` converted to UTC.
fn utc_token(dt: &DateTime<Tz>) -> String {
    dt.naive_utc().format("%Y%m%dT%H%M%SZ").to_string()
}

/// The part of a `DTSTART` line after the property name.
fn start_suffix(dt: &DateTime<Tz>) -> String {
    match dt.timezone() {
        Tz::UTC => format!(":{}", utc_token(dt)),
        tz => format!(
            ";TZID={}:{}",
            tz.name(),
            dt.naive_local().format("%Y%m%dT%H%M%S")
        ),
    }
}

fn number(digits: &str) -> Option<u32> {
    if digits.bytes().all(|b| b.is_ascii_digit()) {
        digits.parse().ok()
    } else {
        None
    }
}

fn civil_date(token: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(
        i32::try_from(number(&token[0..4])?).ok()?,
        number(&token[4..6])?,
        number(&token[6..8])?,
    )
}

fn civil_datetime(token: &str) -> Option<NaiveDateTime> {
    if &token[8..9] != "T" {
        return None;
    }
    let time = NaiveTime::from_hms_opt(
        number(&token[9..11])?,
        number(&token[11..13])?,
        number(&token[13..15])?,
    )?;
    Some(civil_date(&token[..8])?.and_time(time))
}

/// Parse one date or date-time token; local forms are read in `tz`.
///
/// # Errors
///
/// Returns [`RecurError::InvalidDatetime`] for malformed tokens and for local times
/// that do not exist in `tz`.
pub fn parse_datetime(token: &str, tz: Tz) -> Result<DateTime<Tz>> {
    let invalid = || RecurError::InvalidDatetime(token.to_string());
    if !token.is_ascii() {
        return Err(invalid());
    }

    let local = match token.len() {
        8 => civil_date(token).and_then(|d| d.and_hms_opt(0, 0, 0)),
        15 => civil_datetime(token),
        16 if token.ends_with('Z') => {
            let civil = civil_datetime(&token[..15]).ok_or_else(invalid)?;
            return Ok(Tz::UTC.from_utc_datetime(&civil));
        }
        _ => None,
    }
    .ok_or_else(invalid)?;

    tz.from_local_datetime(&local).earliest().ok_or_else(invalid)
}

fn parse_zone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| RecurError::InvalidTimezone(name.to_string()))
}

/// Read a `TZID=<zone>` parameter.
fn parse_tzid(param: &str) -> Result<Tz> {
    match param.strip_prefix("TZID=") {
        Some(name) if !name.is_empty() => parse_zone(name),
        _ => Err(RecurError::Parse(format!("bad TZID parameter: {param}"))),
    }
}

// ── Frequency & weekdays ────────────────────────────────────────────────────

impl Frequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Yearly => "YEARLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Daily => "DAILY",
            Frequency::Hourly => "HOURLY",
            Frequency::Minutely => "MINUTELY",
            Frequency::Secondly => "SECONDLY",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = RecurError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "YEARLY" => Ok(Frequency::Yearly),
            "MONTHLY" => Ok(Frequency::Monthly),
            "WEEKLY" => Ok(Frequency::Weekly),
            "DAILY" => Ok(Frequency::Daily),
            "HOURLY" => Ok(Frequency::Hourly),
            "MINUTELY" => Ok(Frequency::Minutely),
            "SECONDLY" => Ok(Frequency::Secondly),
            _ => Err(RecurError::Parse(format!("unknown frequency: {s}"))),
        }
    }
}

fn weekday_code(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

fn parse_weekday_code(code: &str) -> Option<Weekday> {
    match code {
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        "SU" => Some(Weekday::Sun),
        _ => None,
    }
}

impl fmt::Display for NthWeekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.n == 0 {
            f.write_str(weekday_code(self.weekday))
        } else {
            write!(f, "{:+}{}", self.n, weekday_code(self.weekday))
        }
    }
}

impl FromStr for NthWeekday {
    type Err = RecurError;

    /// Parses `MO`, `+2FR`, `-1TH` and the like.
    fn from_str(s: &str) -> Result<Self> {
        let unknown = || RecurError::Parse(format!("unknown weekday: {s}"));
        let s_upper = s.to_ascii_uppercase();
        if s_upper.len() < 2 || !s_upper.is_ascii() {
            return Err(unknown());
        }
        let (ordinal, code) = s_upper.split_at(s_upper.len() - 2);
        let weekday = parse_weekday_code(code).ok_or_else(unknown)?;
        let n = if ordinal.is_empty() {
            0
        } else {
            ordinal.parse::<i32>().map_err(|_| unknown())?
        };
        Ok(NthWeekday::nth(weekday, n))
    }
}

// ── Rule values ─────────────────────────────────────────────────────────────

fn push_list<T: fmt::Display>(parts: &mut Vec<String>, key: &str, values: &[T]) {
    if values.is_empty() {
        return;
    }
    let joined: Vec<String> = values.iter().map(ToString::to_string).collect();
    parts.push(format!("{key}={}", joined.join(",")));
}

/// `FREQ=...;...` for `options`, optionally carrying the start as a `DTSTART=` part.
fn value_line(options: &RuleOptions, embed_start: bool) -> String {
    let mut parts = vec![format!("FREQ={}", options.freq)];
    if embed_start {
        if let Some(start) = &options.dtstart {
            parts.push(format!("DTSTART={}", utc_token(start)));
        }
    }
    if options.interval != 1 {
        parts.push(format!("INTERVAL={}", options.interval));
    }
    if options.week_start != Weekday::Mon {
        parts.push(format!("WKST={}", weekday_code(options.week_start)));
    }
    if options.count != 0 {
        parts.push(format!("COUNT={}", options.count));
    }
    if let Some(until) = &options.until {
        parts.push(format!("UNTIL={}", utc_token(until)));
    }
    push_list(&mut parts, "BYSETPOS", &options.by_set_pos);
    push_list(&mut parts, "BYMONTH", &options.by_month);
    push_list(&mut parts, "BYMONTHDAY", &options.by_month_day);
    push_list(&mut parts, "BYYEARDAY", &options.by_year_day);
    push_list(&mut parts, "BYWEEKNO", &options.by_week_no);
    push_list(&mut parts, "BYDAY", &options.by_weekday);
    push_list(&mut parts, "BYHOUR", &options.by_hour);
    push_list(&mut parts, "BYMINUTE", &options.by_minute);
    push_list(&mut parts, "BYSECOND", &options.by_second);
    push_list(&mut parts, "BYEASTER", &options.by_easter);
    parts.join(";")
}

/// Renders the rule value only, without the start.
impl fmt::Display for RuleOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&value_line(self, false))
    }
}

/// Renders a `DTSTART` line (if the rule was given a start) followed by the value.
impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let options = self.options();
        if let Some(start) = &options.dtstart {
            writeln!(f, "DTSTART{}", start_suffix(start))?;
        }
        f.write_str(&value_line(options, false))
    }
}

fn parse_ints(key: &str, value: &str) -> Result<Vec<i32>> {
    value
        .split(',')
        .map(|v| {
            v.parse::<i32>()
                .map_err(|_| RecurError::Parse(format!("invalid {key} value: {v}")))
        })
        .collect()
}

/// Parse a single `FREQ=...;...` value, reading local tokens in `tz`.
fn parse_value(value: &str, tz: Tz) -> Result<RuleOptions> {
    let value = value.trim().to_ascii_uppercase();
    if value.is_empty() {
        return Err(RecurError::Parse("empty rule".to_string()));
    }

    let mut options = RuleOptions::default();
    let mut saw_freq = false;
    for attr in value.split(';') {
        let mut kv = attr.split('=');
        let (Some(key), Some(v), None) = (kv.next(), kv.next(), kv.next()) else {
            return Err(RecurError::Parse(format!("malformed rule part: {attr}")));
        };
        if v.is_empty() {
            return Err(RecurError::Parse(format!("{key} has no value")));
        }
        match key {
            "FREQ" => {
                options.freq = v.parse()?;
                saw_freq = true;
            }
            "DTSTART" => options.dtstart = Some(parse_datetime(v, tz)?),
            "INTERVAL" => {
                options.interval = v
                    .parse()
                    .map_err(|_| RecurError::Parse(format!("invalid INTERVAL value: {v}")))?;
            }
            "WKST" => {
                options.week_start = parse_weekday_code(v)
                    .ok_or_else(|| RecurError::Parse(format!("unknown weekday: {v}")))?;
            }
            "COUNT" => {
                options.count = v
                    .parse()
                    .map_err(|_| RecurError::Parse(format!("invalid COUNT value: {v}")))?;
            }
            "UNTIL" => options.until = Some(parse_datetime(v, tz)?),
            "BYSETPOS" => options.by_set_pos = parse_ints(key, v)?,
            "BYMONTH" => options.by_month = parse_ints(key, v)?,
            "BYMONTHDAY" => options.by_month_day = parse_ints(key, v)?,
            "BYYEARDAY" => options.by_year_day = parse_ints(key, v)?,
            "BYWEEKNO" => options.by_week_no = parse_ints(key, v)?,
            "BYDAY" => {
                options.by_weekday = v.split(',').map(str::parse).collect::<Result<_>>()?;
            }
            "BYHOUR" => options.by_hour = parse_ints(key, v)?,
            "BYMINUTE" => options.by_minute = parse_ints(key, v)?,
            "BYSECOND" => options.by_second = parse_ints(key, v)?,
            "BYEASTER" => options.by_easter = parse_ints(key, v)?,
            other => return Err(RecurError::UnsupportedProperty(other.to_string())),
        }
    }

    if !saw_freq {
        return Err(RecurError::Parse("FREQ is required".to_string()));
    }
    Ok(options)
}

// ── Content lines ───────────────────────────────────────────────────────────

/// A content line split into its upper-cased property name and the rest.
///
/// `rest` starts after the `;` or `:` that ends the name.
fn split_line(line: &str) -> Result<(String, &str)> {
    let bad = || RecurError::Parse(format!("bad line format: {line}"));
    let end = line.find([';', ':']).ok_or_else(bad)?;
    let name = &line[..end];
    if name.is_empty() || name.contains('=') {
        return Err(bad());
    }
    Ok((name.to_ascii_uppercase(), &line[end + 1..]))
}

/// Parse what follows `DTSTART` on its line: `:<token>` or `;TZID=<zone>:<token>`.
fn parse_start(rest: &str) -> Result<DateTime<Tz>> {
    let mut parts = rest.split(':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(token), None, None) => parse_datetime(token, Tz::UTC),
        (Some(tzid), Some(token), None) => parse_datetime(token, parse_tzid(tzid)?),
        _ => Err(RecurError::Parse(format!("bad DTSTART format: {rest}"))),
    }
}

fn lines(input: &str) -> impl Iterator<Item = &str> {
    input.lines().map(str::trim).filter(|l| !l.is_empty())
}

/// Parse rule options from a bare value or from `DTSTART` / `RRULE` lines.
///
/// Runs [`RuleOptions::validate`] before returning.
///
/// # Errors
///
/// Returns a parse error for malformed text, or the validation error for
/// out-of-range values.
#[tracing::instrument(skip(input), fields(input_len = input.len()))]
pub fn parse_rule_options(input: &str) -> Result<RuleOptions> {
    parse_rule_options_in(input, Tz::UTC)
}

/// Like [`parse_rule_options`], reading local date-times without a `TZID` in `tz`.
pub fn parse_rule_options_in(input: &str, tz: Tz) -> Result<RuleOptions> {
    let mut start = None;
    let mut options = None;

    for line in lines(input) {
        // A bare value such as `FREQ=DAILY;COUNT=3` has no property name.
        let (name, rest) = match split_line(line) {
            Ok(split) => split,
            Err(_) if line.contains('=') => ("RRULE".to_string(), line),
            Err(e) => return Err(e),
        };
        match name.as_str() {
            "DTSTART" if start.is_none() => start = Some(parse_start(rest)?),
            "RRULE" if options.is_none() => {
                let zone = start.as_ref().map_or(tz, DateTime::timezone);
                options = Some(parse_value(rest, zone)?);
            }
            "DTSTART" | "RRULE" => {
                return Err(RecurError::Parse(format!("duplicate {name} line")));
            }
            _ => return Err(RecurError::UnsupportedProperty(name)),
        }
    }

    let mut options = options.ok_or_else(|| RecurError::Parse("empty rule".to_string()))?;
    if start.is_some() {
        options.dtstart = start;
    }
    options.validate()?;
    Ok(options)
}

/// Parse and compile a rule.
///
/// Accepts a bare value (`FREQ=WEEKLY;BYDAY=MO`), an `RRULE:` line, and either of
/// those preceded by a `DTSTART` line.
///
/// # Errors
///
/// See [`parse_rule_options`].
#[tracing::instrument(skip(input), fields(input_len = input.len()))]
pub fn parse_rule(input: &str) -> Result<Rule> {
    Rule::new(parse_rule_options_in(input, Tz::UTC)?)
}

impl FromStr for Rule {
    type Err = RecurError;

    fn from_str(s: &str) -> Result<Self> {
        parse_rule(s)
    }
}

/// Parse the value of an `RDATE`/`EXDATE` property.
///
/// Accepts `<token>,<token>,...` optionally preceded by `VALUE=DATE-TIME`,
/// `VALUE=DATE` and/or `TZID=<zone>` parameters and a `:`.
///
/// # Errors
///
/// Returns [`RecurError::UnsupportedProperty`] for any other parameter, and a
/// parse or date-time error for malformed values.
#[tracing::instrument(skip(input), fields(input_len = input.len()))]
pub fn parse_dates(input: &str) -> Result<Vec<DateTime<Tz>>> {
    parse_dates_in(input, Tz::UTC)
}

/// Like [`parse_dates`], reading local date-times without a `TZID` in `tz`.
pub fn parse_dates_in(input: &str, tz: Tz) -> Result<Vec<DateTime<Tz>>> {
    let mut parts = input.trim().split(':');
    let (params, values) = match (parts.next(), parts.next(), parts.next()) {
        (Some(values), None, None) => (None, values),
        (Some(params), Some(values), None) => (Some(params), values),
        _ => return Err(RecurError::Parse(format!("bad date list: {input}"))),
    };

    let mut zone = tz;
    for param in params.into_iter().flat_map(|p| p.split(';')) {
        if param.starts_with("TZID=") {
            zone = parse_tzid(param)?;
        } else if !matches!(param, "VALUE=DATE-TIME" | "VALUE=DATE") {
            return Err(RecurError::UnsupportedProperty(param.to_string()));
        }
    }

    values
        .split(',')
        .map(|token| parse_datetime(token.trim(), zone))
        .collect()
}

// ── Sets ────────────────────────────────────────────────────────────────────

impl RecurrenceSet {
    /// The set's content lines, in `DTSTART`, `RRULE`, `RDATE`, `EXRULE`, `EXDATE` order.
    ///
    /// Without a set-level start, member rules carry their own start inside the
    /// rule value.
    pub fn recurrence(&self) -> Vec<String> {
        let embed_start = self.start().is_none();
        let dates = |dates: &[DateTime<Tz>]| {
            dates.iter().map(utc_token).collect::<Vec<_>>().join(",")
        };

        let mut out = Vec::new();
        if let Some(start) = &self.start() {
            out.push(format!("DTSTART{}", start_suffix(start)));
        }
        for rule in self.rrules() {
            out.push(format!("RRULE:{}", value_line(rule.options(), embed_start)));
        }
        if !self.rdates().is_empty() {
            out.push(format!("RDATE:{}", dates(self.rdates())));
        }
        for rule in self.exrules() {
            out.push(format!("EXRULE:{}", value_line(rule.options(), embed_start)));
        }
        if !self.exdates().is_empty() {
            out.push(format!("EXDATE:{}", dates(self.exdates())));
        }
        out
    }
}

impl fmt::Display for RecurrenceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.recurrence().join("\n"))
    }
}

/// Parse a recurrence set from its content lines.
///
/// A `DTSTART` line, if present, must come first; it becomes the set's start and
/// the zone for local date-times on the following lines.
///
/// # Errors
///
/// Returns [`RecurError::UnsupportedProperty`] for properties other than
/// `DTSTART`, `RRULE`, `EXRULE`, `RDATE` and `EXDATE`, and the underlying error for
/// any malformed line.
#[tracing::instrument(skip(input), fields(input_len = input.len()))]
pub fn parse_set(input: &str) -> Result<RecurrenceSet> {
    let mut set = RecurrenceSet::new();
    let mut zone = Tz::UTC;
    let mut first = true;

    if input.trim().is_empty() {
        return Err(RecurError::Parse("empty recurrence set".to_string()));
    }

    for line in lines(input) {
        let (name, rest) = split_line(line)?;
        match name.as_str() {
            "DTSTART" if first => {
                let start = parse_start(rest)?;
                zone = start.timezone();
                set.set_start(start);
            }
            "RRULE" | "EXRULE" => {
                let mut options = parse_value(rest, zone)?;
                if let Some(start) = set.start() {
                    options.dtstart = Some(start);
                }
                let rule = Rule::new(options)?;
                if name == "RRULE" {
                    set.rrule(rule);
                } else {
                    set.exrule(rule);
                }
            }
            "RDATE" | "EXDATE" => {
                for dt in parse_dates_in(rest, zone)? {
                    if name == "RDATE" {
                        set.rdate(dt);
                    } else {
                        set.exdate(dt);
                    }
                }
            }
            _ => return Err(RecurError::UnsupportedProperty(name)),
        }
        first = false;
    }

    tracing::debug!(
        rrules = set.rrules().len(),
        rdates = set.rdates().len(),
        "Parsed recurrence set"
    );
    Ok(set)
}

impl FromStr for RecurrenceSet {
    type Err = RecurError;

    fn from_str(s: &str) -> Result<Self> {
        parse_set(s)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
