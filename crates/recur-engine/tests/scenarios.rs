// End-to-end expansion of rules and sets given as RFC 5545 text.

use chrono::{DateTime, TimeZone, Timelike};
use chrono_tz::Tz;
use recur_engine::{parse_rule, parse_set};

fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Tz> {
    Tz::UTC.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

#[test_log::test]
fn test_daily_count() {
    let rule = parse_rule("DTSTART:19970902T090000Z\nRRULE:FREQ=DAILY;COUNT=10").unwrap();
    let all = rule.all();
    assert_eq!(all.len(), 10);
    assert_eq!(all[0], utc(1997, 9, 2, 9));
    assert_eq!(all[9], utc(1997, 9, 11, 9));
    assert!(all.iter().all(|dt| dt.hour() == 9));
}

#[test_log::test]
fn test_last_day_of_month() {
    let rule =
        parse_rule("DTSTART:19970902T090000Z\nRRULE:FREQ=MONTHLY;BYMONTHDAY=-1;COUNT=3").unwrap();
    assert_eq!(
        rule.all(),
        vec![utc(1997, 9, 30, 9), utc(1997, 10, 31, 9), utc(1997, 11, 30, 9)]
    );
}

#[test_log::test]
fn test_week_one_begins_in_previous_year() {
    let rule =
        parse_rule("DTSTART:19970902T090000Z\nRRULE:FREQ=WEEKLY;BYWEEKNO=1;BYDAY=MO").unwrap();
    assert_eq!(rule.iter().next(), Some(utc(1997, 12, 29, 9)));
}

#[test_log::test]
fn test_spring_forward_gap_is_skipped() {
    let rule =
        parse_rule("DTSTART;TZID=Australia/Sydney:20221002T010000\nRRULE:FREQ=HOURLY;COUNT=3")
            .unwrap();
    let local: Vec<u32> = rule.iter().map(|dt| dt.hour()).collect();
    assert_eq!(local, vec![1, 3, 4]);

    let all = rule.all();
    assert_eq!(all[1] - all[0], chrono::TimeDelta::hours(1));
    assert_eq!(all[2] - all[1], chrono::TimeDelta::hours(1));
}

#[test_log::test]
fn test_set_with_redundant_date() {
    let set = parse_set(
        "RRULE:FREQ=DAILY;DTSTART=19970902T090000Z;COUNT=7\n\
         RDATE:19970907T090000Z\n\
         EXDATE:19970916T090000Z",
    )
    .unwrap();
    let all = set.all();
    assert_eq!(all.len(), 7);
    assert_eq!(all.iter().filter(|dt| **dt == utc(1997, 9, 7, 9)).count(), 1);
}

#[test_log::test]
fn test_fall_back_uses_first_instant() {
    let rule =
        parse_rule("DTSTART;TZID=America/New_York:20241102T013000\nRRULE:FREQ=DAILY;COUNT=2")
            .unwrap();
    let all = rule.all();
    // 01:30 happens twice on 2024-11-03; the EDT one comes first.
    assert_eq!(all[1].naive_utc(), utc(2024, 11, 3, 5).naive_utc() + chrono::TimeDelta::minutes(30));
}

#[test_log::test]
fn test_hourly_fall_back_keeps_one_instant_per_wall_clock_hour() {
    let rule =
        parse_rule("DTSTART;TZID=Australia/Sydney:20220403T010000\nRRULE:FREQ=HOURLY;COUNT=3")
            .unwrap();
    let all = rule.all();

    let local: Vec<u32> = all.iter().map(|dt| dt.hour()).collect();
    assert_eq!(local, vec![1, 2, 3]);

    // 02:00 repeats at the end of AEDT; only the AEDT instant is kept, so the
    // 02:00 AEST hour (16:00 UTC) never appears.
    assert_eq!(all[0], utc(2022, 4, 2, 14));
    assert_eq!(all[1], utc(2022, 4, 2, 15));
    assert_eq!(all[2], utc(2022, 4, 2, 17));
    assert!(!all.contains(&utc(2022, 4, 2, 16)));
}
