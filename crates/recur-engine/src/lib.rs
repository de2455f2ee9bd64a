//! # recur-engine
//!
//! Deterministic RFC 5545 recurrence expansion.
//!
//! A [`Rule`] is compiled once from a validated [`RuleOptions`] record and then
//! expanded lazily into timezone-aware instants. A [`RecurrenceSet`] combines
//! several rules and explicit dates, minus exclusion rules and exclusion dates.
//!
//! ## Modules
//!
//! - [`options`]: the configuration record and its validation
//! - [`rule`]: compiled rules and their queries
//! - [`iter`]: the occurrence generator behind [`Rule::iter`]
//! - [`set`]: recurrence sets and their merged iteration
//! - [`text`]: `RRULE`/`RDATE`/`EXRULE`/`EXDATE`/`DTSTART` parsing and rendering
//! - [`error`]: error types
//!
//! ## Example
//!
//! ```
//! use chrono::TimeZone;
//! use chrono_tz::Tz;
//! use recur_engine::{Frequency, Rule, RuleOptions};
//!
//! let rule = Rule::new(RuleOptions {
//!     freq: Frequency::Monthly,
//!     count: 3,
//!     by_month_day: vec![-1],
//!     dtstart: Some(Tz::UTC.with_ymd_and_hms(1997, 9, 2, 9, 0, 0).unwrap()),
//!     ..Default::default()
//! })
//! .unwrap();
//!
//! let days: Vec<String> = rule.iter().map(|dt| dt.format("%m-%d").to_string()).collect();
//! assert_eq!(days, ["09-30", "10-31", "11-30"]);
//! ```

mod calendar;
mod context;
pub mod error;
pub mod iter;
pub mod options;
mod query;
pub mod rule;
pub mod set;
pub mod text;

pub use calendar::{easter, MAX_YEAR};
pub use error::{RecurError, Result};
pub use iter::RuleIter;
pub use options::{Frequency, NthWeekday, RuleOptions};
pub use rule::Rule;
pub use set::{RecurrenceSet, SetIter};
pub use text::{parse_dates, parse_rule, parse_rule_options, parse_set};
