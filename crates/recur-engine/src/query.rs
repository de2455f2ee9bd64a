//! Window queries shared by [`Rule`](crate::Rule) and
//! [`RecurrenceSet`](crate::RecurrenceSet).
//!
//! Each helper consumes an ascending occurrence stream and stops pulling as soon as
//! the answer is known, so they are safe to use on unbounded rules as long as the
//! window itself is bounded.

use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;

/// Occurrences between `after` and `before`, bounds kept only when `inclusive`.
pub(crate) fn between<I, T>(
    occurrences: I,
    after: &DateTime<T>,
    before: &DateTime<T>,
    inclusive: bool,
) -> Vec<DateTime<Tz>>
where
    I: Iterator<Item = DateTime<Tz>>,
    T: TimeZone,
{
    occurrences
        .take_while(|dt| if inclusive { dt <= before } else { dt < before })
        .filter(|dt| if inclusive { dt >= after } else { dt > after })
        .collect()
}

/// The last occurrence before `dt`; at `dt` counts when `inclusive`.
pub(crate) fn before<I, T>(occurrences: I, dt: &DateTime<T>, inclusive: bool) -> Option<DateTime<Tz>>
where
    I: Iterator<Item = DateTime<Tz>>,
    T: TimeZone,
{
    occurrences
        .take_while(|v| if inclusive { v <= dt } else { v < dt })
        .last()
}

/// The first occurrence after `dt`; at `dt` counts when `inclusive`.
pub(crate) fn after<I, T>(mut occurrences: I, dt: &DateTime<T>, inclusive: bool) -> Option<DateTime<Tz>>
where
    I: Iterator<Item = DateTime<Tz>>,
    T: TimeZone,
{
    occurrences.find(|v| if inclusive { v >= dt } else { v > dt })
}
