//! Recurrence sets: several rules and explicit dates combined, minus exclusions.
//!
//! A [`RecurrenceSet`] is built with the append operations and then iterated. Its
//! [`SetIter`] merges every inclusion source into one ascending stream, drops
//! instants produced by more than one source, and removes any instant that an
//! exclusion rule or exclusion date also produces.

use chrono::{DateTime, SubsecRound, TimeZone};
use chrono_tz::Tz;

use crate::query;
use crate::rule::Rule;

/// Rules and dates combined into one recurrence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecurrenceSet {
    rrules: Vec<Rule>,
    rdates: Vec<DateTime<Tz>>,
    exrules: Vec<Rule>,
    exdates: Vec<DateTime<Tz>>,
    dtstart: Option<DateTime<Tz>>,
}

impl RecurrenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an inclusion rule. If the set has a start, the rule is moved onto it.
    pub fn rrule(&mut self, rule: Rule) -> &mut Self {
        let rule = self.align(rule);
        self.rrules.push(rule);
        self
    }

    /// Add an explicit occurrence.
    pub fn rdate(&mut self, dt: DateTime<Tz>) -> &mut Self {
        self.rdates.push(dt);
        self
    }

    /// Add an exclusion rule. If the set has a start, the rule is moved onto it.
    pub fn exrule(&mut self, rule: Rule) -> &mut Self {
        let rule = self.align(rule);
        self.exrules.push(rule);
        self
    }

    /// Add an explicitly excluded instant.
    pub fn exdate(&mut self, dt: DateTime<Tz>) -> &mut Self {
        self.exdates.push(dt);
        self
    }

    /// Set the start of the set and of every member rule, truncated to whole seconds.
    pub fn set_start(&mut self, start: DateTime<Tz>) -> &mut Self {
        let start = start.trunc_subsecs(0);
        self.dtstart = Some(start);
        for rule in self.rrules.iter_mut().chain(self.exrules.iter_mut()) {
            *rule = rule.with_start(start);
        }
        self
    }

    fn align(&self, rule: Rule) -> Rule {
        match self.dtstart {
            Some(start) => rule.with_start(start),
            None => rule,
        }
    }

    pub fn rrules(&self) -> &[Rule] {
        &self.rrules
    }

    pub fn rdates(&self) -> &[DateTime<Tz>] {
        &self.rdates
    }

    pub fn exrules(&self) -> &[Rule] {
        &self.exrules
    }

    pub fn exdates(&self) -> &[DateTime<Tz>] {
        &self.exdates
    }

    /// The set's own start, if one was given.
    pub fn start(&self) -> Option<DateTime<Tz>> {
        self.dtstart
    }

    /// A fresh cursor over the set's occurrences.
    pub fn iter(&self) -> SetIter<'_> {
        SetIter::new(self)
    }

    /// Every occurrence. Only terminates quickly when every inclusion rule is bounded.
    pub fn all(&self) -> Vec<DateTime<Tz>> {
        self.iter().collect()
    }

    /// Occurrences between `after` and `before`; bounds kept only when `inclusive`.
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

impl<'a> IntoIterator for &'a RecurrenceSet {
    type Item = DateTime<Tz>;
    type IntoIter = SetIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ── Merge ───────────────────────────────────────────────────────────────────

type Source<'a> = Box<dyn Iterator<Item = DateTime<Tz>> + 'a>;

/// Ascending k-way merge; each source must itself be ascending.
struct Merge<'a> {
    /// Current head of every live source, smallest first.
    heads: Vec<(DateTime<Tz>, Source<'a>)>,
}

impl<'a> Merge<'a> {
    fn new(dates: &[DateTime<Tz>], rules: &'a [Rule]) -> Self {
        let mut sorted = dates.to_vec();
        sorted.sort();
        let sources = std::iter::once(Box::new(sorted.into_iter()) as Source<'a>)
            .chain(rules.iter().map(|rule| Box::new(rule.iter()) as Source<'a>));

        let mut merge = Self { heads: Vec::new() };
        for source in sources {
            merge.push(source);
        }
        merge
    }

    /// Pull the first value of `source` and slot it in by its head.
    fn push(&mut self, mut source: Source<'a>) {
        if let Some(head) = source.next() {
            let at = self.heads.partition_point(|(dt, _)| *dt <= head);
            self.heads.insert(at, (head, source));
        }
    }

    fn peek(&self) -> Option<DateTime<Tz>> {
        self.heads.first().map(|(dt, _)| *dt)
    }

    /// Remove the smallest head and advance its source.
    fn pop(&mut self) -> Option<DateTime<Tz>> {
        if self.heads.is_empty() {
            return None;
        }
        let (head, source) = self.heads.remove(0);
        self.push(source);
        Some(head)
    }
}

// ── SetIter ─────────────────────────────────────────────────────────────────

/// Single-pass cursor over a [`RecurrenceSet`], in ascending order without duplicates.
pub struct SetIter<'a> {
    include: Merge<'a>,
    exclude: Merge<'a>,
    last: Option<DateTime<Tz>>,
}

impl std::fmt::Debug for SetIter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetIter")
            .field("next_include", &self.include.peek())
            .field("next_exclude", &self.exclude.peek())
            .field("last", &self.last)
            .finish()
    }
}

impl<'a> SetIter<'a> {
    fn new(set: &'a RecurrenceSet) -> Self {
        tracing::debug!(
            rrules = set.rrules.len(),
            rdates = set.rdates.len(),
            exrules = set.exrules.len(),
            exdates = set.exdates.len(),
            "Starting recurrence set iteration"
        );
        Self {
            include: Merge::new(&set.rdates, &set.rrules),
            exclude: Merge::new(&set.exdates, &set.exrules),
            last: None,
        }
    }
}

impl Iterator for SetIter<'_> {
    type Item = DateTime<Tz>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(dt) = self.include.pop() {
            if self.last == Some(dt) {
                continue;
            }
            self.last = Some(dt);
            while self.exclude.peek().is_some_and(|ex| ex < dt) {
                self.exclude.pop();
            }
            if self.exclude.peek() != Some(dt) {
                return Some(dt);
            }
        }
        None
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
