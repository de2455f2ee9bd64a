//! recur: expand and normalize RFC 5545 recurrence rules from the command line.
//!
//! Usage:
//!   recur expand 'DTSTART:19970902T090000Z\nRRULE:FREQ=DAILY;COUNT=10'
//!   recur expand --after 2024-01-01T00:00:00Z --limit 5 'FREQ=WEEKLY;BYDAY=MO'
//!   echo 'FREQ=MONTHLY;BYMONTHDAY=-1' | recur normalize

use std::io::Read;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use serde::Serialize;

use recur_engine::{parse_rule, parse_set, RecurrenceSet, Rule};

// ── CLI ─────────────────────────────────────────────────────────────

/// Expand and normalize RFC 5545 recurrence rules and sets.
#[derive(Parser, Debug)]
#[command(name = "recur", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the occurrences of a rule or set, one RFC 3339 instant per line.
    Expand {
        /// Rule or set text; `\n` separates lines. Reads stdin when omitted or `-`.
        rule: Option<String>,

        /// Maximum number of occurrences to print; 0 prints all of them.
        #[arg(long, default_value_t = 100)]
        limit: usize,

        /// Only print occurrences after this RFC 3339 instant.
        #[arg(long)]
        after: Option<DateTime<FixedOffset>>,

        /// Only print occurrences before this RFC 3339 instant.
        #[arg(long)]
        before: Option<DateTime<FixedOffset>>,

        /// Keep occurrences equal to `--after` or `--before`.
        #[arg(long)]
        inclusive: bool,

        /// Print a JSON object with the normalized rule and its occurrences.
        #[arg(long)]
        json: bool,
    },

    /// Print the canonical text of a rule or set.
    Normalize {
        /// Rule or set text; `\n` separates lines. Reads stdin when omitted or `-`.
        rule: Option<String>,
    },
}

// ── Input ───────────────────────────────────────────────────────────

enum Recurrence {
    Rule(Rule),
    Set(RecurrenceSet),
}

impl Recurrence {
    /// Sets are recognized by their exclusion or date lines, or by several rules.
    fn parse(text: &str) -> Result<Self> {
        let names: Vec<String> = text
            .lines()
            .filter_map(|line| {
                let line = line.trim();
                let end = line.find([';', ':'])?;
                Some(line[..end].to_ascii_uppercase())
            })
            .collect();
        let rrules = names.iter().filter(|n| *n == "RRULE").count();
        let is_set = rrules > 1
            || names
                .iter()
                .any(|n| matches!(n.as_str(), "RDATE" | "EXDATE" | "EXRULE"));

        if is_set {
            let set = parse_set(text).context("invalid recurrence set")?;
            Ok(Recurrence::Set(set))
        } else {
            let rule = parse_rule(text).context("invalid recurrence rule")?;
            Ok(Recurrence::Rule(rule))
        }
    }

    fn iter(&self) -> Box<dyn Iterator<Item = DateTime<Tz>> + '_> {
        match self {
            Recurrence::Rule(rule) => Box::new(rule.iter()),
            Recurrence::Set(set) => Box::new(set.iter()),
        }
    }

    fn text(&self) -> String {
        match self {
            Recurrence::Rule(rule) => rule.to_string(),
            Recurrence::Set(set) => set.to_string(),
        }
    }
}

fn read_input(arg: Option<String>) -> Result<String> {
    let raw = match arg.as_deref() {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read rule from stdin")?;
            buf
        }
        Some(text) => text.to_string(),
    };
    Ok(raw.replace("\\n", "\n"))
}

// ── Commands ────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Expansion {
    rule: String,
    occurrences: Vec<String>,
}

struct Window {
    after: Option<DateTime<FixedOffset>>,
    before: Option<DateTime<FixedOffset>>,
    inclusive: bool,
}

impl Window {
    fn is_early(&self, dt: &DateTime<Tz>) -> bool {
        match &self.after {
            Some(after) if self.inclusive => dt < after,
            Some(after) => dt <= after,
            None => false,
        }
    }

    fn is_late(&self, dt: &DateTime<Tz>) -> bool {
        match &self.before {
            Some(before) if self.inclusive => dt > before,
            Some(before) => dt >= before,
            None => false,
        }
    }
}

fn expand(recurrence: &Recurrence, window: &Window, limit: usize) -> Vec<DateTime<Tz>> {
    let limit = if limit == 0 { usize::MAX } else { limit };
    recurrence
        .iter()
        .skip_while(|dt| window.is_early(dt))
        .take_while(|dt| !window.is_late(dt))
        .take(limit)
        .collect()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Expand {
            rule,
            limit,
            after,
            before,
            inclusive,
            json,
        } => {
            let recurrence = Recurrence::parse(&read_input(rule)?)?;
            let window = Window {
                after,
                before,
                inclusive,
            };
            let occurrences = expand(&recurrence, &window, limit);
            tracing::debug!(count = occurrences.len(), limit, "Expanded recurrence");

            if json {
                let out = Expansion {
                    rule: recurrence.text(),
                    occurrences: occurrences.iter().map(DateTime::to_rfc3339).collect(),
                };
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                for dt in occurrences {
                    println!("{}", dt.to_rfc3339());
                }
            }
        }
        Command::Normalize { rule } => {
            let recurrence = Recurrence::parse(&read_input(rule)?)?;
            println!("{}", recurrence.text());
        }
    }

    Ok(())
}
