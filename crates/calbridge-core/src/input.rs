//! Normalization of loosely-typed tool arguments.
//!
//! Attendee and reminder arguments arrive in several client shapes (arrays,
//! comma-separated strings, wrapper objects). Each accepted shape is one
//! variant of a closed union; normalization is total and degrades an
//! unrecognized shape to "absent" instead of failing the call.
//!
//! Absent and empty are distinct: an absent reminder argument means "use
//! the calendar default", an explicitly empty one means "disable all
//! reminders". The same distinction holds for attendees in patches.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Parses one reminder token: a bare minute count, optionally suffixed
/// with a unit (`h` for hours, `m`/`min`/`mins`/`minute`/`minutes`).
static REMINDER_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\d+)\s*(h|m|min|mins|minute|minutes)?\s*$")
        .expect("invalid reminder token regex")
});

/// Accepted shapes for an attendee argument.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AttendeesInput {
    /// A sequence; string entries are kept, everything else is dropped.
    List(Vec<Value>),
    /// A comma-separated address string.
    Text(String),
    /// A wrapper object: `{}` means absent, an `emails` or `attendees`
    /// array supplies the list.
    Mapping(Map<String, Value>),
    /// Anything else normalizes to absent.
    Other(Value),
}

/// Accepted shapes for a reminder-minutes argument.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RemindersInput {
    /// A sequence of minute counts or suffixed tokens.
    List(Vec<Value>),
    /// A comma-separated token string.
    Text(String),
}

/// Normalizes an attendee argument to a list of email strings.
///
/// Blank entries are dropped and order is preserved. Duplicates are kept
/// as given; only reminders are deduplicated. Returns `None` when the
/// shape carries no attendee information at all.
pub fn normalize_attendees(input: &AttendeesInput) -> Option<Vec<String>> {
    match input {
        AttendeesInput::List(items) => Some(collect_emails(items)),
        AttendeesInput::Text(text) => Some(
            text.split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(String::from)
                .collect(),
        ),
        AttendeesInput::Mapping(map) => {
            if map.is_empty() {
                return None;
            }
            for key in ["emails", "attendees"] {
                if let Some(Value::Array(items)) = map.get(key) {
                    return Some(collect_emails(items));
                }
            }
            None
        }
        AttendeesInput::Other(_) => None,
    }
}

fn collect_emails(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(String::from)
        .collect()
}

/// Normalizes a reminder argument to sorted, deduplicated minute counts.
///
/// Tokens parse independently; an unparseable or negative token is
/// skipped, never fatal. The result is ascending and duplicate-free, so
/// normalization is idempotent.
pub fn normalize_reminder_minutes(input: &RemindersInput) -> Vec<u32> {
    let mut minutes: Vec<u32> = match input {
        RemindersInput::List(items) => items.iter().filter_map(reminder_value).collect(),
        RemindersInput::Text(text) => text.split(',').filter_map(parse_reminder_token).collect(),
    };
    minutes.sort_unstable();
    minutes.dedup();
    minutes
}

fn reminder_value(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => parse_reminder_token(s),
        _ => None,
    }
}

fn parse_reminder_token(token: &str) -> Option<u32> {
    let captures = REMINDER_TOKEN.captures(token)?;
    let amount: u32 = captures.get(1)?.as_str().parse().ok()?;
    let is_hours = captures
        .get(2)
        .is_some_and(|unit| unit.as_str().eq_ignore_ascii_case("h"));
    if is_hours {
        amount.checked_mul(60)
    } else {
        Some(amount)
    }
}
