//! Recurrence-rule rewriting for series splits.
//!
//! Splitting a series "from this instance on" trims the original series by
//! bounding its first `RRULE:` line with an `UNTIL=` clause one second
//! before the split point. Everything here is pure string and clock
//! arithmetic; the two remote mutations live with the backend.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Prefix of a frequency rule line.
const RRULE_PREFIX: &str = "RRULE:";

/// Errors from recurrence rewriting.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RruleError {
    /// The recurrence list has no `RRULE:` line, so there is no series to
    /// trim.
    #[error("recurrence has no RRULE line; not a recurring series")]
    MissingRrule,
}

/// Formats a UTC instant as an RRULE `UNTIL` value (`YYYYMMDDThhmmssZ`).
pub fn format_until(instant: DateTime<Utc>) -> String {
    instant.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Trims a recurrence so it ends just before `split_start`.
///
/// The first `RRULE:` line loses any existing `UNTIL=` / `COUNT=` clause
/// and gains `UNTIL=<split_start - 1s, UTC compact>`. All other lines
/// (`EXDATE:` and friends) pass through unchanged. Fails when no `RRULE:`
/// line exists.
pub fn rewrite_until(
    recurrence: &[String],
    split_start: DateTime<Utc>,
) -> Result<Vec<String>, RruleError> {
    let until = format_until(split_start - Duration::seconds(1));

    let mut rewrote = false;
    let mut result = Vec::with_capacity(recurrence.len());
    for line in recurrence {
        if !rewrote && line.starts_with(RRULE_PREFIX) {
            result.push(bound_rule(line, &until));
            rewrote = true;
        } else {
            result.push(line.clone());
        }
    }

    if rewrote {
        Ok(result)
    } else {
        Err(RruleError::MissingRrule)
    }
}

/// Rebuilds one `RRULE:` line with the terminating clause replaced.
fn bound_rule(line: &str, until: &str) -> String {
    let body = &line[RRULE_PREFIX.len()..];
    let mut parts: Vec<&str> = body
        .split(';')
        .filter(|part| !part.is_empty() && !is_termination_clause(part))
        .collect();
    let until_clause = format!("UNTIL={until}");
    parts.push(&until_clause);
    format!("{RRULE_PREFIX}{}", parts.join(";"))
}

fn is_termination_clause(part: &str) -> bool {
    let upper = part.get(..6).map(|p| p.to_ascii_uppercase());
    matches!(upper.as_deref(), Some("UNTIL=") | Some("COUNT="))
}
