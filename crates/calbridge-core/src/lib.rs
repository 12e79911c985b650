//! Core types: calendars, events, input normalization, recurrence rewriting

pub mod event;
pub mod input;
pub mod rrule;
pub mod time;
pub mod tracing;

pub use event::{CalendarInfo, EventView};
pub use input::{
    AttendeesInput, RemindersInput, normalize_attendees, normalize_reminder_minutes,
};
pub use rrule::{RruleError, format_until, rewrite_until};
pub use time::{
    TimePayload, TimePayloadError, add_duration, build_all_day, build_timed, has_time,
    parse_timestamp, time_value,
};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
