//! Core types: events, calendars, time parsing, formatting, tracing

pub mod event;
pub mod format;
pub mod time;
pub mod tracing;

pub use event::{Calendar, DraftError, Event, EventDraft, EventPatch};
pub use format::{calendar_line, event_details, event_line, format_duration};
pub use time::{EventTime, TimeParseError, parse_event_time, parse_instant};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
