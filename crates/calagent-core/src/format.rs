//! Plain-text rendering of events and calendars.
//!
//! These helpers produce the terminal lines printed by the CLI and the
//! detail block shared with the agent's `get_calendar_event` tool. Times are
//! shown in the offset the event carries, not converted to local time.

use chrono::Duration;

use crate::event::{Calendar, Event};
use crate::time::EventTime;

/// Formats a duration as `H:MM:SS`, prefixed with `N day(s), ` past 24 hours.
pub fn format_duration(duration: Duration) -> String {
    let negative = duration < Duration::zero();
    let total = duration.num_seconds().abs();

    let days = total / 86_400;
    let hours = (total % 86_400) / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    let sign = if negative { "-" } else { "" };
    match days {
        0 => format!("{sign}{hours}:{minutes:02}:{seconds:02}"),
        1 => format!("{sign}1 day, {hours}:{minutes:02}:{seconds:02}"),
        n => format!("{sign}{n} days, {hours}:{minutes:02}:{seconds:02}"),
    }
}

/// Formats one event as a single listing line.
///
/// Timed: `2025-10-09 14:00 - 15:00 (1:00:00) - Team Sync`.
/// All-day: `2025-10-09 (all day) - Offsite`.
pub fn event_line(event: &Event) -> String {
    match (&event.start, &event.end) {
        (EventTime::DateTime(start), EventTime::DateTime(end)) => {
            let duration = format_duration(*end - *start);
            format!(
                "{} - {} ({}) - {}",
                start.format("%Y-%m-%d %H:%M"),
                end.format("%H:%M"),
                duration,
                event.summary
            )
        }
        (start, _) => format!("{} (all day) - {}", start.date().format("%Y-%m-%d"), event.summary),
    }
}

/// Formats the full detail block of an event, one field per line.
///
/// Optional fields are omitted when absent.
pub fn event_details(event: &Event) -> String {
    let mut lines = vec![format!("Summary: {}", event.summary)];

    match &event.start {
        EventTime::DateTime(_) => {
            lines.push(format!("Start: {}", event.start));
            lines.push(format!("End: {}", event.end));
        }
        EventTime::AllDay(date) => {
            lines.push(format!("Date: {} (All-day)", date.format("%Y-%m-%d")));
        }
    }

    if let Some(description) = event.description.as_deref().filter(|d| !d.is_empty()) {
        lines.push(format!("Description: {}", description));
    }
    if let Some(location) = event.location.as_deref().filter(|l| !l.is_empty()) {
        lines.push(format!("Location: {}", location));
    }
    if !event.attendees.is_empty() {
        lines.push(format!("Attendees: {}", event.attendees.join(", ")));
    }
    if let Some(link) = &event.html_link {
        lines.push(format!("Link: {}", link));
    }
    lines.push(format!("ID: {}", event.id));

    lines.join("\n")
}

/// Formats a calendar as `- Name (ID: id)`, marking the primary one.
pub fn calendar_line(calendar: &Calendar) -> String {
    let primary = if calendar.primary { " [primary]" } else { "" };
    format!("- {} (ID: {}){}", calendar.summary, calendar.id, primary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_event_time;

    fn at(s: &str) -> EventTime {
        parse_event_time(s).unwrap()
    }

    #[test]
    fn duration_like_timedelta() {
        assert_eq!(format_duration(Duration::minutes(30)), "0:30:00");
        assert_eq!(format_duration(Duration::hours(1)), "1:00:00");
        assert_eq!(format_duration(Duration::hours(26)), "1 day, 2:00:00");
        assert_eq!(format_duration(Duration::hours(49)), "2 days, 1:00:00");
        assert_eq!(format_duration(Duration::seconds(-90)), "-0:01:30");
    }

    #[test]
    fn timed_event_line() {
        let event = Event::new(
            "evt1",
            "Team Sync",
            at("2025-10-09T14:00:00"),
            at("2025-10-09T15:00:00"),
        );
        assert_eq!(
            event_line(&event),
            "2025-10-09 14:00 - 15:00 (1:00:00) - Team Sync"
        );
    }

    #[test]
    fn timed_event_line_keeps_event_offset() {
        let event = Event::new(
            "evt1",
            "Standup",
            at("2025-10-09T09:15:00-04:00"),
            at("2025-10-09T09:30:00-04:00"),
        );
        assert_eq!(
            event_line(&event),
            "2025-10-09 09:15 - 09:30 (0:15:00) - Standup"
        );
    }

    #[test]
    fn all_day_event_line() {
        let event = Event::new("evt2", "Offsite", at("2025-10-09"), at("2025-10-10"));
        assert_eq!(event_line(&event), "2025-10-09 (all day) - Offsite");
    }

    #[test]
    fn details_block() {
        let event = Event::new(
            "evt1",
            "Team Sync",
            at("2025-10-09T14:00:00"),
            at("2025-10-09T15:00:00"),
        )
        .with_description("Weekly planning")
        .with_location("Room 4")
        .with_attendees(vec!["a@example.com".into(), "b@example.com".into()]);

        insta::assert_snapshot!(event_details(&event), @r"
        Summary: Team Sync
        Start: 2025-10-09T14:00:00+00:00
        End: 2025-10-09T15:00:00+00:00
        Description: Weekly planning
        Location: Room 4
        Attendees: a@example.com, b@example.com
        ID: evt1
        ");
    }

    #[test]
    fn details_block_all_day_without_optionals() {
        let event = Event::new("evt2", "Offsite", at("2025-10-09"), at("2025-10-10"))
            .with_description("");
        assert_eq!(
            event_details(&event),
            "Summary: Offsite\nDate: 2025-10-09 (All-day)\nID: evt2"
        );
    }

    #[test]
    fn calendar_lines() {
        let mut calendar = Calendar::new("primary", "Personal");
        calendar.primary = true;
        assert_eq!(calendar_line(&calendar), "- Personal (ID: primary) [primary]");
        assert_eq!(
            calendar_line(&Calendar::new("team@example.com", "Team")),
            "- Team (ID: team@example.com)"
        );
    }
}
