//! Calendar operations exposed as model tools.

use std::future::Future;
use std::sync::Arc;

use calagent_core::{
    Calendar, Event, EventDraft, EventPatch, EventTime, TimeParseError, event_details,
    parse_event_time, parse_instant,
};
use calagent_providers::{
    BoxFuture, CalendarProvider, DEFAULT_MAX_RESULTS, ListQuery, PRIMARY_CALENDAR, SearchQuery,
};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use super::{Property, ToolHandler, ToolRegistry, ToolSchema};

/// Builds the registry of calendar tools backed by `provider`.
pub fn calendar_tools(provider: Arc<dyn CalendarProvider>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(
        ToolSchema::new(
            "get_current_time",
            "Gets the current date and time in UTC. Use this before working out relative \
             dates such as 'tomorrow', 'next week' or 'today'.",
        ),
        handler(&provider, "get_current_time", get_current_time),
    );

    registry.register(
        ToolSchema::new(
            "list_calendar_events",
            "Lists the next upcoming events on the user's calendar, soonest first. Use this \
             when the user asks about their schedule. Returns summaries, dates, times and IDs.",
        )
        .optional(
            "max_results",
            Property::integer("The maximum number of events to return (default 10)"),
        )
        .optional(
            "calendar_id",
            Property::string("The ID of the calendar to list events from (default 'primary')"),
        ),
        handler(&provider, "list_calendar_events", list_calendar_events),
    );

    registry.register(
        ToolSchema::new(
            "search_calendar_events",
            "Searches the user's calendar for events matching a keyword. Use this when the \
             user asks to find specific events or meetings.",
        )
        .required(
            "query",
            Property::string("The text to search for in event titles and descriptions"),
        )
        .optional(
            "max_results",
            Property::integer("The maximum number of events to return (default 10)"),
        )
        .optional(
            "calendar_id",
            Property::string("The ID of the calendar to search in (default 'primary')"),
        )
        .optional(
            "start_time",
            Property::string("Only events ending after this ISO-8601 time (default now)"),
        )
        .optional(
            "end_time",
            Property::string("Only events starting before this ISO-8601 time"),
        ),
        handler(&provider, "search_calendar_events", search_calendar_events),
    );

    registry.register(
        ToolSchema::new(
            "get_calendar_event",
            "Gets the details of a specific calendar event. Requires the event ID, which \
             list_calendar_events and search_calendar_events return.",
        )
        .required("event_id", Property::string("The ID of the event to retrieve"))
        .optional(
            "calendar_id",
            Property::string("The ID of the calendar (default 'primary')"),
        ),
        handler(&provider, "get_calendar_event", get_calendar_event),
    );

    registry.register(
        ToolSchema::new(
            "create_calendar_event",
            "Creates a new event on the user's calendar. Times are ISO-8601; a bare date \
             such as 2025-10-09 creates an all-day event.",
        )
        .required("summary", Property::string("The title of the event"))
        .required(
            "start_time",
            Property::string("Start time in ISO-8601 (e.g. 2025-10-09T14:00:00)"),
        )
        .required(
            "end_time",
            Property::string("End time in ISO-8601 (e.g. 2025-10-09T15:00:00)"),
        )
        .optional("description", Property::string("Description of the event"))
        .optional("location", Property::string("Location of the event"))
        .optional(
            "attendees",
            Property::string_list("Email addresses of the attendees"),
        ),
        handler(&provider, "create_calendar_event", create_calendar_event),
    );

    registry.register(
        ToolSchema::new(
            "update_calendar_event",
            "Updates an existing event on the user's calendar. Only provide the fields that \
             need to change.",
        )
        .required("event_id", Property::string("The ID of the event to update"))
        .optional("summary", Property::string("New title of the event"))
        .optional("start_time", Property::string("New start time in ISO-8601"))
        .optional("end_time", Property::string("New end time in ISO-8601"))
        .optional("description", Property::string("New description of the event"))
        .optional("location", Property::string("New location of the event"))
        .optional(
            "attendees",
            Property::string_list("New list of attendee email addresses"),
        ),
        handler(&provider, "update_calendar_event", update_calendar_event),
    );

    registry.register(
        ToolSchema::new(
            "delete_calendar_event",
            "Deletes an event from the user's calendar. This cannot be undone.",
        )
        .required("event_id", Property::string("The ID of the event to delete")),
        handler(&provider, "delete_calendar_event", delete_calendar_event),
    );

    registry.register(
        ToolSchema::new(
            "get_calendars",
            "Lists all calendars the user has access to, with their IDs.",
        ),
        handler(&provider, "get_calendars", get_calendars),
    );

    registry
}

/// Wraps a typed tool function into a [`ToolHandler`] that decodes its
/// arguments and reports decoding failures as text.
fn handler<A, F, Fut>(provider: &Arc<dyn CalendarProvider>, name: &'static str, f: F) -> ToolHandler
where
    A: DeserializeOwned,
    F: Fn(Arc<dyn CalendarProvider>, A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = String> + Send + 'static,
{
    let provider = Arc::clone(provider);
    Arc::new(move |args: Value| -> BoxFuture<'static, String> {
        info!(tool = name, "tool call");
        debug!(tool = name, %args, "tool arguments");

        let args = if args.is_null() {
            Value::Object(Default::default())
        } else {
            args
        };
        match serde_json::from_value::<A>(args) {
            Ok(args) => Box::pin(f(Arc::clone(&provider), args)),
            Err(e) => {
                let observation = format!("Invalid arguments for {}: {}", name, e);
                Box::pin(async move { observation })
            }
        }
    })
}

#[derive(Debug, Deserialize)]
struct NoArgs {}

#[derive(Debug, Deserialize)]
struct ListArgs {
    max_results: Option<usize>,
    calendar_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    max_results: Option<usize>,
    calendar_id: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GetArgs {
    event_id: String,
    calendar_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateArgs {
    summary: String,
    start_time: String,
    end_time: String,
    description: Option<String>,
    location: Option<String>,
    attendees: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct UpdateArgs {
    event_id: String,
    summary: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    description: Option<String>,
    location: Option<String>,
    attendees: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct DeleteArgs {
    event_id: String,
}

/// Empty strings count as "not provided".
fn provided(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn calendar_or_primary(calendar_id: Option<String>) -> String {
    provided(calendar_id).unwrap_or_else(|| PRIMARY_CALENDAR.to_string())
}

fn parse_field(field: &str, value: &str) -> Result<EventTime, String> {
    parse_event_time(value).map_err(|e| time_error(field, e))
}

fn time_error(field: &str, err: TimeParseError) -> String {
    format!("{}: {}", field, err)
}

async fn get_current_time(_: Arc<dyn CalendarProvider>, _: NoArgs) -> String {
    format!(
        "Current date and time: {} (UTC)",
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, false)
    )
}

async fn list_calendar_events(provider: Arc<dyn CalendarProvider>, args: ListArgs) -> String {
    let query = ListQuery::new()
        .with_max_results(args.max_results.unwrap_or(DEFAULT_MAX_RESULTS))
        .with_calendar_id(calendar_or_primary(args.calendar_id));

    match provider.list_events(query).await {
        Ok(events) => render_upcoming(&events),
        Err(e) => format!("Error listing events: {}", e),
    }
}

async fn search_calendar_events(provider: Arc<dyn CalendarProvider>, args: SearchArgs) -> String {
    let mut query = SearchQuery::new(args.query.clone())
        .with_max_results(args.max_results.unwrap_or(DEFAULT_MAX_RESULTS))
        .with_calendar_id(calendar_or_primary(args.calendar_id));

    if let Some(start) = provided(args.start_time) {
        match parse_instant(&start) {
            Ok(start) => query = query.with_time_min(start),
            Err(e) => return format!("Error searching events: {}", time_error("start_time", e)),
        }
    }
    if let Some(end) = provided(args.end_time) {
        match parse_instant(&end) {
            Ok(end) => query = query.with_time_max(end),
            Err(e) => return format!("Error searching events: {}", time_error("end_time", e)),
        }
    }

    match provider.search_events(query).await {
        Ok(events) => render_matches(&args.query, &events),
        Err(e) => format!("Error searching events: {}", e),
    }
}

async fn get_calendar_event(provider: Arc<dyn CalendarProvider>, args: GetArgs) -> String {
    let calendar_id = calendar_or_primary(args.calendar_id);
    match provider.get_event(&args.event_id, &calendar_id).await {
        Ok(Some(event)) => event_details(&event),
        Ok(None) => format!("Event with ID {} not found.", args.event_id),
        Err(e) => format!("Error retrieving event: {}", e),
    }
}

async fn create_calendar_event(provider: Arc<dyn CalendarProvider>, args: CreateArgs) -> String {
    let draft = match build_draft(&args) {
        Ok(draft) => draft,
        Err(e) => return format!("Error creating event: {}", e),
    };

    match provider.create_event(draft, PRIMARY_CALENDAR).await {
        Ok(Some(event)) => format!(
            "Successfully created event '{}' from {} to {}.\nID: {}",
            args.summary, args.start_time, args.end_time, event.id
        ),
        Ok(None) => String::from(
            "Error creating event: the calendar service did not accept the event.",
        ),
        Err(e) => format!("Error creating event: {}", e),
    }
}

fn build_draft(args: &CreateArgs) -> Result<EventDraft, String> {
    let start = parse_field("start_time", &args.start_time)?;
    let end = parse_field("end_time", &args.end_time)?;

    let mut draft = EventDraft::new(args.summary.clone(), start, end);
    if let Some(description) = provided(args.description.clone()) {
        draft = draft.with_description(description);
    }
    if let Some(location) = provided(args.location.clone()) {
        draft = draft.with_location(location);
    }
    if let Some(attendees) = &args.attendees {
        draft = draft.with_attendees(attendees.clone());
    }
    draft.validate().map_err(|e| e.to_string())?;
    Ok(draft)
}

async fn update_calendar_event(provider: Arc<dyn CalendarProvider>, args: UpdateArgs) -> String {
    let event_id = args.event_id.clone();
    let patch = match build_patch(args) {
        Ok(patch) => patch,
        Err(e) => return format!("Error updating event: {}", e),
    };

    match provider
        .update_event(&event_id, patch, PRIMARY_CALENDAR)
        .await
    {
        Ok(Some(_)) => format!("Successfully updated event {}.", event_id),
        Ok(None) => format!(
            "Error updating event: event {} was not found or could not be updated.",
            event_id
        ),
        Err(e) => format!("Error updating event: {}", e),
    }
}

fn build_patch(args: UpdateArgs) -> Result<EventPatch, String> {
    let mut patch = EventPatch::new();
    if let Some(summary) = provided(args.summary) {
        patch = patch.with_summary(summary);
    }
    if let Some(start) = provided(args.start_time) {
        patch = patch.with_start(parse_field("start_time", &start)?);
    }
    if let Some(end) = provided(args.end_time) {
        patch = patch.with_end(parse_field("end_time", &end)?);
    }
    if let Some(description) = provided(args.description) {
        patch = patch.with_description(description);
    }
    if let Some(location) = provided(args.location) {
        patch = patch.with_location(location);
    }
    if let Some(attendees) = args.attendees {
        patch = patch.with_attendees(attendees);
    }
    patch.validate().map_err(|e| e.to_string())?;
    Ok(patch)
}

async fn delete_calendar_event(provider: Arc<dyn CalendarProvider>, args: DeleteArgs) -> String {
    match provider
        .delete_event(&args.event_id, PRIMARY_CALENDAR)
        .await
    {
        Ok(true) => format!("Successfully deleted event {}.", args.event_id),
        Ok(false) => format!(
            "Error deleting event: event {} could not be deleted.",
            args.event_id
        ),
        Err(e) => format!("Error deleting event: {}", e),
    }
}

async fn get_calendars(provider: Arc<dyn CalendarProvider>, _: NoArgs) -> String {
    match provider.list_calendars().await {
        Ok(calendars) => render_calendars(&calendars),
        Err(e) => format!("Error listing calendars: {}", e),
    }
}

fn render_upcoming(events: &[Event]) -> String {
    if events.is_empty() {
        return String::from("No upcoming events found.");
    }
    let mut blocks = vec![String::from("Upcoming events:\n")];
    blocks.extend(events.iter().map(|e| event_block(e, true)));
    blocks.join("\n")
}

fn render_matches(query: &str, events: &[Event]) -> String {
    if events.is_empty() {
        return format!("No events found matching '{}'.", query);
    }
    let mut blocks = vec![format!("Events matching '{}':\n", query)];
    blocks.extend(events.iter().map(|e| event_block(e, false)));
    blocks.join("\n")
}

fn render_calendars(calendars: &[Calendar]) -> String {
    if calendars.is_empty() {
        return String::from("No calendars found.");
    }
    calendars
        .iter()
        .map(|c| format!("- {} (ID: {})", c.summary, c.id))
        .collect::<Vec<_>>()
        .join("\n")
}

fn event_block(event: &Event, with_end: bool) -> String {
    match (&event.start, &event.end) {
        (EventTime::DateTime(start), end) => {
            let time = match end {
                EventTime::DateTime(end) if with_end => {
                    format!("{} - {}", start.format("%H:%M"), end.format("%H:%M"))
                }
                _ => start.format("%H:%M").to_string(),
            };
            format!(
                "• {}\n  Date: {}\n  Time: {}\n  ID: {}\n",
                event.summary,
                start.format("%A, %Y-%m-%d"),
                time,
                event.id
            )
        }
        (EventTime::AllDay(date), _) => format!(
            "• {}\n  Date: {} (All-day)\n  ID: {}\n",
            event.summary,
            date.format("%Y-%m-%d"),
            event.id
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(s: &str) -> EventTime {
        parse_event_time(s).unwrap()
    }

    fn team_sync() -> Event {
        Event::new(
            "evt1",
            "Team Sync",
            at("2025-10-09T14:00:00"),
            at("2025-10-09T15:00:00"),
        )
    }

    fn offsite() -> Event {
        Event::new("evt2", "Offsite", at("2025-10-10"), at("2025-10-11"))
    }

    #[test]
    fn upcoming_listing() {
        insta::assert_snapshot!(render_upcoming(&[team_sync(), offsite()]), @r"
        Upcoming events:

        • Team Sync
          Date: Thursday, 2025-10-09
          Time: 14:00 - 15:00
          ID: evt1

        • Offsite
          Date: 2025-10-10 (All-day)
          ID: evt2
        ");
    }

    #[test]
    fn search_listing_shows_start_only() {
        let rendered = render_matches("sync", &[team_sync()]);
        assert!(rendered.starts_with("Events matching 'sync':\n"));
        assert!(rendered.contains("  Time: 14:00\n"));
        assert!(!rendered.contains("15:00"));
    }

    #[test]
    fn empty_listings() {
        assert_eq!(render_upcoming(&[]), "No upcoming events found.");
        assert_eq!(render_matches("x", &[]), "No events found matching 'x'.");
        assert_eq!(render_calendars(&[]), "No calendars found.");
    }

    #[test]
    fn calendar_listing() {
        let mut primary = Calendar::new("me@example.com", "Personal");
        primary.primary = true;
        let team = Calendar::new("team@example.com", "Team");
        assert_eq!(
            render_calendars(&[primary, team]),
            "- Personal (ID: me@example.com)\n- Team (ID: team@example.com)"
        );
    }

    #[test]
    fn draft_from_naive_times_is_utc() {
        let args: CreateArgs = serde_json::from_value(json!({
            "summary": "Team Sync",
            "start_time": "2025-10-09T14:00:00",
            "end_time": "2025-10-09T15:00:00",
            "attendees": ["a@example.com"]
        }))
        .unwrap();
        let draft = build_draft(&args).unwrap();
        assert_eq!(draft.start.to_string(), "2025-10-09T14:00:00+00:00");
        assert_eq!(draft.attendees, vec!["a@example.com".to_string()]);
        assert_eq!(draft.description, None);
    }

    #[test]
    fn draft_rejects_bad_times() {
        let args: CreateArgs = serde_json::from_value(json!({
            "summary": "Team Sync",
            "start_time": "tomorrow at 2",
            "end_time": "2025-10-09T15:00:00"
        }))
        .unwrap();
        let err = build_draft(&args).unwrap_err();
        assert!(err.starts_with("start_time: "), "{err}");

        let backwards: CreateArgs = serde_json::from_value(json!({
            "summary": "Team Sync",
            "start_time": "2025-10-09T15:00:00",
            "end_time": "2025-10-09T14:00:00"
        }))
        .unwrap();
        assert!(build_draft(&backwards).is_err());
    }

    #[test]
    fn patch_skips_empty_fields() {
        let args: UpdateArgs = serde_json::from_value(json!({
            "event_id": "evt1",
            "summary": "",
            "location": "Room 2"
        }))
        .unwrap();
        let patch = build_patch(args).unwrap();
        assert_eq!(patch, EventPatch::new().with_location("Room 2"));
    }

    #[tokio::test]
    async fn current_time_template() {
        let provider: Arc<dyn CalendarProvider> = Arc::new(calagent_providers::ErrorProvider::new(
            "test",
            calagent_providers::ProviderError::configuration("unused"),
        ));
        let registry = calendar_tools(provider);
        let observation = registry.call("get_current_time", Value::Null).await;
        assert!(observation.starts_with("Current date and time: "));
        assert!(observation.ends_with("+00:00 (UTC)"));
    }

    #[tokio::test]
    async fn errors_become_observations() {
        let provider: Arc<dyn CalendarProvider> = Arc::new(calagent_providers::ErrorProvider::new(
            "google",
            calagent_providers::ProviderError::authentication("token revoked"),
        ));
        let registry = calendar_tools(provider);

        let listed = registry.call("list_calendar_events", json!({})).await;
        assert!(listed.starts_with("Error listing events: "), "{listed}");
        assert!(listed.contains("token revoked"));

        let deleted = registry
            .call("delete_calendar_event", json!({"event_id": "evt1"}))
            .await;
        assert!(deleted.starts_with("Error deleting event: "), "{deleted}");

        let missing = registry.call("get_calendar_event", json!({})).await;
        assert!(
            missing.starts_with("Invalid arguments for get_calendar_event: "),
            "{missing}"
        );
    }

    #[test]
    fn registry_exposes_every_calendar_tool() {
        let provider: Arc<dyn CalendarProvider> = Arc::new(calagent_providers::ErrorProvider::new(
            "test",
            calagent_providers::ProviderError::configuration("unused"),
        ));
        let registry = calendar_tools(provider);
        assert_eq!(
            registry.names(),
            vec![
                "get_current_time",
                "list_calendar_events",
                "search_calendar_events",
                "get_calendar_event",
                "create_calendar_event",
                "update_calendar_event",
                "delete_calendar_event",
                "get_calendars",
            ]
        );
        let create = registry.schema("create_calendar_event").unwrap();
        assert_eq!(
            create.parameters.required,
            vec!["summary", "start_time", "end_time"]
        );
    }
}
