//! Event and calendar commands.
//!
//! Each command is one provider call followed by plain-text rendering to
//! `out`.

use std::io::Write;

use calagent_core::{
    EventDraft, EventPatch, calendar_line, event_details, event_line, parse_event_time,
    parse_instant,
};
use calagent_providers::{CalendarProvider, ListQuery, PRIMARY_CALENDAR, SearchQuery};
use tracing::debug;

use crate::cli::{CreateArgs, SearchArgs, UpdateArgs};
use crate::error::{ClientError, ClientResult};

pub async fn list(
    provider: &dyn CalendarProvider,
    out: &mut dyn Write,
    max_results: usize,
    calendar_id: &str,
) -> ClientResult<()> {
    let query = ListQuery::new()
        .with_max_results(max_results)
        .with_calendar_id(calendar_id);
    let events = provider.list_events(query).await?;
    debug!("listed {} events", events.len());

    if events.is_empty() {
        writeln!(out, "No upcoming events found.")?;
    }
    for event in &events {
        writeln!(out, "{}", event_line(event))?;
    }
    Ok(())
}

pub async fn calendars(provider: &dyn CalendarProvider, out: &mut dyn Write) -> ClientResult<()> {
    let calendars = provider.list_calendars().await?;
    if calendars.is_empty() {
        writeln!(out, "No calendars found.")?;
    }
    for calendar in &calendars {
        writeln!(out, "{}", calendar_line(calendar))?;
    }
    Ok(())
}

pub async fn search(
    provider: &dyn CalendarProvider,
    out: &mut dyn Write,
    args: SearchArgs,
) -> ClientResult<()> {
    let mut query = SearchQuery::new(&args.query)
        .with_max_results(args.max_results)
        .with_calendar_id(&args.calendar_id)
        .with_order_by(args.order);
    if let Some(start) = &args.start_time {
        query = query.with_time_min(parse_instant(start)?);
    }
    if let Some(end) = &args.end_time {
        query = query.with_time_max(parse_instant(end)?);
    }

    let events = provider.search_events(query).await?;
    if events.is_empty() {
        writeln!(out, "No events found matching '{}'.", args.query)?;
    }
    for event in &events {
        writeln!(out, "{}  [{}]", event_line(event), event.id)?;
    }
    Ok(())
}

pub async fn get(
    provider: &dyn CalendarProvider,
    out: &mut dyn Write,
    event_id: &str,
    calendar_id: &str,
) -> ClientResult<()> {
    match provider.get_event(event_id, calendar_id).await? {
        Some(event) => writeln!(out, "{}", event_details(&event))?,
        None => writeln!(out, "Event with ID {} not found.", event_id)?,
    }
    Ok(())
}

pub async fn create(
    provider: &dyn CalendarProvider,
    out: &mut dyn Write,
    args: CreateArgs,
) -> ClientResult<()> {
    let draft = build_draft(args)?;
    let summary = draft.summary.clone();

    let created = provider
        .create_event(draft, PRIMARY_CALENDAR)
        .await?
        .ok_or_else(|| {
            ClientError::Failed(format!("failed to create event '{}'; see the log", summary))
        })?;

    writeln!(out, "Created event {}", created.id)?;
    writeln!(out, "{}", event_line(&created))?;
    if let Some(link) = &created.html_link {
        writeln!(out, "{}", link)?;
    }
    Ok(())
}

fn build_draft(args: CreateArgs) -> ClientResult<EventDraft> {
    let start = parse_event_time(&args.start)?;
    let end = parse_event_time(&args.end)?;

    let mut draft = EventDraft::new(args.summary, start, end).with_attendees(args.attendees);
    if let Some(description) = args.description {
        draft = draft.with_description(description);
    }
    if let Some(location) = args.location {
        draft = draft.with_location(location);
    }
    draft.validate()?;
    Ok(draft)
}

pub async fn update(
    provider: &dyn CalendarProvider,
    out: &mut dyn Write,
    args: UpdateArgs,
) -> ClientResult<()> {
    let event_id = args.event_id.clone();
    let patch = build_patch(args)?;
    if patch.is_empty() {
        debug!("empty patch for {}, the event is rewritten unchanged", event_id);
    }

    let updated = provider
        .update_event(&event_id, patch, PRIMARY_CALENDAR)
        .await?
        .ok_or_else(|| {
            ClientError::Failed(format!(
                "event {} was not found or could not be updated",
                event_id
            ))
        })?;

    writeln!(out, "Updated event {}", updated.id)?;
    writeln!(out, "{}", event_line(&updated))?;
    Ok(())
}

fn build_patch(args: UpdateArgs) -> ClientResult<EventPatch> {
    let mut patch = EventPatch::new();
    if let Some(summary) = args.summary {
        patch = patch.with_summary(summary);
    }
    if let Some(start) = &args.start_time {
        patch = patch.with_start(parse_event_time(start)?);
    }
    if let Some(end) = &args.end_time {
        patch = patch.with_end(parse_event_time(end)?);
    }
    if let Some(description) = args.description {
        patch = patch.with_description(description);
    }
    if let Some(location) = args.location {
        patch = patch.with_location(location);
    }
    if !args.attendees.is_empty() {
        patch = patch.with_attendees(args.attendees);
    }
    patch.validate()?;
    Ok(patch)
}

pub async fn delete(
    provider: &dyn CalendarProvider,
    out: &mut dyn Write,
    event_id: &str,
) -> ClientResult<()> {
    if !provider.delete_event(event_id, PRIMARY_CALENDAR).await? {
        return Err(ClientError::Failed(format!(
            "could not delete event {}",
            event_id
        )));
    }
    writeln!(out, "Deleted event {}", event_id)?;
    Ok(())
}
