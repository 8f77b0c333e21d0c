//! Google Calendar API client.
//!
//! A thin HTTP wrapper over the Calendar v3 REST endpoints. It takes the
//! access token per call and reports every non-success status as a
//! [`ProviderError`]; deciding which failures are fatal is left to
//! [`GoogleProvider`](super::GoogleProvider).

use std::time::Duration;

use calagent_core::{Calendar, Event, EventDraft, EventPatch, EventTime};
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::SortOrder;

/// Largest page the events endpoint serves.
const MAX_PAGE_SIZE: usize = 2500;

/// Parameters of an events.list call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventsRequest {
    pub query: Option<String>,
    pub time_min: Option<DateTime<FixedOffset>>,
    pub time_max: Option<DateTime<FixedOffset>>,
    pub max_results: usize,
    pub order_by: SortOrder,
}

/// Google Calendar API client.
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl GoogleCalendarClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        user_agent: &str,
    ) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| {
                ProviderError::internal(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
        })
    }

    fn events_url(&self, calendar_id: &str) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id)
        )
    }

    fn event_url(&self, calendar_id: &str, event_id: &str) -> String {
        format!(
            "{}/{}",
            self.events_url(calendar_id),
            urlencoding::encode(event_id)
        )
    }

    /// Lists events, following pages until `max_results` is reached.
    pub async fn list_events(
        &self,
        access_token: &str,
        calendar_id: &str,
        request: &EventsRequest,
    ) -> ProviderResult<Vec<ApiEvent>> {
        let mut all_events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let remaining = request.max_results.saturating_sub(all_events.len());
            if remaining == 0 {
                break;
            }

            let page = self
                .list_events_page(
                    access_token,
                    calendar_id,
                    request,
                    remaining.min(MAX_PAGE_SIZE),
                    page_token.as_deref(),
                )
                .await?;
            all_events.extend(page.items);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        all_events.truncate(request.max_results);
        debug!(
            "fetched {} events from calendar {}",
            all_events.len(),
            calendar_id
        );
        Ok(all_events)
    }

    async fn list_events_page(
        &self,
        access_token: &str,
        calendar_id: &str,
        request: &EventsRequest,
        page_size: usize,
        page_token: Option<&str>,
    ) -> ProviderResult<EventListResponse> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(q) = &request.query {
            params.push(("q", q.clone()));
        }
        if let Some(time_min) = request.time_min {
            params.push(("timeMin", time_min.to_rfc3339()));
        }
        if let Some(time_max) = request.time_max {
            params.push(("timeMax", time_max.to_rfc3339()));
        }
        params.push(("maxResults", page_size.to_string()));
        params.push(("singleEvents", "true".to_string()));
        params.push(("orderBy", request.order_by.as_str().to_string()));
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }

        let response = self
            .http_client
            .get(self.events_url(calendar_id))
            .bearer_auth(access_token)
            .query(&params)
            .send()
            .await
            .map_err(request_error)?;

        parse_json(check_status(response, "list events").await?).await
    }

    /// Fetches the raw resource of one event.
    ///
    /// Returns `Ok(None)` on 404 and 410.
    pub async fn get_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
    ) -> ProviderResult<Option<Value>> {
        let response = self
            .http_client
            .get(self.event_url(calendar_id, event_id))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            debug!("event {} not found ({})", event_id, status);
            return Ok(None);
        }

        parse_json(check_status(response, "get event").await?)
            .await
            .map(Some)
    }

    /// Creates an event from a resource body.
    pub async fn insert_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        body: &Value,
    ) -> ProviderResult<ApiEvent> {
        let response = self
            .http_client
            .post(self.events_url(calendar_id))
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await
            .map_err(request_error)?;

        parse_json(check_status(response, "create event").await?).await
    }

    /// Replaces an event with a full resource body.
    pub async fn update_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
        body: &Value,
    ) -> ProviderResult<ApiEvent> {
        let response = self
            .http_client
            .put(self.event_url(calendar_id, event_id))
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await
            .map_err(request_error)?;

        parse_json(check_status(response, "update event").await?).await
    }

    /// Deletes an event. An event that is already gone (410) counts as
    /// deleted.
    pub async fn delete_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
    ) -> ProviderResult<()> {
        let response = self
            .http_client
            .delete(self.event_url(calendar_id, event_id))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(request_error)?;

        if response.status() == reqwest::StatusCode::GONE {
            debug!("event {} already deleted", event_id);
            return Ok(());
        }

        check_status(response, "delete event").await?;
        Ok(())
    }

    /// Lists the calendars on the user's calendar list.
    pub async fn list_calendars(&self, access_token: &str) -> ProviderResult<Vec<CalendarListEntry>> {
        let url = format!("{}/users/me/calendarList", self.base_url);
        let mut calendars = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.http_client.get(&url).bearer_auth(access_token);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = request.send().await.map_err(request_error)?;
            let page: CalendarListResponse =
                parse_json(check_status(response, "list calendars").await?).await?;
            calendars.extend(page.items);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(calendars)
    }
}

fn request_error(e: reqwest::Error) -> ProviderError {
    let message = if e.is_timeout() {
        "request timeout".to_string()
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        format!("request failed: {}", e)
    };
    ProviderError::network(message).with_source(e)
}

async fn check_status(
    response: reqwest::Response,
    context: &str,
) -> ProviderResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::from_status(status.as_u16(), context, &body))
}

async fn parse_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> ProviderResult<T> {
    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::network(format!("failed to read response: {}", e)))?;

    serde_json::from_str(&body).map_err(|e| {
        ProviderError::invalid_response(format!("failed to parse response: {}", e))
    })
}

/// Builds the resource body for a new event.
pub fn draft_body(draft: &EventDraft) -> Value {
    let mut body = Map::new();
    body.insert("summary".into(), json!(draft.summary));
    body.insert("start".into(), time_body(&draft.start));
    body.insert("end".into(), time_body(&draft.end));
    if let Some(description) = &draft.description {
        body.insert("description".into(), json!(description));
    }
    if let Some(location) = &draft.location {
        body.insert("location".into(), json!(location));
    }
    if !draft.attendees.is_empty() {
        body.insert("attendees".into(), attendees_body(&draft.attendees));
    }
    Value::Object(body)
}

/// Applies a patch to a fetched event resource in place.
///
/// Only the provided fields are written; everything else in the resource,
/// including fields this crate does not model, is kept.
pub fn merge_patch(resource: &mut Value, patch: &EventPatch) -> ProviderResult<()> {
    let object = resource
        .as_object_mut()
        .ok_or_else(|| ProviderError::invalid_response("event resource is not a JSON object"))?;

    if let Some(summary) = &patch.summary {
        object.insert("summary".into(), json!(summary));
    }
    if let Some(start) = &patch.start {
        let body = retimed(object.get("start"), start);
        object.insert("start".into(), body);
    }
    if let Some(end) = &patch.end {
        let body = retimed(object.get("end"), end);
        object.insert("end".into(), body);
    }
    if let Some(description) = &patch.description {
        object.insert("description".into(), json!(description));
    }
    if let Some(location) = &patch.location {
        object.insert("location".into(), json!(location));
    }
    if let Some(attendees) = &patch.attendees {
        object.insert("attendees".into(), attendees_body(attendees));
    }
    Ok(())
}

/// The current start and end of a raw event resource, when both parse.
pub fn resource_endpoints(resource: &Value) -> Option<(EventTime, EventTime)> {
    let endpoint = |key: &str| {
        ApiEventTime::deserialize(resource.get(key)?)
            .ok()?
            .to_event_time()
    };
    Some((endpoint("start")?, endpoint("end")?))
}

/// Body for a replaced endpoint. A timed endpoint keeps the current
/// `timeZone`, which recurring events require.
fn retimed(current: Option<&Value>, time: &EventTime) -> Value {
    let mut body = time_body(time);
    if let (EventTime::DateTime(_), Some(zone)) =
        (time, current.and_then(|c| c.get("timeZone")))
    {
        body["timeZone"] = zone.clone();
    }
    body
}

fn time_body(time: &EventTime) -> Value {
    match time {
        EventTime::DateTime(dt) => json!({ "dateTime": dt.to_rfc3339() }),
        EventTime::AllDay(date) => json!({ "date": date.format("%Y-%m-%d").to_string() }),
    }
}

fn attendees_body(attendees: &[String]) -> Value {
    Value::Array(
        attendees
            .iter()
            .map(|email| json!({ "email": email }))
            .collect(),
    )
}

/// Response from the events.list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
    next_page_token: Option<String>,
}

/// A single event from the Google Calendar API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEvent {
    pub id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: Option<ApiEventTime>,
    pub end: Option<ApiEventTime>,
    pub html_link: Option<String>,
    pub status: Option<String>,
    pub attendees: Option<Vec<ApiAttendee>>,
}

/// Event time from the API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEventTime {
    pub date: Option<String>,
    pub date_time: Option<String>,
}

/// Attendee from the API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAttendee {
    pub email: Option<String>,
}

impl ApiEvent {
    /// Returns true for events the API reports as cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.status.as_deref() == Some("cancelled")
    }

    /// Converts to the core event type.
    ///
    /// Returns `None` when the id or either endpoint is missing or
    /// malformed.
    pub fn into_event(self) -> Option<Event> {
        let id = self.id?;
        let Some(start) = self.start.as_ref().and_then(ApiEventTime::to_event_time) else {
            warn!("event {} has no usable start time", id);
            return None;
        };
        let Some(end) = self.end.as_ref().and_then(ApiEventTime::to_event_time) else {
            warn!("event {} has no usable end time", id);
            return None;
        };

        let mut event = Event::new(id, self.summary.unwrap_or_default(), start, end);
        event.description = self.description;
        event.location = self.location;
        event.html_link = self.html_link;
        event.attendees = self
            .attendees
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| a.email)
            .collect();
        Some(event)
    }
}

impl ApiEventTime {
    fn to_event_time(&self) -> Option<EventTime> {
        match (&self.date_time, &self.date) {
            (Some(dt), _) => DateTime::parse_from_rfc3339(dt)
                .map_err(|e| warn!("failed to parse event time {}: {}", dt, e))
                .ok()
                .map(EventTime::DateTime),
            (None, Some(date)) => NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .map_err(|e| warn!("failed to parse event date {}: {}", date, e))
                .ok()
                .map(EventTime::AllDay),
            (None, None) => None,
        }
    }
}

/// Response from the calendarList endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarListResponse {
    #[serde(default)]
    items: Vec<CalendarListEntry>,
    next_page_token: Option<String>,
}

/// A calendar from the calendar list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarListEntry {
    pub id: String,
    #[serde(default)]
    pub summary: String,
    /// User-chosen name that overrides `summary` when set.
    pub summary_override: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub primary: bool,
}

impl From<CalendarListEntry> for Calendar {
    fn from(entry: CalendarListEntry) -> Self {
        let mut calendar = Calendar::new(entry.id, entry.summary_override.unwrap_or(entry.summary));
        calendar.description = entry.description;
        calendar.primary = entry.primary;
        calendar
    }
}
