//! Google Calendar provider implementation.
//!
//! This module implements the [`CalendarProvider`] trait for Google Calendar.
//! Every operation asks the [`CredentialStore`] for a valid token first;
//! authentication failures are returned, remote failures are logged and
//! turned into empty or absent results.

use calagent_core::{Calendar, Event, EventDraft, EventPatch};
use chrono::Utc;
use tracing::{debug, error};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{BoxFuture, CalendarProvider, ListQuery, SearchQuery, SortOrder};

use super::client::{
    ApiEvent, EventsRequest, GoogleCalendarClient, draft_body, merge_patch, resource_endpoints,
};
use super::config::GoogleConfig;
use super::credentials::CredentialStore;
use super::oauth::{AuthorizationFlow, OAuthClient};

/// Google Calendar provider.
pub struct GoogleProvider<F = OAuthClient> {
    credentials: CredentialStore<F>,
    client: GoogleCalendarClient,
}

impl GoogleProvider<OAuthClient> {
    /// Creates a provider that authorizes against Google.
    ///
    /// Does not touch the network or the token file.
    pub fn new(config: GoogleConfig) -> ProviderResult<Self> {
        config.validate()?;
        let credentials = CredentialStore::from_config(&config)?;
        Self::with_credentials(&config, credentials)
    }
}

impl<F: AuthorizationFlow> GoogleProvider<F> {
    /// Creates a provider around an existing credential store.
    pub fn with_credentials(
        config: &GoogleConfig,
        credentials: CredentialStore<F>,
    ) -> ProviderResult<Self> {
        let client =
            GoogleCalendarClient::new(&config.api_base_url, config.timeout, &config.user_agent)?;
        Ok(Self {
            credentials,
            client,
        })
    }

    /// Returns the credential store.
    pub fn credentials(&self) -> &CredentialStore<F> {
        &self.credentials
    }

    async fn access_token(&self) -> ProviderResult<String> {
        Ok(self.credentials.authenticate().await?.access_token)
    }

    /// Absorbs a remote failure into `fallback`, except authentication
    /// failures, which are returned.
    fn absorb<T>(&self, operation: &str, err: ProviderError, fallback: T) -> ProviderResult<T> {
        if err.is_authentication() {
            return Err(err.with_provider("google"));
        }
        error!("failed to {}: {}", operation, err);
        Ok(fallback)
    }

    async fn list_events_impl(&self, query: ListQuery) -> ProviderResult<Vec<Event>> {
        let token = self.access_token().await?;
        let request = EventsRequest {
            query: None,
            time_min: Some(Utc::now().fixed_offset()),
            time_max: None,
            max_results: query.max_results,
            order_by: SortOrder::StartTime,
        };

        match self
            .client
            .list_events(&token, &query.calendar_id, &request)
            .await
        {
            Ok(items) => Ok(collect_events(items, query.max_results, true)),
            Err(e) => self.absorb("list events", e, Vec::new()),
        }
    }

    async fn search_events_impl(&self, query: SearchQuery) -> ProviderResult<Vec<Event>> {
        let token = self.access_token().await?;
        let request = EventsRequest {
            query: Some(query.query.clone()),
            time_min: Some(query.time_min.unwrap_or_else(|| Utc::now().fixed_offset())),
            time_max: query.time_max,
            max_results: query.max_results,
            order_by: query.order_by,
        };

        match self
            .client
            .list_events(&token, &query.calendar_id, &request)
            .await
        {
            Ok(items) => Ok(collect_events(
                items,
                query.max_results,
                query.order_by == SortOrder::StartTime,
            )),
            Err(e) => self.absorb("search events", e, Vec::new()),
        }
    }

    async fn get_event_impl(&self, event_id: &str, calendar_id: &str) -> ProviderResult<Option<Event>> {
        let token = self.access_token().await?;
        let resource = match self.client.get_event(&token, calendar_id, event_id).await {
            Ok(Some(resource)) => resource,
            Ok(None) => return Ok(None),
            Err(e) => return self.absorb("get event", e, None),
        };

        match serde_json::from_value::<ApiEvent>(resource) {
            Ok(event) if event.is_cancelled() => {
                debug!("event {} is cancelled", event_id);
                Ok(None)
            }
            Ok(event) => Ok(event.into_event()),
            Err(e) => self.absorb(
                "get event",
                ProviderError::invalid_response(format!("failed to parse event: {}", e)),
                None,
            ),
        }
    }

    async fn create_event_impl(
        &self,
        draft: EventDraft,
        calendar_id: &str,
    ) -> ProviderResult<Option<Event>> {
        draft
            .validate()
            .map_err(|e| ProviderError::bad_request(e.to_string()))?;
        let token = self.access_token().await?;

        match self
            .client
            .insert_event(&token, calendar_id, &draft_body(&draft))
            .await
        {
            Ok(created) => Ok(created.into_event()),
            Err(e) => self.absorb("create event", e, None),
        }
    }

    async fn update_event_impl(
        &self,
        event_id: &str,
        patch: EventPatch,
        calendar_id: &str,
    ) -> ProviderResult<Option<Event>> {
        patch
            .validate()
            .map_err(|e| ProviderError::bad_request(e.to_string()))?;
        let token = self.access_token().await?;

        let mut resource = match self.client.get_event(&token, calendar_id, event_id).await {
            Ok(Some(resource)) => resource,
            Ok(None) => return Ok(None),
            Err(e) => return self.absorb("fetch event for update", e, None),
        };

        if let Some((start, end)) = resource_endpoints(&resource) {
            patch
                .validate_over(&start, &end)
                .map_err(|e| ProviderError::bad_request(e.to_string()))?;
        }

        if let Err(e) = merge_patch(&mut resource, &patch) {
            return self.absorb("update event", e, None);
        }

        // The fetched resource is sent back whole; another writer's change
        // made in between is overwritten.
        match self
            .client
            .update_event(&token, calendar_id, event_id, &resource)
            .await
        {
            Ok(updated) => Ok(updated.into_event()),
            Err(e) => self.absorb("update event", e, None),
        }
    }

    async fn delete_event_impl(&self, event_id: &str, calendar_id: &str) -> ProviderResult<bool> {
        let token = self.access_token().await?;
        match self.client.delete_event(&token, calendar_id, event_id).await {
            Ok(()) => Ok(true),
            Err(e) => self.absorb("delete event", e, false),
        }
    }

    async fn list_calendars_impl(&self) -> ProviderResult<Vec<Calendar>> {
        let token = self.access_token().await?;
        match self.client.list_calendars(&token).await {
            Ok(entries) => Ok(entries.into_iter().map(Calendar::from).collect()),
            Err(e) => self.absorb("list calendars", e, Vec::new()),
        }
    }
}

/// Converts API events, drops cancelled and malformed ones, and caps the
/// count. With `sort_by_start` the result is stably ordered by start.
fn collect_events(items: Vec<ApiEvent>, max: usize, sort_by_start: bool) -> Vec<Event> {
    let mut events: Vec<Event> = items
        .into_iter()
        .filter(|item| !item.is_cancelled())
        .filter_map(ApiEvent::into_event)
        .collect();

    if sort_by_start {
        events.sort_by(|a, b| a.start.cmp(&b.start));
    }
    events.truncate(max);
    events
}

impl<F: AuthorizationFlow> CalendarProvider for GoogleProvider<F> {
    fn name(&self) -> &str {
        "google"
    }

    fn list_events(&self, query: ListQuery) -> BoxFuture<'_, ProviderResult<Vec<Event>>> {
        Box::pin(self.list_events_impl(query))
    }

    fn search_events(&self, query: SearchQuery) -> BoxFuture<'_, ProviderResult<Vec<Event>>> {
        Box::pin(self.search_events_impl(query))
    }

    fn get_event<'a>(
        &'a self,
        event_id: &'a str,
        calendar_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Option<Event>>> {
        Box::pin(self.get_event_impl(event_id, calendar_id))
    }

    fn create_event<'a>(
        &'a self,
        draft: EventDraft,
        calendar_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Option<Event>>> {
        Box::pin(self.create_event_impl(draft, calendar_id))
    }

    fn update_event<'a>(
        &'a self,
        event_id: &'a str,
        patch: EventPatch,
        calendar_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Option<Event>>> {
        Box::pin(self.update_event_impl(event_id, patch, calendar_id))
    }

    fn delete_event<'a>(
        &'a self,
        event_id: &'a str,
        calendar_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<bool>> {
        Box::pin(self.delete_event_impl(event_id, calendar_id))
    }

    fn list_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<Calendar>>> {
        Box::pin(self.list_calendars_impl())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google::config::OAuthCredentials;
    use serde_json::json;

    fn api_event(id: &str, start: &str, status: &str) -> ApiEvent {
        serde_json::from_value(json!({
            "id": id,
            "summary": id,
            "status": status,
            "start": { "dateTime": start },
            "end": { "dateTime": start }
        }))
        .unwrap()
    }

    #[test]
    fn collect_sorts_stably_and_caps() {
        let items = vec![
            api_event("late", "2025-10-09T16:00:00Z", "confirmed"),
            api_event("first-a", "2025-10-09T09:00:00Z", "confirmed"),
            api_event("gone", "2025-10-09T08:00:00Z", "cancelled"),
            api_event("first-b", "2025-10-09T11:00:00+02:00", "confirmed"),
            api_event("mid", "2025-10-09T12:00:00Z", "confirmed"),
        ];

        let events = collect_events(items, 3, true);
        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["first-a", "first-b", "mid"]);
    }

    #[test]
    fn collect_keeps_remote_order_when_not_by_start() {
        let items = vec![
            api_event("b", "2025-10-10T09:00:00Z", "confirmed"),
            api_event("a", "2025-10-09T09:00:00Z", "confirmed"),
        ];
        let events = collect_events(items, 10, false);
        assert_eq!(events[0].id, "b");
    }

    #[test]
    fn provider_creation_validates_config() {
        let credentials =
            OAuthCredentials::new("test-client.apps.googleusercontent.com", "test-secret");
        let provider = GoogleProvider::new(
            GoogleConfig::new(credentials).with_token_path("/nonexistent/token.json"),
        )
        .unwrap();
        assert_eq!(provider.name(), "google");

        let bad = GoogleProvider::new(GoogleConfig::new(OAuthCredentials::new("bad", "")));
        assert!(bad.is_err());
    }
}
