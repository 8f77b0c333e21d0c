//! CalendarProvider trait definition.
//!
//! [`CalendarProvider`] is the seam between the calendar backend and its
//! two consumers, the CLI and the agent's tool layer. Implementations
//! authenticate on every call and hold no calendar data between calls.
//!
//! Operations distinguish two kinds of failure. An `Err` means the call
//! could not be made at all (no credential, invalid input). A remote failure
//! is logged by the implementation and reported as an empty or absent
//! result, so "nothing found" and "the service failed" look the same to the
//! caller.

use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use calagent_core::{Calendar, Event, EventDraft, EventPatch};
use chrono::{DateTime, FixedOffset};

use crate::error::{ProviderError, ProviderResult};

/// Number of events returned when the caller does not say.
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// Alias for the authenticated user's main calendar.
pub const PRIMARY_CALENDAR: &str = "primary";

/// Order of search results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Soonest start first.
    #[default]
    StartTime,
    /// Most recently modified last.
    Updated,
}

impl SortOrder {
    /// Returns the wire name used by the calendar API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartTime => "startTime",
            Self::Updated => "updated",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "starttime" | "start_time" | "start" => Ok(Self::StartTime),
            "updated" => Ok(Self::Updated),
            other => Err(format!(
                "unknown order '{}' (expected startTime or updated)",
                other
            )),
        }
    }
}

/// Options for listing upcoming events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// Maximum number of events to return.
    pub max_results: usize,
    /// Calendar to read from.
    pub calendar_id: String,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            calendar_id: PRIMARY_CALENDAR.to_string(),
        }
    }
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    pub fn with_calendar_id(mut self, id: impl Into<String>) -> Self {
        self.calendar_id = id.into();
        self
    }
}

/// Options for a free-text event search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Free text matched against event fields by the remote service.
    pub query: String,
    /// Maximum number of events to return.
    pub max_results: usize,
    /// Calendar to search.
    pub calendar_id: String,
    /// Lower bound on event end; `None` means now.
    pub time_min: Option<DateTime<FixedOffset>>,
    /// Upper bound on event start.
    pub time_max: Option<DateTime<FixedOffset>>,
    /// Result order.
    pub order_by: SortOrder,
}

impl SearchQuery {
    /// Creates a search for the given text with default options.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_results: DEFAULT_MAX_RESULTS,
            calendar_id: PRIMARY_CALENDAR.to_string(),
            time_min: None,
            time_max: None,
            order_by: SortOrder::StartTime,
        }
    }

    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    pub fn with_calendar_id(mut self, id: impl Into<String>) -> Self {
        self.calendar_id = id.into();
        self
    }

    pub fn with_time_min(mut self, start: DateTime<FixedOffset>) -> Self {
        self.time_min = Some(start);
        self
    }

    pub fn with_time_max(mut self, end: DateTime<FixedOffset>) -> Self {
        self.time_max = Some(end);
        self
    }

    pub fn with_order_by(mut self, order: SortOrder) -> Self {
        self.order_by = order;
        self
    }
}

/// A boxed future for async trait methods.
///
/// Boxed futures keep the trait object-safe so providers can be shared as
/// `Arc<dyn CalendarProvider>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The operations a calendar backend offers.
pub trait CalendarProvider: Send + Sync {
    /// Returns the name of this provider (e.g. `"google"`).
    fn name(&self) -> &str;

    /// Lists events starting from now, soonest first, at most
    /// `query.max_results` of them.
    fn list_events(&self, query: ListQuery) -> BoxFuture<'_, ProviderResult<Vec<Event>>>;

    /// Searches events matching free text within an optional window.
    fn search_events(&self, query: SearchQuery) -> BoxFuture<'_, ProviderResult<Vec<Event>>>;

    /// Fetches one event; `None` when it does not exist or was cancelled.
    fn get_event<'a>(
        &'a self,
        event_id: &'a str,
        calendar_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Option<Event>>>;

    /// Creates an event; `None` when the remote service refused it.
    fn create_event<'a>(
        &'a self,
        draft: EventDraft,
        calendar_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Option<Event>>>;

    /// Applies a partial update; `None` when the event is missing or the
    /// remote service refused the change.
    fn update_event<'a>(
        &'a self,
        event_id: &'a str,
        patch: EventPatch,
        calendar_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Option<Event>>>;

    /// Deletes an event; `true` when the remote service acknowledged it.
    fn delete_event<'a>(
        &'a self,
        event_id: &'a str,
        calendar_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<bool>>;

    /// Lists the calendars the authenticated identity can access.
    fn list_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<Calendar>>>;
}

/// A provider that fails every call with the same error.
///
/// Stands in for a backend that could not be constructed, so an
/// interactive session can still start and report the problem per call.
#[derive(Debug)]
pub struct ErrorProvider {
    name: String,
    error: ProviderError,
}

impl ErrorProvider {
    pub fn new(name: impl Into<String>, error: ProviderError) -> Self {
        Self {
            name: name.into(),
            error,
        }
    }

    fn fail<'a, T: Send + 'a>(&self) -> BoxFuture<'a, ProviderResult<T>> {
        let error =
            ProviderError::new(self.error.code(), self.error.message()).with_provider(&self.name);
        Box::pin(async move { Err(error) })
    }
}

impl CalendarProvider for ErrorProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_events(&self, _query: ListQuery) -> BoxFuture<'_, ProviderResult<Vec<Event>>> {
        self.fail()
    }

    fn search_events(&self, _query: SearchQuery) -> BoxFuture<'_, ProviderResult<Vec<Event>>> {
        self.fail()
    }

    fn get_event<'a>(
        &'a self,
        _event_id: &'a str,
        _calendar_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Option<Event>>> {
        self.fail()
    }

    fn create_event<'a>(
        &'a self,
        _draft: EventDraft,
        _calendar_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Option<Event>>> {
        self.fail()
    }

    fn update_event<'a>(
        &'a self,
        _event_id: &'a str,
        _patch: EventPatch,
        _calendar_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Option<Event>>> {
        self.fail()
    }

    fn delete_event<'a>(
        &'a self,
        _event_id: &'a str,
        _calendar_id: &'a str,
    ) -> BoxFuture<'a, ProviderResult<bool>> {
        self.fail()
    }

    fn list_calendars(&self) -> BoxFuture<'_, ProviderResult<Vec<Calendar>>> {
        self.fail()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;

    #[test]
    fn list_query_defaults() {
        let query = ListQuery::new();
        assert_eq!(query.max_results, 10);
        assert_eq!(query.calendar_id, "primary");

        let query = query.with_max_results(3).with_calendar_id("team@example.com");
        assert_eq!(query.max_results, 3);
        assert_eq!(query.calendar_id, "team@example.com");
    }

    #[test]
    fn search_query_builder() {
        let start = DateTime::parse_from_rfc3339("2025-10-09T00:00:00Z").unwrap();
        let query = SearchQuery::new("Team Sync")
            .with_time_min(start)
            .with_order_by(SortOrder::Updated);

        assert_eq!(query.query, "Team Sync");
        assert_eq!(query.time_min, Some(start));
        assert!(query.time_max.is_none());
        assert_eq!(query.order_by.as_str(), "updated");
    }

    #[test]
    fn sort_order_parsing() {
        assert_eq!("startTime".parse::<SortOrder>(), Ok(SortOrder::StartTime));
        assert_eq!("start_time".parse::<SortOrder>(), Ok(SortOrder::StartTime));
        assert_eq!("UPDATED".parse::<SortOrder>(), Ok(SortOrder::Updated));
        assert!("random".parse::<SortOrder>().is_err());
    }

    #[tokio::test]
    async fn error_provider_fails_every_call() {
        let provider =
            ErrorProvider::new("google", ProviderError::configuration("credentials.json missing"));
        assert_eq!(provider.name(), "google");

        let err = provider.list_events(ListQuery::new()).await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ConfigurationError);
        assert_eq!(err.provider(), Some("google"));

        assert!(provider.delete_event("evt1", "primary").await.is_err());
        assert!(provider.list_calendars().await.is_err());
    }
}
