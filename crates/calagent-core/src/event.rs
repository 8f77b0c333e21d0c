//! Event types for calendar events.
//!
//! This module provides core types for representing calendar data:
//! - [`Event`]: A calendar event as returned by the remote service
//! - [`Calendar`]: A calendar the authenticated identity can access
//! - [`EventDraft`]: The fields needed to create a new event
//! - [`EventPatch`]: A partial update with one optional slot per attribute
//!
//! None of these are cached; every value is a projection of remote state
//! fetched for a single call.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::time::EventTime;

/// Validation errors for event drafts and patches.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftError {
    /// The event summary is empty.
    #[error("event summary must not be empty")]
    EmptySummary,

    /// The end is earlier than the start.
    #[error("event end ({end}) is earlier than its start ({start})")]
    EndBeforeStart { start: EventTime, end: EventTime },

    /// One endpoint is a timestamp and the other an all-day date.
    #[error("event start and end must both be timestamps or both be dates")]
    MixedEndpoints,
}

/// A calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Identifier assigned by the remote service.
    pub id: String,
    /// The event title.
    pub summary: String,
    /// The event description.
    pub description: Option<String>,
    /// The event location.
    pub location: Option<String>,
    /// When the event starts.
    pub start: EventTime,
    /// When the event ends.
    pub end: EventTime,
    /// Attendee email addresses.
    pub attendees: Vec<String>,
    /// Link to the event in the hosted calendar UI.
    pub html_link: Option<String>,
}

impl Event {
    /// Creates an event with the required fields.
    pub fn new(
        id: impl Into<String>,
        summary: impl Into<String>,
        start: EventTime,
        end: EventTime,
    ) -> Self {
        Self {
            id: id.into(),
            summary: summary.into(),
            description: None,
            location: None,
            start,
            end,
            attendees: Vec::new(),
            html_link: None,
        }
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Builder method to set the attendees.
    pub fn with_attendees(mut self, attendees: Vec<String>) -> Self {
        self.attendees = attendees;
        self
    }

    /// Builder method to set the hosted-view link.
    pub fn with_html_link(mut self, link: impl Into<String>) -> Self {
        self.html_link = Some(link.into());
        self
    }

    /// Returns `true` if the event starts on a whole-day date.
    pub fn is_all_day(&self) -> bool {
        self.start.is_all_day()
    }

    /// Returns the event duration.
    ///
    /// Timed events measure between instants; all-day events measure whole
    /// days. Mixed endpoints have no meaningful duration.
    pub fn duration(&self) -> Option<Duration> {
        match (&self.start, &self.end) {
            (EventTime::DateTime(start), EventTime::DateTime(end)) => Some(*end - *start),
            (EventTime::AllDay(start), EventTime::AllDay(end)) => {
                Some(Duration::days((*end - *start).num_days()))
            }
            _ => None,
        }
    }
}

/// A calendar the authenticated identity can access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    /// Calendar identifier (`primary` aliases the user's main calendar).
    pub id: String,
    /// Display name.
    pub summary: String,
    /// Description, if set.
    pub description: Option<String>,
    /// Whether this is the user's primary calendar.
    pub primary: bool,
}

impl Calendar {
    /// Creates a calendar with the given ID and name.
    pub fn new(id: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            summary: summary.into(),
            description: None,
            primary: false,
        }
    }
}

/// The fields needed to create an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    pub summary: String,
    pub start: EventTime,
    pub end: EventTime,
    pub description: Option<String>,
    pub location: Option<String>,
    pub attendees: Vec<String>,
}

impl EventDraft {
    /// Creates a draft with the required fields.
    pub fn new(summary: impl Into<String>, start: EventTime, end: EventTime) -> Self {
        Self {
            summary: summary.into(),
            start,
            end,
            description: None,
            location: None,
            attendees: Vec::new(),
        }
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Builder method to set the attendees.
    pub fn with_attendees(mut self, attendees: Vec<String>) -> Self {
        self.attendees = attendees;
        self
    }

    /// Checks the draft before it is sent.
    pub fn validate(&self) -> Result<(), DraftError> {
        if self.summary.trim().is_empty() {
            return Err(DraftError::EmptySummary);
        }
        check_endpoints(&self.start, &self.end)
    }
}

/// A partial update to an existing event.
///
/// `None` leaves the remote value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPatch {
    pub summary: Option<String>,
    pub start: Option<EventTime>,
    pub end: Option<EventTime>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub attendees: Option<Vec<String>>,
}

impl EventPatch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if no field is set.
    pub fn is_empty(&self) -> bool {
        self.summary.is_none()
            && self.start.is_none()
            && self.end.is_none()
            && self.description.is_none()
            && self.location.is_none()
            && self.attendees.is_none()
    }

    /// Builder method to set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Builder method to set the start.
    pub fn with_start(mut self, start: EventTime) -> Self {
        self.start = Some(start);
        self
    }

    /// Builder method to set the end.
    pub fn with_end(mut self, end: EventTime) -> Self {
        self.end = Some(end);
        self
    }

    /// Builder method to set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder method to set the location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Builder method to replace the attendees.
    pub fn with_attendees(mut self, attendees: Vec<String>) -> Self {
        self.attendees = Some(attendees);
        self
    }

    /// Checks the fields that can be checked without the current event.
    pub fn validate(&self) -> Result<(), DraftError> {
        if self.summary.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(DraftError::EmptySummary);
        }
        match (&self.start, &self.end) {
            (Some(start), Some(end)) => check_endpoints(start, end),
            _ => Ok(()),
        }
    }

    /// Checks the endpoints the event ends up with once this patch is
    /// applied over its current `start` and `end`.
    pub fn validate_over(&self, start: &EventTime, end: &EventTime) -> Result<(), DraftError> {
        self.validate()?;
        check_endpoints(
            self.start.as_ref().unwrap_or(start),
            self.end.as_ref().unwrap_or(end),
        )
    }
}

fn check_endpoints(start: &EventTime, end: &EventTime) -> Result<(), DraftError> {
    if start.is_all_day() != end.is_all_day() {
        return Err(DraftError::MixedEndpoints);
    }
    if end < start {
        return Err(DraftError::EndBeforeStart {
            start: start.clone(),
            end: end.clone(),
        });
    }
    Ok(())
}
