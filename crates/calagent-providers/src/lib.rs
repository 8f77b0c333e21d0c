//! CalendarProvider trait and the Google Calendar backend.
//!
//! - [`CalendarProvider`] - The operations the CLI and the agent call
//! - [`ProviderError`] - Error type for provider operations
//! - [`google`] - OAuth credential lifecycle and the Calendar v3 client
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐
//! │     CLI      │   │  Tool layer  │
//! └──────┬───────┘   └──────┬───────┘
//!        │  CalendarProvider │
//!        └─────────┬─────────┘
//!                  ▼
//!         ┌─────────────────┐     ┌──────────────────┐
//!         │ GoogleProvider  │────▶│ CredentialStore  │
//!         └────────┬────────┘     └────────┬─────────┘
//!                  ▼                       ▼
//!         ┌─────────────────┐     ┌──────────────────┐
//!         │ Calendar v3 API │     │ token.json/OAuth │
//!         └─────────────────┘     └──────────────────┘
//! ```

pub mod error;
#[cfg(feature = "google")]
pub mod google;
pub mod provider;

// Re-export main types at crate root
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use provider::{
    BoxFuture, CalendarProvider, DEFAULT_MAX_RESULTS, ErrorProvider, ListQuery, PRIMARY_CALENDAR,
    SearchQuery, SortOrder,
};
