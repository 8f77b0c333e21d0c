//! Google Calendar provider implementation.
//!
//! # Authentication Flow
//!
//! 1. The user downloads an OAuth client-secrets file from the Google Cloud
//!    Console and registers `http://127.0.0.1:<port>/` as a redirect URI
//! 2. On first use the provider listens on that port and prints the
//!    authorization URL (optionally opening a browser)
//! 3. Google redirects back with an authorization code, which is exchanged
//!    with PKCE for access and refresh tokens
//! 4. The token is persisted and refreshed when it expires
//!
//! # Example
//!
//! ```ignore
//! use calagent_providers::google::{GoogleConfig, GoogleProvider, OAuthCredentials};
//! use calagent_providers::{CalendarProvider, ListQuery};
//!
//! let credentials = OAuthCredentials::from_file("credentials.json")?;
//! let provider = GoogleProvider::new(GoogleConfig::new(credentials))?;
//! let events = provider.list_events(ListQuery::new().with_max_results(5)).await?;
//! ```

mod client;
mod config;
mod credentials;
mod oauth;
mod provider;
mod tokens;

pub use config::{GoogleConfig, OAuthCredentials};
pub use credentials::{CredentialState, CredentialStore};
pub use oauth::{AuthorizationFlow, OAuthClient};
pub use provider::GoogleProvider;
pub use tokens::{TokenGrant, TokenInfo, TokenStorage};
