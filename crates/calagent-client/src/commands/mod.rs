//! Command implementations.

pub mod auth;
pub mod chat;
pub mod events;

use calagent_providers::google::GoogleProvider;

use crate::config::Settings;
use crate::error::ClientResult;

/// Builds the Google provider described by `settings`.
pub fn google_provider(settings: &Settings) -> ClientResult<GoogleProvider> {
    Ok(GoogleProvider::new(settings.google_config()?)?)
}
