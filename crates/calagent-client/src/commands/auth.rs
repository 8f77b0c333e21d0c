//! Authentication command.

use std::io::Write;

use calagent_providers::google::{CredentialState, CredentialStore, TokenStorage};
use tracing::info;

use crate::config::Settings;
use crate::error::ClientResult;

/// Runs the credential lifecycle until a valid token is stored.
pub async fn authenticate(settings: &Settings) -> ClientResult<()> {
    let store = CredentialStore::from_config(&settings.google_config()?)?;
    let before = store.state();
    info!("credential state before auth: {}", before);

    let token = store.authenticate().await?;

    println!("Authenticated with Google Calendar.");
    println!("Token saved to {}", store.storage().path().display());
    if let Some(expires_at) = token.expires_at {
        println!("Access token valid until {}", expires_at.to_rfc3339());
    }
    Ok(())
}

/// Refreshes the stored token without the browser flow.
pub async fn refresh(settings: &Settings) -> ClientResult<()> {
    let store = CredentialStore::from_config(&settings.google_config()?)?;
    if store.refresh_token().await? {
        println!("Token refreshed.");
    } else {
        println!("No refreshable token stored. Run `calagent auth` to sign in.");
    }
    Ok(())
}

/// Reports the stored token's state. Needs no client secrets.
pub fn status(settings: &Settings, out: &mut dyn Write) -> ClientResult<()> {
    let storage = TokenStorage::new(&settings.token_file);
    // An unreadable file is reported like a missing one, as authenticate() treats it.
    let token = storage.load().unwrap_or(None);
    let state = CredentialState::classify(token.as_ref(), &settings.scopes);

    writeln!(out, "Token file: {}", storage.path().display())?;
    writeln!(out, "State: {}", state)?;
    if let Some(expires_at) = token.as_ref().and_then(|t| t.expires_at) {
        writeln!(out, "Expires: {}", expires_at.to_rfc3339())?;
    }
    if let Some(last) = token.as_ref().and_then(|t| t.last_refresh) {
        writeln!(out, "Last refresh: {}", last.to_rfc3339())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use calagent_providers::google::TokenInfo;
    use chrono::{Duration, Utc};

    use super::*;

    fn settings_in(dir: &tempfile::TempDir) -> Settings {
        Settings {
            token_file: dir.path().join("token.json"),
            ..Settings::default()
        }
    }

    #[test]
    fn status_without_token() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(&dir);
        let mut out = Vec::new();
        status(&settings, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("State: no token"), "{text}");
    }

    #[test]
    fn status_of_expired_refreshable_token() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(&dir);
        let mut token = TokenInfo::new(
            "access",
            Some("refresh".to_string()),
            Some(3600),
            settings.scopes.clone(),
        );
        token.expires_at = Some(Utc::now() - Duration::hours(1));
        TokenStorage::new(&settings.token_file).save(&token).unwrap();

        let mut out = Vec::new();
        status(&settings, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("State: expired (refreshable)"), "{text}");
        assert!(text.contains("Expires: "));
    }

    #[test]
    fn status_of_corrupt_token_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(&dir);
        std::fs::write(&settings.token_file, "not json").unwrap();

        let mut out = Vec::new();
        status(&settings, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("State: no token"));
    }
}
