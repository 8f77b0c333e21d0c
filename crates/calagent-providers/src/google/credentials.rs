//! The credential lifecycle: load, validate, refresh, authorize, persist.
//!
//! ```text
//!              load
//!   ┌──────────────────────────────┐
//!   │                              ▼
//! NoToken ── flow ──▶ Valid ◀── refresh ── ExpiredRefreshable
//!   ▲                   ▲                        │ refresh failed
//!   │                   └──────── flow ──── ExpiredTerminal
//! unparseable file
//! ```
//!
//! Every token obtained by a refresh or by the interactive flow is written
//! to the token file before it is handed out.

use std::fmt;

use tracing::{debug, error, info, warn};

use crate::error::{ProviderError, ProviderResult};

use super::config::GoogleConfig;
use super::oauth::{AuthorizationFlow, OAuthClient};
use super::tokens::{TokenInfo, TokenStorage};

/// Where a stored credential stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// Nothing usable on disk.
    NoToken,
    /// Unexpired and carrying every required scope.
    Valid,
    /// Expired, but a refresh token is stored.
    ExpiredRefreshable,
    /// Expired without a refresh token, or missing a required scope.
    ExpiredTerminal,
}

impl CredentialState {
    /// Classifies a stored token against the scopes the caller needs.
    ///
    /// A token missing a scope is terminal: refreshing cannot widen scopes.
    pub fn classify(token: Option<&TokenInfo>, required_scopes: &[String]) -> Self {
        match token {
            None => Self::NoToken,
            Some(token) if !token.has_scopes(required_scopes) => Self::ExpiredTerminal,
            Some(token) if !token.is_expired() => Self::Valid,
            Some(token) if token.can_refresh() => Self::ExpiredRefreshable,
            Some(_) => Self::ExpiredTerminal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoToken => "no token",
            Self::Valid => "valid",
            Self::ExpiredRefreshable => "expired (refreshable)",
            Self::ExpiredTerminal => "expired (re-authorization required)",
        }
    }
}

impl fmt::Display for CredentialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loads, refreshes, and obtains OAuth credentials.
#[derive(Debug)]
pub struct CredentialStore<F = OAuthClient> {
    storage: TokenStorage,
    flow: F,
    scopes: Vec<String>,
    auth_port: u16,
}

impl CredentialStore<OAuthClient> {
    /// Creates a store that authorizes against Google.
    pub fn from_config(config: &GoogleConfig) -> ProviderResult<Self> {
        Ok(Self::new(
            TokenStorage::new(&config.token_path),
            OAuthClient::from_config(config)?,
            config.scopes.clone(),
            config.auth_port,
        ))
    }
}

impl<F: AuthorizationFlow> CredentialStore<F> {
    pub fn new(storage: TokenStorage, flow: F, scopes: Vec<String>, auth_port: u16) -> Self {
        Self {
            storage,
            flow,
            scopes,
            auth_port,
        }
    }

    /// Returns the token storage.
    pub fn storage(&self) -> &TokenStorage {
        &self.storage
    }

    /// Returns the authorization flow.
    pub fn flow(&self) -> &F {
        &self.flow
    }

    /// Classifies the token currently on disk.
    pub fn state(&self) -> CredentialState {
        CredentialState::classify(self.load().as_ref(), &self.scopes)
    }

    /// Returns a valid credential, refreshing or authorizing as needed.
    ///
    /// Never returns a token known to be expired.
    pub async fn authenticate(&self) -> ProviderResult<TokenInfo> {
        let stored = self.load();
        let state = CredentialState::classify(stored.as_ref(), &self.scopes);
        debug!("credential state: {}", state);

        match (state, stored) {
            (CredentialState::Valid, Some(token)) => return Ok(token),
            (CredentialState::ExpiredRefreshable, Some(token)) => {
                match self.refresh(token).await {
                    Ok(token) => return Ok(token),
                    Err(e) => warn!("token refresh failed, re-authorizing: {}", e),
                }
            }
            (CredentialState::ExpiredTerminal, Some(token)) if !token.has_scopes(&self.scopes) => {
                info!("stored token lacks required scopes, re-authorizing");
            }
            _ => {}
        }

        self.authorize().await
    }

    /// Refreshes the stored token without ever starting the interactive flow.
    ///
    /// Returns `Ok(false)` when no token or no refresh token is stored, and
    /// `Ok(true)` once a refreshed token has been persisted.
    pub async fn refresh_token(&self) -> ProviderResult<bool> {
        let token = match self.load() {
            Some(token) if token.can_refresh() => token,
            Some(_) => {
                debug!("stored token has no refresh token");
                return Ok(false);
            }
            None => return Ok(false),
        };

        self.refresh(token).await.map(|_| true)
    }

    /// Runs the interactive flow regardless of the stored token.
    pub async fn authorize(&self) -> ProviderResult<TokenInfo> {
        info!("starting interactive authorization on port {}", self.auth_port);

        let token = match self.flow.authorize(&self.scopes, self.auth_port).await {
            Ok(token) => token,
            Err(e) => {
                error!("authorization failed: {}", e);
                eprintln!("{}", remediation(self.auth_port));
                return Err(e);
            }
        };

        if token.is_expired() {
            return Err(ProviderError::authentication(
                "authorization returned an already expired token",
            ));
        }

        self.storage.save(&token)?;
        info!("authorization complete, token saved to {:?}", self.storage.path());
        Ok(token)
    }

    async fn refresh(&self, mut token: TokenInfo) -> ProviderResult<TokenInfo> {
        let refresh_token = token
            .refresh_token
            .clone()
            .ok_or_else(|| ProviderError::authentication("no refresh token stored"))?;

        debug!("refreshing expired access token");
        let grant = self.flow.refresh(&refresh_token).await?;
        token.apply_refresh(grant);

        if token.is_expired() {
            return Err(ProviderError::authentication(
                "refreshed token expires too soon to be used",
            ));
        }

        self.storage.save(&token)?;
        info!("access token refreshed");
        Ok(token)
    }

    /// Reads the token file; an unreadable file counts as no token.
    fn load(&self) -> Option<TokenInfo> {
        match self.storage.load() {
            Ok(token) => token,
            Err(e) => {
                warn!("ignoring stored token: {}", e);
                None
            }
        }
    }
}

/// Guidance printed when the interactive flow fails.
pub fn remediation(port: u16) -> String {
    format!(
        "Authorization did not complete. Please ensure:\n\
         1. Port {port} is accessible on this machine\n\
         2. You've opened the URL above in your browser\n\
         3. http://127.0.0.1:{port}/ is configured as a redirect URI in the Google Cloud Console"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::google::tokens::TokenGrant;
    use crate::provider::BoxFuture;
    use chrono::{Duration, Utc};
    use std::sync::Mutex;

    const SCOPE: &str = "https://www.googleapis.com/auth/calendar";

    fn scopes() -> Vec<String> {
        vec![SCOPE.to_string()]
    }

    fn expired(refresh: Option<&str>) -> TokenInfo {
        let mut token = TokenInfo::new("stale", refresh.map(String::from), Some(3600), scopes());
        token.expires_at = Some(Utc::now() - Duration::minutes(5));
        token
    }

    /// Counts calls and answers from a script.
    #[derive(Default)]
    struct Scripted {
        authorize_calls: Mutex<u32>,
        refresh_calls: Mutex<u32>,
        refresh_fails: bool,
        authorize_fails: bool,
    }

    impl AuthorizationFlow for Scripted {
        fn authorize<'a>(
            &'a self,
            scopes: &'a [String],
            _port: u16,
        ) -> BoxFuture<'a, ProviderResult<TokenInfo>> {
            Box::pin(async move {
                *self.authorize_calls.lock().unwrap() += 1;
                if self.authorize_fails {
                    return Err(ProviderError::authentication("authorization denied: access_denied"));
                }
                Ok(TokenInfo::new("fresh", Some("r".into()), Some(3600), scopes.to_vec()))
            })
        }

        fn refresh<'a>(&'a self, _refresh_token: &'a str) -> BoxFuture<'a, ProviderResult<TokenGrant>> {
            Box::pin(async move {
                *self.refresh_calls.lock().unwrap() += 1;
                if self.refresh_fails {
                    return Err(ProviderError::authentication("token refresh failed: invalid_grant"));
                }
                Ok(TokenGrant::new("refreshed", Some(3600)))
            })
        }
    }

    fn store(dir: &tempfile::TempDir, flow: Scripted) -> CredentialStore<Scripted> {
        CredentialStore::new(
            TokenStorage::new(dir.path().join("token.json")),
            flow,
            scopes(),
            8888,
        )
    }

    #[test]
    fn classify_states() {
        let valid = TokenInfo::new("a", None, Some(3600), scopes());
        assert_eq!(CredentialState::classify(None, &scopes()), CredentialState::NoToken);
        assert_eq!(
            CredentialState::classify(Some(&valid), &scopes()),
            CredentialState::Valid
        );
        assert_eq!(
            CredentialState::classify(Some(&expired(Some("r"))), &scopes()),
            CredentialState::ExpiredRefreshable
        );
        assert_eq!(
            CredentialState::classify(Some(&expired(None)), &scopes()),
            CredentialState::ExpiredTerminal
        );

        let narrow = TokenInfo::new("a", Some("r".into()), Some(3600), vec!["other".into()]);
        assert_eq!(
            CredentialState::classify(Some(&narrow), &scopes()),
            CredentialState::ExpiredTerminal
        );
    }

    #[tokio::test]
    async fn valid_token_is_returned_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir, Scripted::default());
        let token = TokenInfo::new("good", None, Some(3600), scopes());
        store.storage().save(&token).unwrap();

        assert_eq!(store.authenticate().await.unwrap(), token);
        assert_eq!(*store.flow().authorize_calls.lock().unwrap(), 0);
        assert_eq!(*store.flow().refresh_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_once_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir, Scripted::default());
        store.storage().save(&expired(Some("r"))).unwrap();

        let token = store.authenticate().await.unwrap();
        assert_eq!(token.access_token, "refreshed");
        assert!(token.expires_at.unwrap() > Utc::now());
        assert_eq!(store.storage().load().unwrap(), Some(token));
        assert_eq!(*store.flow().refresh_calls.lock().unwrap(), 1);
        assert_eq!(*store.flow().authorize_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_refresh_falls_back_to_authorization() {
        let dir = tempfile::tempdir().unwrap();
        let flow = Scripted {
            refresh_fails: true,
            ..Default::default()
        };
        let store = store(&dir, flow);
        store.storage().save(&expired(Some("revoked"))).unwrap();

        let token = store.authenticate().await.unwrap();
        assert_eq!(token.access_token, "fresh");
        assert_eq!(*store.flow().refresh_calls.lock().unwrap(), 1);
        assert_eq!(*store.flow().authorize_calls.lock().unwrap(), 1);
        assert_eq!(store.state(), CredentialState::Valid);
    }

    #[tokio::test]
    async fn unparseable_file_counts_as_no_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir, Scripted::default());
        std::fs::write(store.storage().path(), "{ garbage").unwrap();

        assert_eq!(store.state(), CredentialState::NoToken);
        let token = store.authenticate().await.unwrap();
        assert_eq!(token.access_token, "fresh");
    }

    #[tokio::test]
    async fn failed_authorization_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let flow = Scripted {
            authorize_fails: true,
            ..Default::default()
        };
        let store = store(&dir, flow);

        let err = store.authenticate().await.unwrap_err();
        assert!(err.is_authentication());
        assert!(!store.storage().path().exists());
    }

    #[tokio::test]
    async fn refresh_token_never_authorizes() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir, Scripted::default());
        assert!(!store.refresh_token().await.unwrap());

        store.storage().save(&expired(None)).unwrap();
        assert!(!store.refresh_token().await.unwrap());

        store.storage().save(&expired(Some("r"))).unwrap();
        assert!(store.refresh_token().await.unwrap());
        assert_eq!(store.state(), CredentialState::Valid);
        assert_eq!(*store.flow().authorize_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_refresh_call_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let flow = Scripted {
            refresh_fails: true,
            ..Default::default()
        };
        let store = store(&dir, flow);
        store.storage().save(&expired(Some("revoked"))).unwrap();

        assert!(store.refresh_token().await.is_err());
        assert_eq!(*store.flow().authorize_calls.lock().unwrap(), 0);
    }

    #[test]
    fn remediation_names_port() {
        let text = remediation(8888);
        assert!(text.contains("Port 8888 is accessible"));
        assert!(text.contains("http://127.0.0.1:8888/"));
    }
}
