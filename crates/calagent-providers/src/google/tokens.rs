//! OAuth token persistence.
//!
//! The credential is a single JSON file. It is rewritten atomically after
//! every interactive authorization and every refresh, and is only ever
//! removed by the user.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

/// Safety margin subtracted from the server-reported lifetime.
const EXPIRY_BUFFER_SECS: i64 = 60;

/// A successful response from the OAuth token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Space separated scopes, when the server reports them.
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenGrant {
    pub fn new(access_token: impl Into<String>, expires_in: Option<i64>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_in,
            scope: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }
}

/// A stored OAuth credential.
///
/// Also reads the authorized-user layout written by Google's own client
/// libraries (`token`, `expiry`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// The access token for API requests.
    #[serde(alias = "token")]
    pub access_token: String,

    /// The refresh token for obtaining new access tokens.
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// When the access token stops being usable.
    #[serde(default, alias = "expiry")]
    pub expires_at: Option<DateTime<Utc>>,

    /// The OAuth scopes that were granted.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// When the token was last obtained or refreshed.
    #[serde(default)]
    pub last_refresh: Option<DateTime<Utc>>,
}

impl TokenInfo {
    /// Creates a token that was just issued.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: expires_in_secs.map(expiry_from_now),
            scopes,
            last_refresh: Some(Utc::now()),
        }
    }

    /// Creates a token from an authorization-code exchange.
    ///
    /// Scopes reported by the server win over the requested ones.
    pub fn from_grant(grant: TokenGrant, requested_scopes: &[String]) -> Self {
        let scopes = grant
            .scope
            .as_deref()
            .map(|s| s.split_whitespace().map(String::from).collect())
            .unwrap_or_else(|| requested_scopes.to_vec());
        Self::new(grant.access_token, grant.refresh_token, grant.expires_in, scopes)
    }

    /// Applies a refresh response.
    ///
    /// The refresh token is kept unless the server rotated it.
    pub fn apply_refresh(&mut self, grant: TokenGrant) {
        self.access_token = grant.access_token;
        if let Some(refresh_token) = grant.refresh_token {
            self.refresh_token = Some(refresh_token);
        }
        self.expires_at = grant.expires_in.map(expiry_from_now);
        self.last_refresh = Some(Utc::now());
    }

    /// Returns true if the access token is expired.
    ///
    /// A token without a recorded expiry is taken as valid.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|expires_at| Utc::now() >= expires_at)
    }

    /// Returns true if a refresh token is stored.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Returns true if every required scope was granted.
    pub fn has_scopes(&self, required: &[String]) -> bool {
        required.iter().all(|scope| self.scopes.contains(scope))
    }

    /// Returns the time until the token expires, if known.
    pub fn time_until_expiry(&self) -> Option<Duration> {
        self.expires_at.map(|expires_at| expires_at - Utc::now())
    }
}

fn expiry_from_now(secs: i64) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(secs) - Duration::seconds(EXPIRY_BUFFER_SECS)
}

/// File-backed token storage.
///
/// Holds no state besides the path; every read goes to disk.
#[derive(Debug, Clone)]
pub struct TokenStorage {
    path: PathBuf,
}

impl TokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Reads the stored token.
    ///
    /// Returns `Ok(None)` when no file exists and an error when the file
    /// cannot be read or parsed.
    pub fn load(&self) -> ProviderResult<Option<TokenInfo>> {
        if !self.path.exists() {
            debug!("no token file at {:?}", self.path);
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            ProviderError::configuration(format!("failed to read token file: {}", e))
                .with_source(e)
        })?;

        let token: TokenInfo = serde_json::from_str(&content).map_err(|e| {
            ProviderError::configuration(format!(
                "failed to parse token file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        debug!("loaded token from {:?}", self.path);
        Ok(Some(token))
    }

    /// Writes the token, replacing any previous one.
    pub fn save(&self, token: &TokenInfo) -> ProviderResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                ProviderError::configuration(format!("failed to create token directory: {}", e))
            })?;
        }

        let content = serde_json::to_string_pretty(token)
            .map_err(|e| ProviderError::internal(format!("failed to serialize token: {}", e)))?;

        // Write to a sibling file first so a crash never leaves a torn token
        let temp_path = self.temp_path();
        fs::write(&temp_path, &content).map_err(|e| {
            ProviderError::configuration(format!("failed to write token file: {}", e))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            let _ = fs::set_permissions(&temp_path, perms);
        }

        fs::rename(&temp_path, &self.path).map_err(|e| {
            ProviderError::configuration(format!("failed to rename token file: {}", e))
        })?;

        debug!("saved token to {:?}", self.path);
        Ok(())
    }

    /// Returns the token file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "token.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scopes() -> Vec<String> {
        vec!["https://www.googleapis.com/auth/calendar".to_string()]
    }

    #[test]
    fn new_token_expires_early() {
        let token = TokenInfo::new("access", Some("refresh".into()), Some(3600), scopes());
        assert!(!token.is_expired());
        assert!(token.can_refresh());

        let remaining = token.time_until_expiry().unwrap();
        assert!(remaining <= Duration::seconds(3600 - EXPIRY_BUFFER_SECS));
        assert!(remaining > Duration::seconds(3400));
    }

    #[test]
    fn short_lived_grant_is_already_expired() {
        let token = TokenInfo::new("access", None, Some(30), scopes());
        assert!(token.is_expired());
    }

    #[test]
    fn no_expiry_is_valid() {
        let token = TokenInfo::new("access", None, None, vec![]);
        assert!(!token.is_expired());
        assert!(!token.can_refresh());
    }

    #[test]
    fn grant_scopes_override_requested() {
        let grant = TokenGrant {
            access_token: "a".into(),
            refresh_token: Some("r".into()),
            expires_in: Some(3600),
            scope: Some("scope1 scope2".into()),
        };
        let token = TokenInfo::from_grant(grant, &scopes());
        assert_eq!(token.scopes, vec!["scope1", "scope2"]);

        let token = TokenInfo::from_grant(TokenGrant::new("a", Some(3600)), &scopes());
        assert_eq!(token.scopes, scopes());
    }

    #[test]
    fn refresh_keeps_refresh_token_unless_rotated() {
        let mut token = TokenInfo::new("old", Some("r1".into()), Some(3600), scopes());
        token.expires_at = Some(Utc::now() - Duration::hours(1));
        assert!(token.is_expired());

        token.apply_refresh(TokenGrant::new("new", Some(3600)));
        assert_eq!(token.access_token, "new");
        assert_eq!(token.refresh_token.as_deref(), Some("r1"));
        assert!(!token.is_expired());

        token.apply_refresh(TokenGrant::new("newer", Some(3600)).with_refresh_token("r2"));
        assert_eq!(token.refresh_token.as_deref(), Some("r2"));
    }

    #[test]
    fn scope_check() {
        let token = TokenInfo::new("a", None, None, vec!["s1".into(), "s2".into()]);
        assert!(token.has_scopes(&["s1".to_string()]));
        assert!(!token.has_scopes(&["s3".to_string()]));
    }

    #[test]
    fn reads_authorized_user_layout() {
        let json = r#"{
            "token": "ya29.a0",
            "refresh_token": "1//0g",
            "client_id": "id.apps.googleusercontent.com",
            "scopes": ["https://www.googleapis.com/auth/calendar"],
            "expiry": "2025-10-09T14:00:00.123456Z"
        }"#;
        let token: TokenInfo = serde_json::from_str(json).unwrap();
        assert_eq!(token.access_token, "ya29.a0");
        assert!(token.can_refresh());
        assert!(token.is_expired());
        assert!(token.last_refresh.is_none());
    }

    #[test]
    fn storage_roundtrip_and_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TokenStorage::new(dir.path().join("nested").join("token.json"));
        assert!(storage.load().unwrap().is_none());

        let token = TokenInfo::new("access", Some("refresh".into()), Some(3600), scopes());
        storage.save(&token).unwrap();
        assert_eq!(storage.load().unwrap(), Some(token));
        assert!(!dir.path().join("nested").join("token.json.tmp").exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(storage.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn unparseable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, "not json").unwrap();

        let err = TokenStorage::new(&path).load().unwrap_err();
        assert!(err.message().contains("failed to parse token file"));
    }
}
