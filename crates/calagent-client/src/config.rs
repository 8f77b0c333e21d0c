//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/calagent/config.toml` by default. Every field has a default,
//! and `CALAGENT_*` environment variables override the file.
//!
//! ```toml
//! credentials_file = "credentials.json"
//! token_file = "token.json"
//! auth_port = 8888
//! log_format = "compact"
//!
//! [model]
//! provider = "google_genai"
//! name = "gemini-2.5-flash"
//! api_key = "env::GEMINI_KEY"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use calagent_agent::{ModelConfig, ModelProvider};
use calagent_core::TracingConfig;
use calagent_providers::google::{GoogleConfig, OAuthCredentials};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

/// Immutable snapshot of everything the commands need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Google Cloud Console client-secrets JSON.
    pub credentials_file: PathBuf,

    /// Where the OAuth token is persisted.
    pub token_file: PathBuf,

    /// OAuth scopes to request.
    pub scopes: Vec<String>,

    /// Loopback port for the authorization redirect.
    pub auth_port: u16,

    /// Open the authorization URL in a browser automatically.
    pub open_browser: bool,

    /// Log level for the `calagent` crates.
    pub log_level: String,

    /// Log line format: `compact`, `pretty` or `json`.
    pub log_format: String,

    /// Timeout for calendar API requests.
    pub timeout_secs: u64,

    /// Chat model settings.
    pub model: ModelSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            credentials_file: PathBuf::from("credentials.json"),
            token_file: PathBuf::from("token.json"),
            scopes: vec![DEFAULT_SCOPE.to_string()],
            auth_port: 8888,
            open_browser: false,
            log_level: "info".to_string(),
            log_format: "compact".to_string(),
            timeout_secs: 30,
            model: ModelSettings::default(),
        }
    }
}

/// Chat model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// `openai` or `google_genai`.
    pub provider: String,

    /// Model name as the provider knows it.
    pub name: String,

    /// API key (supports `pass::` and `env::` references).
    pub api_key: Option<String>,

    /// Overrides the provider's endpoint.
    pub api_base: Option<String>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            provider: ModelProvider::default().as_str().to_string(),
            name: "gemini-2.5-flash".to_string(),
            api_key: None,
            api_base: None,
        }
    }
}

impl Settings {
    /// Loads the file (explicit path, or the default one if it exists) and
    /// applies the process environment.
    pub fn load(path: Option<&Path>) -> ClientResult<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::from_file(&default)?
                } else {
                    Self::default()
                }
            }
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Parses a TOML file.
    pub fn from_file(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
            .map_err(|e| ClientError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parses TOML text.
    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("failed to parse config: {}", e))
    }

    /// Applies `CALAGENT_*` overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ClientResult<()> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("CALAGENT_CREDENTIALS_FILE") {
            self.credentials_file = PathBuf::from(v);
        }
        if let Some(v) = var("CALAGENT_TOKEN_FILE") {
            self.token_file = PathBuf::from(v);
        }
        if let Some(v) = var("CALAGENT_SCOPES") {
            self.scopes = split_scopes(&v);
        }
        if let Some(v) = var("CALAGENT_AUTH_PORT") {
            self.auth_port = parse_env("CALAGENT_AUTH_PORT", &v)?;
        }
        if let Some(v) = var("CALAGENT_OPEN_BROWSER") {
            self.open_browser = parse_bool("CALAGENT_OPEN_BROWSER", &v)?;
        }
        if let Some(v) = var("CALAGENT_LOG_LEVEL") {
            self.log_level = v;
        }
        if let Some(v) = var("CALAGENT_LOG_FORMAT") {
            self.log_format = v;
        }
        if let Some(v) = var("CALAGENT_TIMEOUT_SECS") {
            self.timeout_secs = parse_env("CALAGENT_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = var("CALAGENT_MODEL_PROVIDER") {
            self.model.provider = v;
        }
        if let Some(v) = var("CALAGENT_MODEL_NAME") {
            self.model.name = v;
        }
        if let Some(v) = var("CALAGENT_API_KEY") {
            self.model.api_key = Some(v);
        } else if self.model.api_key.is_none()
            && let Some(v) = var("GOOGLE_API_KEY")
        {
            self.model.api_key = Some(v);
        }
        if let Some(v) = var("CALAGENT_API_BASE") {
            self.model.api_base = Some(v);
        }
        Ok(())
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("calagent")
            .join("config.toml")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Builds the Google provider configuration, reading the
    /// client-secrets file.
    pub fn google_config(&self) -> ClientResult<GoogleConfig> {
        let credentials = OAuthCredentials::from_file(&self.credentials_file)?;
        let config = GoogleConfig::new(credentials)
            .with_token_path(&self.token_file)
            .with_scopes(self.scopes.clone())
            .with_auth_port(self.auth_port)
            .with_open_browser(self.open_browser)
            .with_timeout(self.timeout());
        config.validate()?;
        Ok(config)
    }

    /// Builds the chat model configuration, resolving the API key.
    pub fn model_config(&self) -> ClientResult<ModelConfig> {
        let provider: ModelProvider = self.model.provider.parse()?;
        let mut config = ModelConfig::new(provider, &self.model.name);

        if let Some(key) = &self.model.api_key {
            config = config.with_api_key(crate::secret::resolve(key)?);
        }
        if let Some(base) = &self.model.api_base {
            config = config.with_api_base(base);
        }
        Ok(config)
    }

    /// Builds the tracing setup. `debug` forces DEBUG with file and line
    /// but keeps the configured format.
    pub fn tracing_config(&self, debug: bool) -> ClientResult<TracingConfig> {
        let config = if debug {
            TracingConfig::cli_debug()
        } else {
            TracingConfig::cli().with_level_name(&self.log_level)?
        };
        Ok(config.with_format_name(&self.log_format)?)
    }
}

fn split_scopes(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> ClientResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ClientError::Config(format!("{}={}: {}", key, value, e)))
}

fn parse_bool(key: &str, value: &str) -> ClientResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ClientError::Config(format!(
            "{}={}: expected true or false",
            key, value
        ))),
    }
}
