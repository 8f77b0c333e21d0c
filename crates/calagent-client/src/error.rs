//! Client error types.

use std::fmt;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug)]
pub enum ClientError {
    /// Configuration error.
    Config(String),
    /// Calendar provider error.
    Provider(calagent_providers::ProviderError),
    /// Chat agent error.
    Agent(calagent_agent::AgentError),
    /// Invalid command-line input (bad timestamp, empty summary, ...).
    Input(String),
    /// The calendar service did not carry out the operation.
    Failed(String),
    /// IO error.
    Io(std::io::Error),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Provider(err) => write!(f, "{}", err),
            Self::Agent(err) => write!(f, "agent error: {}", err),
            Self::Input(msg) => write!(f, "invalid input: {}", msg),
            Self::Failed(msg) => write!(f, "{}", msg),
            Self::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Provider(err) => Some(err),
            Self::Agent(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<calagent_providers::ProviderError> for ClientError {
    fn from(err: calagent_providers::ProviderError) -> Self {
        Self::Provider(err)
    }
}

impl From<calagent_agent::AgentError> for ClientError {
    fn from(err: calagent_agent::AgentError) -> Self {
        Self::Agent(err)
    }
}

impl From<calagent_core::TimeParseError> for ClientError {
    fn from(err: calagent_core::TimeParseError) -> Self {
        Self::Input(err.to_string())
    }
}

impl From<calagent_core::DraftError> for ClientError {
    fn from(err: calagent_core::DraftError) -> Self {
        Self::Input(err.to_string())
    }
}

impl From<calagent_core::TracingError> for ClientError {
    fn from(err: calagent_core::TracingError) -> Self {
        Self::Config(err.to_string())
    }
}
