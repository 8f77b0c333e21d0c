//! Error types for the agent.

use thiserror::Error;

/// Errors returned while talking to the chat model.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The request did not complete.
    #[error("chat request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The model endpoint answered with a non-success status.
    #[error("chat completion failed (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    /// The response could not be understood.
    #[error("malformed chat response: {0}")]
    MalformedResponse(String),

    /// The model kept calling tools without answering.
    #[error("no answer after {0} tool rounds")]
    RoundLimit(usize),

    /// No API key was configured for the model provider.
    #[error("no API key configured for model provider '{0}'")]
    MissingApiKey(String),

    /// The model provider name is not recognized.
    #[error("unknown model provider '{0}' (expected openai or google_genai)")]
    UnknownProvider(String),
}

/// Result type for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;
