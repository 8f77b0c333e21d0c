//! The conversational agent.
//!
//! An [`Agent`] sends the transcript and the tool catalog to an
//! OpenAI-compatible chat completions endpoint, runs every tool call the
//! model asks for, feeds the observations back, and repeats until the model
//! answers with text or [`DEFAULT_MAX_ROUNDS`] rounds have passed.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{AgentError, AgentResult};
use crate::openai::{FunctionCall, Message, Role, completion};
use crate::prompt::SYSTEM_PROMPT;
use crate::tools::ToolRegistry;

/// Upper bound on model round trips for a single user turn.
pub const DEFAULT_MAX_ROUNDS: usize = 8;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const GOOGLE_GENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Hosted model providers with an OpenAI-compatible endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelProvider {
    OpenAi,
    #[default]
    GoogleGenai,
}

impl ModelProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::GoogleGenai => "google_genai",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => OPENAI_BASE_URL,
            Self::GoogleGenai => GOOGLE_GENAI_BASE_URL,
        }
    }
}

impl FromStr for ModelProvider {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "openai" => Ok(Self::OpenAi),
            "google_genai" | "google" | "gemini" => Ok(Self::GoogleGenai),
            other => Err(AgentError::UnknownProvider(other.to_string())),
        }
    }
}

impl fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which model to talk to and how.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub provider: ModelProvider,
    pub model: String,
    pub api_key: Option<String>,
    /// Overrides the provider's default base URL.
    pub api_base: Option<String>,
    pub timeout: Duration,
}

impl ModelConfig {
    pub fn new(provider: ModelProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            api_key: None,
            api_base: None,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The endpoint root, without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.api_base
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .unwrap_or(self.provider.default_base_url())
            .trim_end_matches('/')
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::new(ModelProvider::GoogleGenai, "gemini-2.5-flash")
    }
}

/// The running transcript of one chat session.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(system_prompt: &str) -> Self {
        Self {
            messages: vec![Message::new(Role::System, system_prompt)],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }
}

pub struct Agent {
    config: ModelConfig,
    api_key: String,
    tools: ToolRegistry,
    tools_json: Value,
    system_prompt: String,
    max_rounds: usize,
    http: reqwest::Client,
}

impl Agent {
    /// Creates an agent. Fails when no API key is configured.
    pub fn new(config: ModelConfig, tools: ToolRegistry) -> AgentResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AgentError::MissingApiKey(config.provider.to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        let tools_json = tools.to_openai();
        Ok(Self {
            config,
            api_key,
            tools,
            tools_json,
            system_prompt: SYSTEM_PROMPT.to_string(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            http,
        })
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_rounds(mut self, rounds: usize) -> Self {
        self.max_rounds = rounds.max(1);
        self
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Starts a new transcript seeded with the system prompt.
    pub fn conversation(&self) -> Conversation {
        Conversation::new(&self.system_prompt)
    }

    /// Runs one user turn and returns the model's answer.
    ///
    /// The user message, every tool round, and the answer are appended to
    /// `conversation`. On error the transcript keeps whatever was appended
    /// before the failure.
    pub async fn send(&self, conversation: &mut Conversation, input: &str) -> AgentResult<String> {
        conversation.push(Message::new(Role::User, input));

        for round in 1..=self.max_rounds {
            let reply = completion(
                &self.http,
                self.config.base_url(),
                &self.api_key,
                &self.config.model,
                conversation.messages(),
                &self.tools_json,
            )
            .await?;

            let calls = reply.requested_tool_calls().to_vec();
            if calls.is_empty() {
                let content = reply.content.clone().ok_or_else(|| {
                    AgentError::MalformedResponse(String::from(
                        "assistant message has neither content nor tool calls",
                    ))
                })?;
                conversation.push(Message::new(Role::Assistant, &content));
                return Ok(content);
            }

            debug!(round, calls = calls.len(), "model requested tools");
            conversation.push(Message::new_tool_call_request(calls.clone()));
            for call in &calls {
                let observation = self.dispatch(call).await;
                conversation.push(Message::new_tool_call_response(&observation, &call.id));
            }
        }

        warn!("model did not answer within {} rounds", self.max_rounds);
        Err(AgentError::RoundLimit(self.max_rounds))
    }

    async fn dispatch(&self, call: &FunctionCall) -> String {
        let name = call.function.name.as_str();
        let raw = call.function.arguments.trim();
        info!(tool = name, "dispatching tool call {}", call.id);

        let args = if raw.is_empty() {
            Value::Null
        } else {
            match serde_json::from_str::<Value>(raw) {
                Ok(args) => args,
                Err(e) => return format!("Invalid arguments for {}: {}", name, e),
            }
        };
        self.tools.call(name, args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names() {
        assert_eq!("openai".parse::<ModelProvider>().unwrap(), ModelProvider::OpenAi);
        assert_eq!(
            "google_genai".parse::<ModelProvider>().unwrap(),
            ModelProvider::GoogleGenai
        );
        assert_eq!(
            "Google-GenAI".parse::<ModelProvider>().unwrap(),
            ModelProvider::GoogleGenai
        );
        assert!(matches!(
            "anthropic".parse::<ModelProvider>(),
            Err(AgentError::UnknownProvider(_))
        ));
    }

    #[test]
    fn base_url_defaults_per_provider() {
        let openai = ModelConfig::new(ModelProvider::OpenAi, "gpt-4o-mini");
        assert_eq!(openai.base_url(), "https://api.openai.com/v1");

        let google = ModelConfig::default();
        assert_eq!(
            google.base_url(),
            "https://generativelanguage.googleapis.com/v1beta/openai"
        );

        let custom = openai.with_api_base("http://localhost:11434/v1/");
        assert_eq!(custom.base_url(), "http://localhost:11434/v1");
    }

    #[test]
    fn agent_requires_api_key() {
        let err = Agent::new(ModelConfig::default(), ToolRegistry::new())
            .err()
            .unwrap();
        assert!(matches!(err, AgentError::MissingApiKey(p) if p == "google_genai"));

        let blank = ModelConfig::default().with_api_key("  ");
        assert!(Agent::new(blank, ToolRegistry::new()).is_err());
    }

    #[test]
    fn conversation_starts_with_system_prompt() {
        let agent = Agent::new(
            ModelConfig::default().with_api_key("key"),
            ToolRegistry::new(),
        )
        .unwrap()
        .with_system_prompt("be brief");
        let conversation = agent.conversation();
        assert_eq!(conversation.messages().len(), 1);
        assert_eq!(conversation.messages()[0].role, Role::System);
        assert_eq!(conversation.messages()[0].content.as_deref(), Some("be brief"));
    }
}
