//! Calendar tools and the conversational agent.
//!
//! - [`ToolRegistry`] - Named, self-describing callables over a [`CalendarProvider`]
//! - [`Agent`] - Drives an OpenAI-compatible chat model through tool calls
//!
//! [`CalendarProvider`]: calagent_providers::CalendarProvider

pub mod agent;
pub mod error;
pub mod openai;
pub mod prompt;
pub mod tools;

pub use agent::{Agent, Conversation, DEFAULT_MAX_ROUNDS, ModelConfig, ModelProvider};
pub use error::{AgentError, AgentResult};
pub use openai::{FunctionCall, FunctionCallFn, Message, Role};
pub use prompt::SYSTEM_PROMPT;
pub use tools::{ToolHandler, ToolRegistry, ToolSchema, calendar_tools};
