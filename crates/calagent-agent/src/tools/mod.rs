//! A registry of named, self-describing tools the model can call.
//!
//! Each tool pairs a [`ToolSchema`] (name, description, JSON-schema
//! parameters) with a handler that takes JSON arguments and always returns
//! text. Handlers never fail: errors are rendered into the returned text so
//! the model can explain them to the user.

mod calendar;

use std::collections::BTreeMap;
use std::sync::Arc;

use calagent_providers::BoxFuture;
use serde::Serialize;
use serde_json::{Value, json};

pub use calendar::calendar_tools;

/// Handler invoked with the decoded JSON arguments of a tool call.
pub type ToolHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, String> + Send + Sync>;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Property {
    pub r#type: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Property>>,
}

impl Property {
    pub fn string(description: &str) -> Self {
        Self::of("string", description)
    }

    pub fn integer(description: &str) -> Self {
        Self::of("integer", description)
    }

    pub fn string_list(description: &str) -> Self {
        Self {
            items: Some(Box::new(Self::of("string", "An email address"))),
            ..Self::of("array", description)
        }
    }

    fn of(r#type: &str, description: &str) -> Self {
        Self {
            r#type: r#type.to_string(),
            description: description.to_string(),
            items: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Parameters {
    pub r#type: String,
    pub properties: BTreeMap<String, Property>,
    pub required: Vec<String>,
    #[serde(rename = "additionalProperties")]
    pub additional_properties: bool,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            r#type: String::from("object"),
            properties: BTreeMap::new(),
            required: Vec::new(),
            additional_properties: false,
        }
    }
}

/// Name, description and parameter schema of one tool.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Parameters,
}

impl ToolSchema {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: Parameters::default(),
        }
    }

    /// Adds a required parameter.
    pub fn required(mut self, name: &str, property: Property) -> Self {
        self.parameters.required.push(name.to_string());
        self.optional(name, property)
    }

    /// Adds an optional parameter.
    pub fn optional(mut self, name: &str, property: Property) -> Self {
        self.parameters.properties.insert(name.to_string(), property);
        self
    }
}

struct Tool {
    schema: ToolSchema,
    handler: ToolHandler,
}

/// Tools in registration order, looked up by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool, replacing any tool with the same name.
    pub fn register(&mut self, schema: ToolSchema, handler: ToolHandler) {
        self.tools.retain(|t| t.schema.name != schema.name);
        self.tools.push(Tool { schema, handler });
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.schema.name.as_str()).collect()
    }

    pub fn schema(&self, name: &str) -> Option<&ToolSchema> {
        self.find(name).map(|t| &t.schema)
    }

    /// Calls the named tool. Unknown names produce an observation rather
    /// than an error.
    pub async fn call(&self, name: &str, args: Value) -> String {
        match self.find(name) {
            Some(tool) => (tool.handler)(args).await,
            None => format!(
                "Unknown tool '{}'. Available tools: {}.",
                name,
                self.names().join(", ")
            ),
        }
    }

    /// Serializes the registry as a chat-completions `tools` array.
    pub fn to_openai(&self) -> Value {
        Value::Array(
            self.tools
                .iter()
                .map(|t| json!({"type": "function", "function": t.schema}))
                .collect(),
        )
    }

    fn find(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.schema.name == name)
    }
}
