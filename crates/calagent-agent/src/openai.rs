//! Wire types for the OpenAI-compatible chat completions protocol.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{AgentError, AgentResult};

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "user")]
    User,
    #[serde(rename = "tool")]
    Tool,
}

// {
//     "role": "assistant",
//     "content": null,
//     "tool_calls": [
//         {
//             "id": "call_KCg5V0N5E7hHHrUwdefHBfgL",
//             "type": "function",
//             "function": {
//                 "name": "list_calendar_events",
//                 "arguments": "{\"max_results\":20}"
//             }
//         }
//     ]
// }
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct FunctionCallFn {
    pub arguments: String,
    pub name: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct FunctionCall {
    pub function: FunctionCallFn,
    pub id: String,
    #[serde(default = "function_type")]
    pub r#type: String,
}

fn function_type() -> String {
    String::from("function")
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<FunctionCall>>,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: Some(content.to_string()),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn new_tool_call_request(tool_calls: Vec<FunctionCall>) -> Self {
        Message {
            role: Role::Assistant,
            content: None,
            tool_call_id: None,
            tool_calls: Some(tool_calls),
        }
    }

    pub fn new_tool_call_response(content: &str, tool_call_id: &str) -> Self {
        Message {
            role: Role::Tool,
            content: Some(content.to_string()),
            tool_call_id: Some(tool_call_id.to_string()),
            tool_calls: None,
        }
    }

    /// Returns the tool calls requested by this message, if any.
    pub fn requested_tool_calls(&self) -> &[FunctionCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: Message,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

/// Sends one non-streaming completion request and returns the first
/// choice's message.
///
/// `base_url` already carries the API version, e.g. `https://api.openai.com/v1`.
pub async fn completion(
    client: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    model: &str,
    messages: &[Message],
    tools: &Value,
) -> AgentResult<Message> {
    let mut payload = json!({
        "model": model,
        "messages": messages,
    });
    if tools.as_array().is_some_and(|t| !t.is_empty()) {
        payload["tools"] = tools.clone();
    }

    let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));
    debug!("POST {} ({} messages)", url, messages.len());

    let response = client
        .post(url)
        .bearer_auth(api_key)
        .json(&payload)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AgentError::Api {
            status: status.as_u16(),
            body,
        });
    }

    let body = response.text().await?;
    let parsed: CompletionResponse = serde_json::from_str(&body)
        .map_err(|e| AgentError::MalformedResponse(format!("{}: {}", e, body)))?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AgentError::MalformedResponse(format!("no choices: {}", body)))?;
    debug!("finish_reason: {:?}", choice.finish_reason);

    Ok(choice.message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_call_request_has_null_content_omitted() {
        let msg = Message::new_tool_call_request(vec![FunctionCall {
            function: FunctionCallFn {
                arguments: "{}".into(),
                name: "get_current_time".into(),
            },
            id: "call_1".into(),
            r#type: "function".into(),
        }]);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "assistant");
        assert!(value.get("content").is_none());
        assert_eq!(value["tool_calls"][0]["function"]["name"], "get_current_time");
    }

    #[test]
    fn tool_response_carries_call_id() {
        let msg = Message::new_tool_call_response("No calendars found.", "call_9");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({"role": "tool", "content": "No calendars found.", "tool_call_id": "call_9"})
        );
    }

    #[test]
    fn assistant_message_with_null_content_parses() {
        let msg: Message = serde_json::from_value(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_abc",
                "function": {"name": "get_calendars", "arguments": "{}"}
            }]
        }))
        .unwrap();
        assert_eq!(msg.content, None);
        assert_eq!(msg.requested_tool_calls().len(), 1);
        assert_eq!(msg.requested_tool_calls()[0].r#type, "function");
    }

    #[tokio::test]
    async fn completion_surfaces_api_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error":"bad key"}"#)
            .create_async()
            .await;

        let err = completion(
            &reqwest::Client::new(),
            &server.url(),
            "key",
            "model",
            &[Message::new(Role::User, "hi")],
            &json!([]),
        )
        .await
        .unwrap_err();

        match err {
            AgentError::Api { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("bad key"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn completion_rejects_empty_choices() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices": []}"#)
            .create_async()
            .await;

        let err = completion(
            &reqwest::Client::new(),
            &server.url(),
            "key",
            "model",
            &[Message::new(Role::User, "hi")],
            &json!([]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AgentError::MalformedResponse(_)));
    }
}
