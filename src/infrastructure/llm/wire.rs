//! Chat-completions wire format shared by the OpenAI-compatible providers

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::llm::{
    FinishReason, LlmRequest, LlmResponse, Message, ToolCall, ToolChoice, ToolDefinition, Usage,
};
use crate::domain::DomainError;

/// Build a request body. `model` is omitted for deployment-addressed APIs.
pub(super) fn build_body(model: Option<&str>, request: &LlmRequest) -> Value {
    let messages: Vec<WireMessage> = request.messages.iter().map(WireMessage::from_domain).collect();

    let mut body = json!({ "messages": messages });

    if let Some(model) = model {
        body["model"] = json!(model);
    }

    if let Some(temp) = request.temperature {
        body["temperature"] = json!(temp);
    }

    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }

    if request.has_tools() {
        let tools: Vec<Value> = request.tools.iter().map(tool_definition).collect();
        body["tools"] = json!(tools);

        if let Some(ref choice) = request.tool_choice {
            body["tool_choice"] = tool_choice(choice);
        }

        if let Some(parallel) = request.parallel_tool_calls {
            body["parallel_tool_calls"] = json!(parallel);
        }
    }

    body
}

fn tool_definition(tool: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

fn tool_choice(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::None => json!("none"),
        ToolChoice::Required => json!("required"),
        ToolChoice::Function(name) => json!({
            "type": "function",
            "function": { "name": name }
        }),
    }
}

/// Parse a chat-completions response body
pub(super) fn parse_response(provider: &str, json: Value) -> Result<LlmResponse, DomainError> {
    let response: WireResponse = serde_json::from_value(json).map_err(|e| {
        DomainError::provider(provider, format!("Failed to parse response: {}", e))
    })?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| DomainError::provider(provider, "No choices in response"))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| ToolCall::new(call.id, call.function.name, parse_arguments(&call.function.arguments)))
        .collect();

    let message = Message::assistant_with_tool_calls(choice.message.content, tool_calls);

    let mut llm_response = LlmResponse::new(response.id, response.model, message);

    if let Some(reason) = choice.finish_reason {
        llm_response = llm_response.with_finish_reason(FinishReason::parse(&reason));
    }

    if let Some(usage) = response.usage {
        llm_response =
            llm_response.with_usage(Usage::new(usage.prompt_tokens, usage.completion_tokens));
    }

    Ok(llm_response)
}

/// Decode tool-call arguments; anything that is not valid JSON is kept as
/// the raw string so the tool reports it back to the model.
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return json!({});
    }

    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn encode_arguments(arguments: &Value) -> String {
    match arguments {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
enum WireMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<WireToolCall>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

impl WireMessage {
    fn from_domain(message: &Message) -> Self {
        match message {
            Message::System { content } => Self::System {
                content: content.clone(),
            },
            Message::User { content } => Self::User {
                content: content.clone(),
            },
            Message::Assistant {
                content,
                tool_calls,
            } => Self::Assistant {
                content: content.clone(),
                tool_calls: tool_calls
                    .iter()
                    .map(|call| WireToolCall {
                        id: call.id.clone(),
                        kind: "function",
                        function: WireFunctionCall {
                            name: call.name.clone(),
                            arguments: encode_arguments(&call.arguments),
                        },
                    })
                    .collect(),
            },
            Message::Tool {
                tool_call_id,
                content,
                ..
            } => Self::Tool {
                tool_call_id: tool_call_id.clone(),
                content: content.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireResponseToolCall {
    id: String,
    function: WireResponseFunction,
}

#[derive(Debug, Deserialize)]
struct WireResponseFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::ToolStatus;

    #[test]
    fn test_messages_serialize_per_role() {
        let request = LlmRequest::builder()
            .system("be precise")
            .user("how many orders?")
            .message(Message::assistant_with_tool_calls(
                None,
                vec![ToolCall::new("call_1", "db_query_tool", json!({"query": "SELECT 1"}))],
            ))
            .message(Message::tool("call_1", "[(1,)]", ToolStatus::Success))
            .build();

        let body = build_body(None, &request);
        let messages = body["messages"].as_array().unwrap();

        assert_eq!(messages[0], json!({"role": "system", "content": "be precise"}));
        assert_eq!(messages[1], json!({"role": "user", "content": "how many orders?"}));
        assert_eq!(
            messages[2],
            json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "db_query_tool", "arguments": "{\"query\":\"SELECT 1\"}"}
                }]
            })
        );
        assert_eq!(
            messages[3],
            json!({"role": "tool", "tool_call_id": "call_1", "content": "[(1,)]"})
        );
        assert!(body.get("model").is_none());
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_tools_and_choice() {
        let request = LlmRequest::builder()
            .user("q")
            .tool(ToolDefinition::new("sql_db_schema", "schema", json!({"type": "object"})))
            .tool_choice(ToolChoice::Function("sql_db_schema".to_string()))
            .parallel_tool_calls(false)
            .temperature(0.0)
            .build();

        let body = build_body(Some("gpt-4o"), &request);

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "sql_db_schema");
        assert_eq!(
            body["tool_choice"],
            json!({"type": "function", "function": {"name": "sql_db_schema"}})
        );
        assert_eq!(body["parallel_tool_calls"], false);
        assert_eq!(body["temperature"], 0.0);
    }

    #[test]
    fn test_tool_choice_without_tools_is_omitted() {
        let request = LlmRequest::builder()
            .user("q")
            .tool_choice(ToolChoice::Required)
            .parallel_tool_calls(false)
            .build();

        let body = build_body(None, &request);

        assert!(body.get("tool_choice").is_none());
        assert!(body.get("parallel_tool_calls").is_none());
    }

    #[test]
    fn test_parse_tool_call_response() {
        let json = json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "db_query_tool", "arguments": "{\"query\": \"SELECT 1\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 50, "completion_tokens": 12, "total_tokens": 62}
        });

        let response = parse_response("openai", json).unwrap();

        assert_eq!(response.finish_reason, Some(FinishReason::ToolCalls));
        assert_eq!(response.usage, Some(Usage::new(50, 12)));
        let calls = response.message.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_abc");
        assert_eq!(calls[0].argument_str("query"), Some("SELECT 1"));
        assert_eq!(response.content(), None);
    }

    #[test]
    fn test_malformed_arguments_kept_raw() {
        assert_eq!(parse_arguments("{\"query\": "), json!("{\"query\": "));
        assert_eq!(parse_arguments(""), json!({}));
        assert_eq!(encode_arguments(&json!("{\"query\": ")), "{\"query\": ");
    }

    #[test]
    fn test_parse_without_choices_fails() {
        let err = parse_response("azure_openai", json!({"id": "x", "model": "m", "choices": []}))
            .unwrap_err();
        assert!(err.to_string().contains("No choices"));
    }
}
