//! Message adapters - convert between different API formats

use crate::types::{ChatMessage, MessageRole, ToolSpec};
use serde_json::{Map, Value, json};

/// Adapter for converting messages and tool declarations to provider formats
pub struct MessageAdapter;

impl MessageAdapter {
    /// Convert messages to OpenAI chat-completions format.
    ///
    /// Tool call arguments travel as a JSON-encoded string.
    pub fn to_openai_format(messages: &[ChatMessage]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| match msg.role {
                MessageRole::Assistant if !msg.tool_calls.is_empty() => {
                    let calls: Vec<Value> = msg
                        .tool_calls
                        .iter()
                        .map(|call| {
                            json!({
                                "id": call.id,
                                "type": "function",
                                "function": {
                                    "name": call.name,
                                    "arguments": call.arguments.to_string(),
                                }
                            })
                        })
                        .collect();
                    let content = if msg.content.is_empty() {
                        Value::Null
                    } else {
                        Value::String(msg.content.clone())
                    };
                    json!({"role": "assistant", "content": content, "tool_calls": calls})
                }
                MessageRole::Tool => json!({
                    "role": "tool",
                    "tool_call_id": msg.tool_call_id.clone().unwrap_or_default(),
                    "content": msg.content,
                }),
                role => json!({"role": role.as_str(), "content": msg.content}),
            })
            .collect()
    }

    pub fn openai_tools(tools: &[ToolSpec]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description.clone().unwrap_or_default(),
                        "parameters": tool.input_schema,
                    }
                })
            })
            .collect()
    }

    /// Convert messages to Anthropic messages format
    /// Returns: (system, messages)
    ///
    /// Consecutive tool results are folded into a single user turn.
    pub fn to_anthropic_format(messages: &[ChatMessage]) -> (Option<String>, Vec<Value>) {
        let mut system_parts = Vec::new();
        let mut converted: Vec<Value> = Vec::new();
        let mut pending_results: Vec<Value> = Vec::new();

        for message in messages {
            if message.role != MessageRole::Tool && !pending_results.is_empty() {
                converted.push(json!({
                    "role": "user",
                    "content": std::mem::take(&mut pending_results),
                }));
            }
            match message.role {
                MessageRole::System => system_parts.push(message.content.clone()),
                MessageRole::User => converted.push(json!({
                    "role": "user",
                    "content": message.content,
                })),
                MessageRole::Assistant => {
                    let mut blocks = Vec::new();
                    if !message.content.is_empty() {
                        blocks.push(json!({"type": "text", "text": message.content}));
                    }
                    for call in &message.tool_calls {
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": call.id,
                            "name": call.name,
                            "input": call.arguments,
                        }));
                    }
                    converted.push(json!({"role": "assistant", "content": blocks}));
                }
                MessageRole::Tool => pending_results.push(json!({
                    "type": "tool_result",
                    "tool_use_id": message.tool_call_id.clone().unwrap_or_default(),
                    "content": message.content,
                })),
            }
        }
        if !pending_results.is_empty() {
            converted.push(json!({"role": "user", "content": pending_results}));
        }

        (join_system(system_parts), converted)
    }

    pub fn anthropic_tools(tools: &[ToolSpec]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description.clone().unwrap_or_default(),
                    "input_schema": tool.input_schema,
                })
            })
            .collect()
    }

    /// Convert messages to Gemini format
    /// Returns: (system_instruction_text, contents)
    pub fn to_gemini_format(messages: &[ChatMessage]) -> (Option<String>, Vec<Value>) {
        let mut system_parts = Vec::new();
        let mut contents: Vec<Value> = Vec::new();
        let mut pending_responses: Vec<Value> = Vec::new();

        for message in messages {
            if message.role != MessageRole::Tool && !pending_responses.is_empty() {
                contents.push(json!({
                    "role": "user",
                    "parts": std::mem::take(&mut pending_responses),
                }));
            }
            match message.role {
                MessageRole::System => system_parts.push(message.content.clone()),
                MessageRole::User => contents.push(json!({
                    "role": "user",
                    "parts": [{"text": message.content}]
                })),
                MessageRole::Assistant => {
                    let mut parts = Vec::new();
                    if !message.content.is_empty() {
                        parts.push(json!({"text": message.content}));
                    }
                    for call in &message.tool_calls {
                        parts.push(json!({
                            "functionCall": {"name": call.name, "args": call.arguments}
                        }));
                    }
                    contents.push(json!({"role": "model", "parts": parts}));
                }
                MessageRole::Tool => {
                    let name = message.name.clone().unwrap_or_default();
                    let content = serde_json::from_str::<Value>(&message.content)
                        .unwrap_or_else(|_| Value::String(message.content.clone()));
                    pending_responses.push(json!({
                        "functionResponse": {
                            "name": name,
                            "response": {"name": name, "content": content},
                        }
                    }));
                }
            }
        }
        if !pending_responses.is_empty() {
            contents.push(json!({"role": "user", "parts": pending_responses}));
        }

        (join_system(system_parts), contents)
    }

    /// Gemini function declarations. Schemas lose the keywords the API
    /// rejects; parameter-less tools omit `parameters`.
    pub fn gemini_tools(tools: &[ToolSpec]) -> Vec<Value> {
        if tools.is_empty() {
            return Vec::new();
        }
        let declarations: Vec<Value> = tools
            .iter()
            .map(|tool| {
                let mut declaration = Map::new();
                declaration.insert("name".into(), json!(tool.name));
                declaration.insert(
                    "description".into(),
                    json!(tool.description.clone().unwrap_or_default()),
                );
                let schema = sanitize_gemini_schema(&tool.input_schema);
                let has_properties = schema
                    .get("properties")
                    .and_then(Value::as_object)
                    .is_some_and(|props| !props.is_empty());
                if has_properties {
                    declaration.insert("parameters".into(), schema);
                }
                Value::Object(declaration)
            })
            .collect();
        vec![json!({"functionDeclarations": declarations})]
    }
}

fn join_system(parts: Vec<String>) -> Option<String> {
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

fn sanitize_gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| key.as_str() != "$schema" && key.as_str() != "additionalProperties")
                .map(|(key, value)| (key.clone(), sanitize_gemini_schema(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_gemini_schema).collect()),
        other => other.clone(),
    }
}
