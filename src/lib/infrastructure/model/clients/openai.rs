//! OpenAI-compatible client implementation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::base::HttpClientBase;
use crate::infrastructure::model::adapter::MessageAdapter;
use crate::infrastructure::model::traits::ModelClient;
use crate::infrastructure::model::types::{ModelError, ModelRequest, ModelResponse};
use crate::types::ToolCall;

/// OpenAI chat-completions client (also serves OpenAI-compatible gateways
/// through a custom base URL)
#[derive(Clone)]
pub struct OpenAIClient {
    base: HttpClientBase,
}

impl OpenAIClient {
    pub fn new(model: &str, endpoint: &str, api_key: Option<String>) -> Self {
        Self {
            base: HttpClientBase::new("openai", model, endpoint, api_key),
        }
    }

    fn payload(&self, request: &ModelRequest) -> OpenAIRequest {
        let tools = MessageAdapter::openai_tools(&request.tools);
        OpenAIRequest {
            model: self.base.model.clone(),
            messages: MessageAdapter::to_openai_format(&request.messages),
            tools: (!tools.is_empty()).then_some(tools),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

#[async_trait]
impl ModelClient for OpenAIClient {
    fn provider(&self) -> &str {
        &self.base.provider
    }

    fn model_id(&self) -> &str {
        &self.base.model
    }

    async fn generate(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        let url = self.base.build_url("chat/completions");
        let payload = self.payload(&request);

        info!(
            provider = self.base.provider.as_str(),
            model = self.base.model.as_str(),
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending request to OpenAI-compatible provider"
        );

        let response: OpenAIResponse = self.base.post_with_bearer(&url, &payload).await?;
        debug!("Received response from OpenAI-compatible provider");
        parse_response(&self.base.provider, response)
    }
}

fn parse_response(provider: &str, response: OpenAIResponse) -> Result<ModelResponse, ModelError> {
    let message = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .ok_or_else(|| ModelError::invalid_response(provider, "missing message"))?;

    let tool_calls = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| {
            let arguments = if call.function.arguments.trim().is_empty() {
                Value::Object(Default::default())
            } else {
                serde_json::from_str(&call.function.arguments).unwrap_or_else(|err| {
                    warn!(tool = call.function.name.as_str(), %err, "Tool arguments are not valid JSON");
                    Value::String(call.function.arguments.clone())
                })
            };
            ToolCall {
                id: call.id,
                name: call.function.name,
                arguments,
            }
        })
        .collect();

    Ok(ModelResponse {
        text: message.content.unwrap_or_default(),
        tool_calls,
    })
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: Option<OpenAIMessage>,
}

#[derive(Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIToolCall>>,
}

#[derive(Deserialize)]
struct OpenAIToolCall {
    id: String,
    function: OpenAIFunction,
}

#[derive(Deserialize)]
struct OpenAIFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}
