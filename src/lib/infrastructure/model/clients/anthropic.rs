//! Anthropic messages API client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::base::HttpClientBase;
use crate::infrastructure::model::adapter::MessageAdapter;
use crate::infrastructure::model::traits::ModelClient;
use crate::infrastructure::model::types::{ModelError, ModelRequest, ModelResponse};
use crate::types::ToolCall;

const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The messages API requires `max_tokens`.
const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Clone)]
pub struct AnthropicClient {
    base: HttpClientBase,
}

impl AnthropicClient {
    pub fn new(model: &str, endpoint: &str, api_key: Option<String>) -> Self {
        Self {
            base: HttpClientBase::new("anthropic", model, endpoint, api_key),
        }
    }

    fn payload(&self, request: &ModelRequest) -> AnthropicRequest {
        let (system, messages) = MessageAdapter::to_anthropic_format(&request.messages);
        let tools = MessageAdapter::anthropic_tools(&request.tools);
        AnthropicRequest {
            model: self.base.model.clone(),
            system,
            messages,
            tools: (!tools.is_empty()).then_some(tools),
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: request.temperature,
        }
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    fn provider(&self) -> &str {
        &self.base.provider
    }

    fn model_id(&self) -> &str {
        &self.base.model
    }

    async fn generate(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        let api_key = self.base.require_api_key()?;
        let url = self.base.build_url("messages");
        let payload = self.payload(&request);

        info!(
            provider = self.base.provider.as_str(),
            model = self.base.model.as_str(),
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending request to Anthropic"
        );

        let headers = [("x-api-key", api_key), ("anthropic-version", ANTHROPIC_VERSION)];
        let response: AnthropicResponse =
            self.base.post_with_headers(&url, &headers, &payload).await?;
        debug!("Received response from Anthropic");
        Ok(parse_response(response))
    }
}

fn parse_response(response: AnthropicResponse) -> ModelResponse {
    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for block in response.content {
        match block {
            ContentBlock::Text { text: chunk } => text.push_str(&chunk),
            ContentBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                id,
                name,
                arguments: input,
            }),
            ContentBlock::Other => {}
        }
    }
    ModelResponse { text, tool_calls }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}
