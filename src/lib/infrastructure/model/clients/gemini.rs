//! Gemini client implementation

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info};
use uuid::Uuid;

use super::base::HttpClientBase;
use crate::infrastructure::model::adapter::MessageAdapter;
use crate::infrastructure::model::traits::ModelClient;
use crate::infrastructure::model::types::{ModelError, ModelRequest, ModelResponse};
use crate::types::ToolCall;

/// Gemini client for Google AI
#[derive(Clone)]
pub struct GeminiClient {
    base: HttpClientBase,
}

impl GeminiClient {
    pub fn new(model: &str, endpoint: &str, api_key: Option<String>) -> Self {
        Self {
            base: HttpClientBase::new("google", model, endpoint, api_key),
        }
    }

    fn build_model_url(&self) -> String {
        self.base
            .build_url(&format!("models/{}:generateContent", self.base.model))
    }

    fn payload(&self, request: &ModelRequest) -> Value {
        let (system_text, contents) = MessageAdapter::to_gemini_format(&request.messages);

        let mut payload = json!({ "contents": contents });

        if let Some(system) = system_text {
            payload["systemInstruction"] = json!({
                "parts": [{"text": system}]
            });
        }

        let tools = MessageAdapter::gemini_tools(&request.tools);
        if !tools.is_empty() {
            payload["tools"] = Value::Array(tools);
        }

        let mut generation = Map::new();
        if let Some(max_tokens) = request.max_tokens {
            generation.insert("maxOutputTokens".into(), json!(max_tokens));
        }
        if let Some(temperature) = request.temperature {
            generation.insert("temperature".into(), json!(temperature));
        }
        if !generation.is_empty() {
            payload["generationConfig"] = Value::Object(generation);
        }
        payload
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    fn provider(&self) -> &str {
        &self.base.provider
    }

    fn model_id(&self) -> &str {
        &self.base.model
    }

    async fn generate(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        let url = self.build_model_url();
        let payload = self.payload(&request);

        info!(
            provider = self.base.provider.as_str(),
            model = self.base.model.as_str(),
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending request to Gemini"
        );

        let response: GeminiResponse = self.base.post_with_query_key(&url, &payload).await?;
        debug!("Received response from Gemini");
        parse_response(&self.base.provider, response)
    }
}

/// Gemini function calls carry no id; one is minted per call.
fn parse_response(provider: &str, response: GeminiResponse) -> Result<ModelResponse, ModelError> {
    let content = response
        .candidates
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .ok_or_else(|| ModelError::invalid_response(provider, "missing candidate content"))?;

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for part in content.parts {
        if let Some(chunk) = part.text {
            text.push_str(&chunk);
        }
        if let Some(call) = part.function_call {
            tool_calls.push(ToolCall {
                id: format!("call_{}", Uuid::new_v4().simple()),
                name: call.name,
                arguments: call.args.unwrap_or_else(|| json!({})),
            });
        }
    }
    Ok(ModelResponse { text, tool_calls })
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    text: Option<String>,
    function_call: Option<GeminiFunctionCall>,
}

#[derive(Deserialize)]
struct GeminiFunctionCall {
    name: String,
    args: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;

    #[test]
    fn mints_distinct_ids_for_function_calls() {
        let raw = json!({
            "candidates": [{"content": {"role": "model", "parts": [
                {"functionCall": {"name": "a", "args": {"x": 1}}},
                {"functionCall": {"name": "b"}}
            ]}}]
        });
        let response: GeminiResponse = serde_json::from_value(raw).expect("response");
        let parsed = parse_response("google", response).expect("parsed");
        assert_eq!(parsed.tool_calls.len(), 2);
        assert_ne!(parsed.tool_calls[0].id, parsed.tool_calls[1].id);
        assert_eq!(parsed.tool_calls[1].arguments, json!({}));
    }

    #[test]
    fn missing_candidates_is_invalid() {
        let response: GeminiResponse = serde_json::from_value(json!({})).expect("response");
        assert!(parse_response("google", response).is_err());
    }

    #[test]
    fn model_url_and_generation_config() {
        let client = GeminiClient::new("gemini-2.0-flash", "https://g.example/v1beta", None);
        assert_eq!(
            client.build_model_url(),
            "https://g.example/v1beta/models/gemini-2.0-flash:generateContent"
        );
        let request = ModelRequest::new(vec![ChatMessage::system("s"), ChatMessage::user("u")])
            .with_temperature(Some(0.5));
        let payload = client.payload(&request);
        assert_eq!(payload["systemInstruction"]["parts"][0]["text"], "s");
        assert_eq!(payload["generationConfig"]["temperature"], 0.5);
        assert!(payload.get("tools").is_none());
    }
}
