//! Answers `sampling/createMessage` requests from tool servers.

use super::connection::RequestHandler;
use crate::infrastructure::rpc::RpcError;
use crate::model::{ModelHandle, ModelRequest, ModelRole, ModelSet, RetryPolicy, generate_text};
use crate::types::{ChatMessage, MessageRole};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

/// Relative priorities a server attaches to a sampling request; each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct ModelPreferences {
    #[serde(rename = "intelligencePriority", default)]
    pub intelligence: f64,
    #[serde(rename = "costPriority", default)]
    pub cost: f64,
    #[serde(rename = "speedPriority", default)]
    pub speed: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageParams {
    pub messages: Vec<SamplingMessage>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub model_preferences: Option<ModelPreferences>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplingMessage {
    pub role: String,
    pub content: SamplingContent,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SamplingContent {
    Text { text: String },
    #[serde(other)]
    Unsupported,
}

/// Pick the model for a sampling request.
///
/// The highest of intelligence, cost and speed wins, ties going to the
/// earlier one. Its override is used when configured, the default model
/// otherwise. Priorities that are not numbers select the default.
pub fn resolve_model<'a>(preferences: &ModelPreferences, models: &'a ModelSet) -> &'a ModelHandle {
    let priorities = [
        (preferences.intelligence, ModelRole::BestIntelligence),
        (preferences.cost, ModelRole::BestCost),
        (preferences.speed, ModelRole::BestSpeed),
    ];
    if priorities.iter().any(|(value, _)| value.is_nan()) {
        return &models.default;
    }
    let mut best = priorities[0];
    for candidate in &priorities[1..] {
        if candidate.0 > best.0 {
            best = *candidate;
        }
    }
    models.for_role(best.1)
}

impl CreateMessageParams {
    /// The conversation handed to the model: the optional system prompt
    /// followed by the request's messages.
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        if let Some(system) = self.system_prompt.as_deref().filter(|s| !s.is_empty()) {
            messages.push(ChatMessage::system(system));
        }
        for message in &self.messages {
            let role = match MessageRole::parse(&message.role) {
                Some(MessageRole::Assistant) => MessageRole::Assistant,
                _ => MessageRole::User,
            };
            let text = match &message.content {
                SamplingContent::Text { text } => text.clone(),
                SamplingContent::Unsupported => {
                    warn!(role = message.role.as_str(), "Non-text sampling content replaced by empty text");
                    String::new()
                }
            };
            messages.push(ChatMessage::new(role, text));
        }
        messages
    }
}

/// Handler installed on every connection of a character's hub.
pub struct SamplingHandler {
    server: String,
    models: ModelSet,
    policy: RetryPolicy,
}

impl SamplingHandler {
    pub fn new(server: impl Into<String>, models: ModelSet, policy: RetryPolicy) -> Self {
        Self {
            server: server.into(),
            models,
            policy,
        }
    }

    pub async fn create_message(&self, params: CreateMessageParams) -> Result<Value, RpcError> {
        let preferences = params.model_preferences.unwrap_or_default();
        let model = resolve_model(&preferences, &self.models);
        let messages = params.to_messages();
        info!(
            server = %self.server,
            model = model.model_id(),
            role = ?model.role(),
            messages = messages.len(),
            "Sampling request"
        );

        let request = ModelRequest::new(messages)
            .with_max_tokens(params.max_tokens)
            .with_temperature(params.temperature);
        let response = generate_text(model, request, self.policy)
            .await
            .map_err(|err| {
                warn!(server = %self.server, %err, "Sampling generation failed");
                RpcError::internal(err.to_string())
            })?;
        info!(server = %self.server, chars = response.text.len(), "Sampling result");

        Ok(json!({
            "content": {"type": "text", "text": response.text},
            "model": model.model_id(),
            "role": "assistant",
        }))
    }
}

#[async_trait]
impl RequestHandler for SamplingHandler {
    async fn handle(&self, params: Value) -> Result<Value, RpcError> {
        let params: CreateMessageParams = serde_json::from_value(params)
            .map_err(|err| RpcError::invalid_params(format!("invalid createMessage params: {err}")))?;
        self.create_message(params).await
    }
}
