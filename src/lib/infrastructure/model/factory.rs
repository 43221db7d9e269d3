//! Provider factory - creates clients from provider name and settings

use super::clients::{AnthropicClient, GeminiClient, OpenAIClient};
use super::handle::{ModelHandle, ModelRole, ModelSet};
use super::traits::ModelClient;
use super::types::ModelError;
use crate::config::{LlmConfig, ProviderSettings};
use std::sync::Arc;
use tracing::debug;

/// Creates a model client for `provider`.
///
/// Supported providers: `openai`, `anthropic`, `google`. Credentials are
/// checked when the client is first used, not here.
pub fn create_model(
    provider: &str,
    model: &str,
    settings: &ProviderSettings,
) -> Result<Arc<dyn ModelClient>, ModelError> {
    debug!(provider, model, "Creating model client");
    let client: Arc<dyn ModelClient> = match provider.to_ascii_lowercase().as_str() {
        "openai" => Arc::new(OpenAIClient::new(
            model,
            &settings.openai_base_url,
            settings.openai_api_key.clone(),
        )),
        "anthropic" => Arc::new(AnthropicClient::new(
            model,
            &settings.anthropic_base_url,
            settings.anthropic_api_key.clone(),
        )),
        "google" => Arc::new(GeminiClient::new(
            model,
            &settings.google_base_url,
            settings.google_api_key.clone(),
        )),
        _ => return Err(ModelError::unsupported_provider(provider)),
    };
    Ok(client)
}

/// Build the default model and the configured preference overrides.
pub fn create_model_set(llm: &LlmConfig, settings: &ProviderSettings) -> Result<ModelSet, ModelError> {
    let default = ModelHandle::new(
        ModelRole::Default,
        create_model(&llm.provider, &llm.model, settings)?,
    );
    let preferences = &llm.model_preferences;
    let build = |role: ModelRole, reference: Option<&crate::config::ModelRef>| {
        reference
            .map(|r| create_model(&r.provider, &r.model, settings).map(|c| ModelHandle::new(role, c)))
            .transpose()
    };
    Ok(ModelSet {
        default,
        best_intelligence: build(
            ModelRole::BestIntelligence,
            preferences.best_intelligence.as_ref(),
        )?,
        best_cost: build(ModelRole::BestCost, preferences.best_cost.as_ref())?,
        best_speed: build(ModelRole::BestSpeed, preferences.best_speed.as_ref())?,
    })
}
