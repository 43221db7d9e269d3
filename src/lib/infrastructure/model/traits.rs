//! Model traits

use super::types::{ModelError, ModelRequest, ModelResponse};
use async_trait::async_trait;

/// One configured language model behind some provider API.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Provider name, e.g. `openai`
    fn provider(&self) -> &str;

    /// Model identifier as sent to the provider
    fn model_id(&self) -> &str;

    /// Run one generation
    async fn generate(&self, request: ModelRequest) -> Result<ModelResponse, ModelError>;
}
