//! Configured models a character can talk to.

use super::traits::ModelClient;
use super::types::{ModelError, ModelRequest, ModelResponse};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRole {
    Default,
    BestIntelligence,
    BestCost,
    BestSpeed,
}

/// A model client tagged with the role it was configured for.
#[derive(Clone)]
pub struct ModelHandle {
    role: ModelRole,
    client: Arc<dyn ModelClient>,
}

impl ModelHandle {
    pub fn new(role: ModelRole, client: Arc<dyn ModelClient>) -> Self {
        Self { role, client }
    }

    pub fn role(&self) -> ModelRole {
        self.role
    }

    pub fn provider(&self) -> &str {
        self.client.provider()
    }

    pub fn model_id(&self) -> &str {
        self.client.model_id()
    }

    pub async fn generate(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        self.client.generate(request).await
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("role", &self.role)
            .field("provider", &self.provider())
            .field("model", &self.model_id())
            .finish()
    }
}

/// The default model plus optional per-priority overrides.
#[derive(Debug, Clone)]
pub struct ModelSet {
    pub default: ModelHandle,
    pub best_intelligence: Option<ModelHandle>,
    pub best_cost: Option<ModelHandle>,
    pub best_speed: Option<ModelHandle>,
}

impl ModelSet {
    pub fn single(default: ModelHandle) -> Self {
        Self {
            default,
            best_intelligence: None,
            best_cost: None,
            best_speed: None,
        }
    }

    /// The override configured for `role`, or the default model.
    pub fn for_role(&self, role: ModelRole) -> &ModelHandle {
        let chosen = match role {
            ModelRole::Default => None,
            ModelRole::BestIntelligence => self.best_intelligence.as_ref(),
            ModelRole::BestCost => self.best_cost.as_ref(),
            ModelRole::BestSpeed => self.best_speed.as_ref(),
        };
        chosen.unwrap_or(&self.default)
    }
}
