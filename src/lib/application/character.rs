//! A configured persona bound to its models and tool servers.

use super::agent::{AgentError, AgentLoop, AgentOptions, AgentOutcome, IssueCommentReporter, build_history};
use super::tooling::{ConnectionError, ToolHub, TransportFactory};
use crate::config::{CharacterConfig, ProviderSettings, RunContext};
use crate::constants::COMMENT_PREFIX;
use crate::domain::Issue;
use crate::model::{ModelError, ModelSet, create_model_set};
use crate::platform::Platform;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Lifecycle per issue: [`initialize`](Self::initialize),
/// [`do_task`](Self::do_task), [`finalize`](Self::finalize).
pub struct Character {
    config: CharacterConfig,
    models: ModelSet,
    hub: ToolHub,
    context: RunContext,
    platform: Arc<dyn Platform>,
}

impl Character {
    pub fn new(
        config: CharacterConfig,
        models: ModelSet,
        context: RunContext,
        platform: Arc<dyn Platform>,
    ) -> Self {
        let hub = ToolHub::new(config.mcp.servers.clone());
        Self {
            config,
            models,
            hub,
            context,
            platform,
        }
    }

    /// Build the character's models from the provider settings.
    pub fn from_config(
        config: CharacterConfig,
        providers: &ProviderSettings,
        context: RunContext,
        platform: Arc<dyn Platform>,
    ) -> Result<Self, ModelError> {
        let models = create_model_set(&config.llm, providers)?;
        Ok(Self::new(config, models, context, platform))
    }

    pub fn with_transport_factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.hub = self.hub.with_factory(factory);
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn matches(&self, issue: &Issue) -> bool {
        self.config
            .matches_labels(issue.labels.iter().map(|label| label.name.as_str()))
    }

    fn options(&self) -> AgentOptions {
        AgentOptions::from_llm(&self.config.llm)
    }

    /// Connect every configured tool server.
    pub async fn initialize(&mut self) -> Result<(), ConnectionError> {
        let retry = self.options().retry;
        self.hub.connect_all(&self.models, retry).await
    }

    /// Answer the issue. `None` when the character already used up its
    /// comment allowance on this issue.
    pub async fn do_task(&self, issue: &Issue) -> Result<Option<AgentOutcome>, AgentError> {
        let limit = self.config.permissions.max_responses_per_issue;
        let posted = count_agent_comments(issue);
        if limit > 0 && posted >= limit as usize {
            info!(
                character = %self.config.name,
                issue = issue.id,
                posted,
                limit,
                "Response limit reached, skipping issue"
            );
            return Ok(None);
        }

        let history = build_history(&self.context, &self.config.system_prompt, issue, Utc::now());
        let reporter = IssueCommentReporter::new(self.platform.clone(), issue.reference());
        let agent = AgentLoop::new(&self.models.default, &self.hub, &reporter, self.options());
        let outcome = agent.run(history).await?;
        info!(
            character = %self.config.name,
            issue = issue.id,
            steps = outcome.steps.len(),
            status = ?outcome.status,
            "Task finished"
        );
        Ok(Some(outcome))
    }

    /// Disconnect the tool servers. Never fails.
    pub async fn finalize(&mut self) {
        let failures = self.hub.disconnect_all().await;
        if !failures.is_empty() {
            warn!(
                character = %self.config.name,
                failures = failures.len(),
                "Some tool servers did not close cleanly"
            );
        }
    }
}

/// Comments on the issue written by the agent.
pub fn count_agent_comments(issue: &Issue) -> usize {
    issue
        .comments
        .iter()
        .filter(|comment| comment.content.starts_with(COMMENT_PREFIX))
        .count()
}
