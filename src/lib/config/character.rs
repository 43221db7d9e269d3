//! # Character Configuration
//!
//! A character is one persona of the agent: a name, the issue labels it
//! reacts to, its behavioural system prompt, the language model it talks to
//! and the tool servers it may use.
//!
//! Characters are written as partial YAML documents and completed by merging
//! over the global configuration, which in turn is merged over
//! [`default_config`].
//!
//! ```yaml
//! name: fixer
//! labels: [bug]
//! systemPrompt: You fix bugs.
//! llm:
//!   provider: anthropic
//!   model: claude-3-5-sonnet-latest
//!   maxSteps: 8
//!   __unstable_model_preferences:
//!     bestCost: { provider: google, model: gemini-2.0-flash-lite }
//! mcp:
//!   servers:
//!     - type: stdio
//!       command: npx
//!       args: [-y, some-mcp-server]
//!       tools: { search: true }
//! ```

use super::error::ConfigError;
use super::merge::merge;
use super::server::{RawServer, ServerDescriptor};
use serde::Deserialize;
use serde_json::{Value, json};

/// Built-in defaults every global and character config is merged onto.
pub fn default_config() -> Value {
    json!({
        "name": "",
        "labels": [],
        "systemPrompt": "",
        "llm": {
            "provider": "google",
            "model": "gemini-2.0-flash",
            "maxTokens": 4096,
            "maxRetries": 2,
            "maxSteps": 10
        },
        "mcp": { "servers": [] },
        "permissions": { "maxResponsesPerIssue": 0 }
    })
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CharacterConfig {
    pub name: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub system_prompt: String,
    pub llm: LlmConfig,
    #[serde(default)]
    pub mcp: McpConfig,
    #[serde(default)]
    pub permissions: Permissions,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(
        rename = "__unstable_model_preferences",
        alias = "modelPreferences",
        default
    )]
    pub model_preferences: ModelPreferenceConfig,
}

fn default_max_steps() -> u32 {
    1
}

/// Optional per-priority model overrides used to answer sampling requests.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ModelPreferenceConfig {
    #[serde(default)]
    pub best_intelligence: Option<ModelRef>,
    #[serde(default)]
    pub best_cost: Option<ModelRef>,
    #[serde(default)]
    pub best_speed: Option<ModelRef>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ModelRef {
    pub provider: String,
    pub model: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RawMcpConfig")]
pub struct McpConfig {
    pub servers: Vec<ServerDescriptor>,
}

#[derive(Debug, Deserialize)]
struct RawMcpConfig {
    #[serde(default)]
    servers: Vec<RawServer>,
}

impl From<RawMcpConfig> for McpConfig {
    fn from(raw: RawMcpConfig) -> Self {
        Self {
            servers: raw
                .servers
                .into_iter()
                .enumerate()
                .map(|(index, server)| ServerDescriptor::from_raw(server, index))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    /// Maximum agent comments on one issue; `0` disables the limit.
    #[serde(default)]
    pub max_responses_per_issue: u32,
}

impl CharacterConfig {
    /// Complete a partial character document with the global configuration.
    ///
    /// `global` is expected to already contain [`default_config`].
    pub fn resolve(global: &Value, character: &Value) -> Result<Self, ConfigError> {
        let merged = merge(global, character);
        Self::from_value(merged)
    }

    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        let config: CharacterConfig =
            serde_json::from_value(value).map_err(|source| ConfigError::Invalid { source })?;
        if config.name.trim().is_empty() {
            return Err(ConfigError::MissingName);
        }
        Ok(config)
    }

    /// True when at least one of the character's labels is on the issue.
    pub fn matches_labels<'a, I>(&self, issue_labels: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let issue_labels: Vec<&str> = issue_labels.into_iter().collect();
        self.labels
            .iter()
            .any(|label| issue_labels.contains(&label.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_partial_character_over_defaults() {
        let character = json!({
            "name": "fixer",
            "labels": ["bug"],
            "llm": {"provider": "openai", "model": "gpt-4o"},
            "mcp": {"servers": [{"type": "stdio", "command": "srv", "tools": ["search"]}]}
        });

        let config = CharacterConfig::resolve(&default_config(), &character).expect("config");

        assert_eq!(config.name, "fixer");
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.max_steps, 10);
        assert_eq!(config.llm.max_retries, 2);
        assert_eq!(config.llm.max_tokens, Some(4096));
        assert_eq!(config.llm.temperature, None);
        assert_eq!(config.mcp.servers.len(), 1);
        assert!(config.mcp.servers[0].allows("search"));
        assert!(!config.mcp.servers[0].allows("delete"));
        assert_eq!(config.permissions.max_responses_per_issue, 0);
    }

    #[test]
    fn rejects_character_without_name() {
        let result = CharacterConfig::resolve(&default_config(), &json!({"labels": ["x"]}));
        assert!(matches!(result, Err(ConfigError::MissingName)));
    }

    #[test]
    fn reads_unstable_model_preferences() {
        let character = json!({
            "name": "n",
            "llm": {"__unstable_model_preferences": {
                "bestCost": {"provider": "google", "model": "lite"}
            }}
        });
        let config = CharacterConfig::resolve(&default_config(), &character).expect("config");
        let cost = config.llm.model_preferences.best_cost.expect("cost override");
        assert_eq!(cost.model, "lite");
        assert!(config.llm.model_preferences.best_speed.is_none());
    }

    #[test]
    fn label_matching_needs_one_common_label() {
        let config = CharacterConfig::resolve(
            &default_config(),
            &json!({"name": "n", "labels": ["bug-fix", "bug"]}),
        )
        .expect("config");
        assert!(config.matches_labels(["bug"]));
        assert!(!config.matches_labels(["feature", "docs"]));
        assert!(!config.matches_labels(Vec::<&str>::new()));
    }
}
