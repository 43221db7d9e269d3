//! Process environment captured once at startup.
//!
//! Everything deeper in the application receives these values through
//! constructors; nothing below this module reads environment variables.

use super::error::ConfigError;
use super::loader::substitution_context;
use crate::constants::{
    DEFAULT_ANTHROPIC_BASE_URL, DEFAULT_GITHUB_API_URL, DEFAULT_GITLAB_HOST,
    DEFAULT_GOOGLE_BASE_URL, DEFAULT_OPENAI_BASE_URL,
};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformKind {
    Github,
    Gitlab,
}

impl PlatformKind {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "github" => Ok(PlatformKind::Github),
            "gitlab" => Ok(PlatformKind::Gitlab),
            other => Err(ConfigError::UnsupportedPlatform(other.to_string())),
        }
    }
}

/// Where the agent runs: checked-out workspace and repository coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub workspace: PathBuf,
    pub repo: String,
    pub owner: String,
    pub branch: String,
}

/// Endpoints and credentials of the language-model providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub openai_base_url: String,
    pub openai_api_key: Option<String>,
    pub anthropic_base_url: String,
    pub anthropic_api_key: Option<String>,
    pub google_base_url: String,
    pub google_api_key: Option<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            openai_api_key: None,
            anthropic_base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
            anthropic_api_key: None,
            google_base_url: DEFAULT_GOOGLE_BASE_URL.to_string(),
            google_api_key: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Environment {
    pub platform: PlatformKind,
    pub context: RunContext,
    pub providers: ProviderSettings,
    pub github_token: Option<String>,
    pub github_api_url: String,
    pub gitlab_token: Option<String>,
    pub gitlab_host: String,
    pub event_name: Option<String>,
    pub event_path: Option<PathBuf>,
    /// `env_`-prefixed variables for config substitution.
    pub substitutions: HashMap<String, String>,
}

impl Environment {
    /// Load `.env` (if present) and capture the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::from_filename(crate::constants::ENV_PATH);
        Self::from_vars(std::env::vars().collect())
    }

    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| vars.get(key).filter(|value| !value.is_empty()).cloned();

        let platform = PlatformKind::parse(&get("PLATFORM_TYPE").unwrap_or_else(|| "github".into()))?;
        let context = match platform {
            PlatformKind::Github => {
                let (owner, repo) = get("GITHUB_REPOSITORY")
                    .and_then(|full| {
                        full.split_once('/')
                            .map(|(owner, repo)| (owner.to_string(), repo.to_string()))
                    })
                    .unwrap_or_default();
                RunContext {
                    workspace: get("GITHUB_WORKSPACE").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".")),
                    repo,
                    owner,
                    branch: get("BRANCH").unwrap_or_default(),
                }
            }
            PlatformKind::Gitlab => {
                let (owner, repo) = match (get("CI_PROJECT_NAMESPACE"), get("CI_PROJECT_ID")) {
                    (Some(owner), Some(repo)) => (owner, repo),
                    _ => (String::new(), String::new()),
                };
                RunContext {
                    workspace: get("CI_PROJECT_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".")),
                    repo,
                    owner,
                    branch: get("CI_COMMIT_REF_NAME").unwrap_or_default(),
                }
            }
        };

        let defaults = ProviderSettings::default();
        let providers = ProviderSettings {
            openai_base_url: get("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            openai_api_key: get("OPENAI_API_KEY"),
            anthropic_base_url: get("ANTHROPIC_BASE_URL").unwrap_or(defaults.anthropic_base_url),
            anthropic_api_key: get("ANTHROPIC_API_KEY"),
            google_base_url: get("GOOGLE_BASE_URL").unwrap_or(defaults.google_base_url),
            google_api_key: get("GOOGLE_GENERATIVE_AI_API_KEY"),
        };

        let event_path = match platform {
            PlatformKind::Github => get("GITHUB_EVENT_PATH"),
            PlatformKind::Gitlab => get("CI_EVENT_PATH"),
        }
        .map(PathBuf::from);

        Ok(Self {
            platform,
            context,
            providers,
            github_token: get("GITHUB_TOKEN"),
            github_api_url: get("GITHUB_API_URL").unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string()),
            gitlab_token: get("GITLAB_TOKEN"),
            gitlab_host: get("GITLAB_HOST").unwrap_or_else(|| DEFAULT_GITLAB_HOST.to_string()),
            event_name: get("GITHUB_EVENT_NAME"),
            event_path,
            substitutions: substitution_context(vars.clone()),
        })
    }

    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.context.workspace = workspace.into();
        self
    }

    pub fn with_event_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.event_path = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn github_context_splits_repository() {
        let env = Environment::from_vars(vars(&[
            ("GITHUB_REPOSITORY", "acme/rocket"),
            ("GITHUB_WORKSPACE", "/work"),
            ("BRANCH", "main"),
            ("OPENAI_BASE_URL", "http://proxy/v1"),
        ]))
        .expect("environment");

        assert_eq!(env.platform, PlatformKind::Github);
        assert_eq!(env.context.owner, "acme");
        assert_eq!(env.context.repo, "rocket");
        assert_eq!(env.context.workspace, PathBuf::from("/work"));
        assert_eq!(env.context.branch, "main");
        assert_eq!(env.providers.openai_base_url, "http://proxy/v1");
        assert_eq!(env.providers.google_base_url, DEFAULT_GOOGLE_BASE_URL);
        assert_eq!(env.substitutions.get("env_BRANCH").map(String::as_str), Some("main"));
    }

    #[test]
    fn gitlab_context_uses_project_id_as_repo() {
        let env = Environment::from_vars(vars(&[
            ("PLATFORM_TYPE", "gitlab"),
            ("CI_PROJECT_NAMESPACE", "group"),
            ("CI_PROJECT_ID", "42"),
            ("CI_EVENT_PATH", "/tmp/event.json"),
        ]))
        .expect("environment");

        assert_eq!(env.platform, PlatformKind::Gitlab);
        assert_eq!(env.context.owner, "group");
        assert_eq!(env.context.repo, "42");
        assert_eq!(env.event_path, Some(PathBuf::from("/tmp/event.json")));
        assert_eq!(env.gitlab_host, DEFAULT_GITLAB_HOST);
    }

    #[test]
    fn rejects_unknown_platform() {
        let result = Environment::from_vars(vars(&[("PLATFORM_TYPE", "bitbucket")]));
        assert!(matches!(result, Err(ConfigError::UnsupportedPlatform(_))));
    }
}
