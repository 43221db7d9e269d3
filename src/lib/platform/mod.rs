//! # Code-hosting platforms
//!
//! The agent reads issues from and posts comments to a code-hosting
//! platform. [`Platform`] is the seam; [`github::GithubPlatform`] and
//! [`gitlab::GitlabPlatform`] are the REST adapters selected by
//! `PLATFORM_TYPE`.

pub mod event;
pub mod github;
pub mod gitlab;
mod http;

pub use event::{TriggerEvent, github_event, gitlab_event, read_trigger_event};
pub use github::GithubPlatform;
pub use gitlab::GitlabPlatform;

use crate::config::{Environment, PlatformKind};
use crate::domain::{Issue, IssueRef};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("{variable} is not set, cannot talk to {platform}")]
    MissingToken {
        platform: &'static str,
        variable: &'static str,
    },

    #[error("invalid API address {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("token contains characters not allowed in a header")]
    InvalidToken,

    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("platform answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected platform response: {reason}")]
    InvalidResponse { reason: String },

    #[error("GITHUB_EVENT_NAME is not set")]
    MissingEventName,

    #[error("failed to read event file {path}: {source}")]
    EventIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed {event} event payload: {source}")]
    EventPayload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Issue access on a code-hosting platform.
#[async_trait]
pub trait Platform: Send + Sync {
    /// The issue with its labels and human comments, oldest first.
    async fn get_issue(&self, issue: &IssueRef) -> Result<Issue, PlatformError>;

    /// Open issues of a repository carrying all of `labels`.
    async fn list_issues(
        &self,
        owner: &str,
        repo: &str,
        labels: &[String],
    ) -> Result<Vec<Issue>, PlatformError>;

    async fn create_issue_comment(&self, issue: &IssueRef, body: &str)
    -> Result<(), PlatformError>;

    /// Longest comment body the platform accepts, in characters.
    fn max_comment_len(&self) -> usize;
}

/// The adapter for the platform the process runs on.
pub fn create_platform(env: &Environment) -> Result<Arc<dyn Platform>, PlatformError> {
    match env.platform {
        PlatformKind::Github => {
            let token = env.github_token.as_deref().ok_or(PlatformError::MissingToken {
                platform: "GitHub",
                variable: "GITHUB_TOKEN",
            })?;
            Ok(Arc::new(GithubPlatform::new(&env.github_api_url, token)?))
        }
        PlatformKind::Gitlab => {
            let token = env.gitlab_token.as_deref().ok_or(PlatformError::MissingToken {
                platform: "GitLab",
                variable: "GITLAB_TOKEN",
            })?;
            Ok(Arc::new(GitlabPlatform::new(&env.gitlab_host, token)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> Environment {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::from_vars(vars).expect("environment")
    }

    #[test]
    fn missing_token_is_reported_per_platform() {
        let github = create_platform(&env(&[]));
        assert!(matches!(
            github,
            Err(PlatformError::MissingToken { variable: "GITHUB_TOKEN", .. })
        ));

        let gitlab = create_platform(&env(&[("PLATFORM_TYPE", "gitlab")]));
        assert!(matches!(
            gitlab,
            Err(PlatformError::MissingToken { variable: "GITLAB_TOKEN", .. })
        ));
    }

    #[test]
    fn builds_adapter_with_limits() {
        let github = create_platform(&env(&[("GITHUB_TOKEN", "t")])).expect("github");
        assert_eq!(github.max_comment_len(), github::MAX_COMMENT_LEN);

        let gitlab = create_platform(&env(&[("PLATFORM_TYPE", "gitlab"), ("GITLAB_TOKEN", "t")]))
            .expect("gitlab");
        assert_eq!(gitlab.max_comment_len(), gitlab::MAX_COMMENT_LEN);
    }
}
