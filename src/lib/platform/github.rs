//! GitHub REST adapter.

use super::http::RestClient;
use super::{Platform, PlatformError};
use crate::domain::{Issue, IssueComment, IssueRef, Label};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

pub const MAX_COMMENT_LEN: usize = 65_536;

const ACCEPT_GITHUB: &str = "application/vnd.github+json";

pub struct GithubPlatform {
    rest: RestClient,
}

impl GithubPlatform {
    pub fn new(api_url: &str, token: &str) -> Result<Self, PlatformError> {
        let rest = RestClient::new(api_url, ACCEPT_GITHUB, (AUTHORIZATION, format!("Bearer {token}")))?;
        Ok(Self { rest })
    }

    async fn comments(&self, owner: &str, repo: &str, number: u64) -> Result<Vec<RawComment>, PlatformError> {
        let number = number.to_string();
        self.rest
            .get_all(&["repos", owner, repo, "issues", &number, "comments"], &[])
            .await
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawIssue {
    number: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    state: String,
    #[serde(default)]
    labels: Vec<RawLabel>,
    /// Present when the "issue" is a pull request.
    #[serde(default)]
    pull_request: Option<Value>,
}

/// Labels arrive either as bare names or as label objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawLabel {
    Name(String),
    Object {
        #[serde(default)]
        name: Option<String>,
    },
}

impl RawLabel {
    pub(crate) fn into_label(self) -> Label {
        match self {
            RawLabel::Name(name) => Label { name },
            RawLabel::Object { name } => Label {
                name: name.unwrap_or_default(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawComment {
    #[serde(default)]
    user: Option<RawUser>,
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    login: String,
}

pub(crate) fn normalize_issue(owner: &str, repo: &str, raw: RawIssue, comments: Vec<RawComment>) -> Issue {
    Issue {
        owner: owner.to_string(),
        repo: repo.to_string(),
        id: raw.number,
        title: raw.title,
        content: raw.body.unwrap_or_default(),
        state: raw.state,
        labels: raw.labels.into_iter().map(RawLabel::into_label).collect(),
        comments: comments
            .into_iter()
            .map(|comment| IssueComment {
                author: comment.user.map(|u| u.login).unwrap_or_else(|| "-".into()),
                content: comment.body.unwrap_or_default(),
            })
            .collect(),
    }
}

#[async_trait]
impl Platform for GithubPlatform {
    async fn get_issue(&self, issue: &IssueRef) -> Result<Issue, PlatformError> {
        let number = issue.id.to_string();
        let raw: RawIssue = self
            .rest
            .get(&["repos", &issue.owner, &issue.repo, "issues", &number], &[])
            .await?;
        let comments = self.comments(&issue.owner, &issue.repo, issue.id).await?;
        debug!(issue = issue.id, comments = comments.len(), "Fetched GitHub issue");
        Ok(normalize_issue(&issue.owner, &issue.repo, raw, comments))
    }

    async fn list_issues(
        &self,
        owner: &str,
        repo: &str,
        labels: &[String],
    ) -> Result<Vec<Issue>, PlatformError> {
        let query = [("state", "open".to_string()), ("labels", labels.join(","))];
        let raw: Vec<RawIssue> = self.rest.get_all(&["repos", owner, repo, "issues"], &query).await?;

        let mut issues = Vec::new();
        for item in raw.into_iter().filter(|item| item.pull_request.is_none()) {
            let comments = self.comments(owner, repo, item.number).await?;
            issues.push(normalize_issue(owner, repo, item, comments));
        }
        debug!(owner, repo, count = issues.len(), "Listed GitHub issues");
        Ok(issues)
    }

    async fn create_issue_comment(&self, issue: &IssueRef, body: &str) -> Result<(), PlatformError> {
        let number = issue.id.to_string();
        self.rest
            .post(
                &["repos", &issue.owner, &issue.repo, "issues", &number, "comments"],
                &json!({ "body": body }),
            )
            .await
    }

    fn max_comment_len(&self) -> usize {
        MAX_COMMENT_LEN
    }
}
