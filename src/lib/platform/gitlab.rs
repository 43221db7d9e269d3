//! GitLab REST (v4) adapter.
//!
//! Issues are addressed by numeric project id (`IssueRef::repo`) and iid.
//! The reported owner is the project's namespace name.

use super::github::RawLabel;
use super::http::RestClient;
use super::{Platform, PlatformError};
use crate::domain::{Issue, IssueComment, IssueRef};
use async_trait::async_trait;
use reqwest::header::HeaderName;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

pub const MAX_COMMENT_LEN: usize = 1_000_000;

pub struct GitlabPlatform {
    rest: RestClient,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawIssue {
    iid: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    state: String,
    #[serde(default)]
    labels: Vec<RawLabel>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawNote {
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    system: bool,
    #[serde(default)]
    author: Option<RawAuthor>,
}

#[derive(Debug, Deserialize)]
struct RawAuthor {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawProject {
    namespace: RawNamespace,
}

#[derive(Debug, Deserialize)]
struct RawNamespace {
    name: String,
}

/// GitLab calls open issues `opened`.
pub(crate) fn normalize_state(state: &str) -> String {
    if state == "opened" {
        "open".to_string()
    } else {
        state.to_string()
    }
}

pub(crate) fn normalize_issue(owner: &str, project: &str, raw: RawIssue, notes: Vec<RawNote>) -> Issue {
    Issue {
        owner: owner.to_string(),
        repo: project.to_string(),
        id: raw.iid,
        title: raw.title,
        content: raw.description.unwrap_or_default(),
        state: normalize_state(&raw.state),
        labels: raw.labels.into_iter().map(RawLabel::into_label).collect(),
        comments: notes
            .into_iter()
            .filter(|note| !note.system)
            .map(|note| IssueComment {
                author: note
                    .author
                    .and_then(|author| author.name)
                    .unwrap_or_else(|| "-".into()),
                content: note.body.unwrap_or_default(),
            })
            .collect(),
    }
}

impl GitlabPlatform {
    pub fn new(host: &str, token: &str) -> Result<Self, PlatformError> {
        let base = format!("{}/api/v4", host.trim_end_matches('/'));
        let auth = (HeaderName::from_static("private-token"), token.to_string());
        let rest = RestClient::new(&base, "application/json", auth)?;
        Ok(Self { rest })
    }

    async fn namespace(&self, project: &str) -> Result<String, PlatformError> {
        let raw: RawProject = self.rest.get(&["projects", project], &[]).await?;
        Ok(raw.namespace.name)
    }

    async fn notes(&self, project: &str, iid: u64) -> Result<Vec<RawNote>, PlatformError> {
        let iid = iid.to_string();
        let query = [("sort", "asc".to_string()), ("order_by", "created_at".to_string())];
        self.rest
            .get_all(&["projects", project, "issues", &iid, "notes"], &query)
            .await
    }
}

#[async_trait]
impl Platform for GitlabPlatform {
    async fn get_issue(&self, issue: &IssueRef) -> Result<Issue, PlatformError> {
        let iid = issue.id.to_string();
        let raw: RawIssue = self
            .rest
            .get(&["projects", &issue.repo, "issues", &iid], &[])
            .await?;
        let owner = self.namespace(&issue.repo).await?;
        let notes = self.notes(&issue.repo, issue.id).await?;
        debug!(project = %issue.repo, issue = issue.id, "Fetched GitLab issue");
        Ok(normalize_issue(&owner, &issue.repo, raw, notes))
    }

    async fn list_issues(
        &self,
        _owner: &str,
        repo: &str,
        labels: &[String],
    ) -> Result<Vec<Issue>, PlatformError> {
        let query = [("state", "opened".to_string()), ("labels", labels.join(","))];
        let raw: Vec<RawIssue> = self.rest.get_all(&["projects", repo, "issues"], &query).await?;
        let owner = self.namespace(repo).await?;

        let mut issues = Vec::with_capacity(raw.len());
        for item in raw {
            let notes = self.notes(repo, item.iid).await?;
            issues.push(normalize_issue(&owner, repo, item, notes));
        }
        debug!(project = %repo, count = issues.len(), "Listed GitLab issues");
        Ok(issues)
    }

    async fn create_issue_comment(&self, issue: &IssueRef, body: &str) -> Result<(), PlatformError> {
        let iid = issue.id.to_string();
        self.rest
            .post(
                &["projects", &issue.repo, "issues", &iid, "notes"],
                &json!({ "body": body }),
            )
            .await
    }

    fn max_comment_len(&self) -> usize {
        MAX_COMMENT_LEN
    }
}
