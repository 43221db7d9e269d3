//! Trigger events: what woke the agent up.

use super::PlatformError;
use crate::config::{Environment, PlatformKind};
use crate::domain::IssueRef;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerEvent {
    /// An issue was opened, edited or commented on.
    Issue(IssueRef),
    /// Periodic run over every issue labelled for scheduling.
    Schedule,
}

#[derive(Deserialize)]
struct GithubIssuePayload {
    repository: GithubRepository,
    issue: GithubIssueNumber,
}

#[derive(Deserialize)]
struct GithubRepository {
    name: String,
    owner: GithubOwner,
}

#[derive(Deserialize)]
struct GithubOwner {
    login: String,
}

#[derive(Deserialize)]
struct GithubIssueNumber {
    number: u64,
}

#[derive(Deserialize)]
struct GitlabPayload {
    project: GitlabProject,
    #[serde(default)]
    object_attributes: Option<GitlabIid>,
    #[serde(default)]
    issue: Option<GitlabIid>,
}

#[derive(Deserialize)]
struct GitlabProject {
    id: u64,
    namespace: String,
}

#[derive(Deserialize)]
struct GitlabIid {
    iid: u64,
}

fn payload<T: DeserializeOwned>(event: &str, value: &Value) -> Result<T, PlatformError> {
    T::deserialize(value).map_err(|source| PlatformError::EventPayload {
        event: event.to_string(),
        source,
    })
}

/// Interpret a GitHub Actions event. `None` for events the agent ignores.
pub fn github_event(name: &str, value: &Value) -> Result<Option<TriggerEvent>, PlatformError> {
    match name {
        "issues" | "issue_comment" => {
            let parsed: GithubIssuePayload = payload(name, value)?;
            Ok(Some(TriggerEvent::Issue(IssueRef {
                owner: parsed.repository.owner.login,
                repo: parsed.repository.name,
                id: parsed.issue.number,
            })))
        }
        "schedule" => Ok(Some(TriggerEvent::Schedule)),
        other => {
            warn!(event = other, "Unsupported event");
            Ok(None)
        }
    }
}

/// Interpret a GitLab webhook payload. Issue events carry the iid in
/// `object_attributes`, note events in `issue`.
pub fn gitlab_event(value: &Value) -> Result<Option<TriggerEvent>, PlatformError> {
    let event_type = value.get("event_type").and_then(Value::as_str).unwrap_or_default();
    let parsed: GitlabPayload = match event_type {
        "issue" | "note" => payload(event_type, value)?,
        other => {
            warn!(event = other, "Unsupported event");
            return Ok(None);
        }
    };

    let iid = match event_type {
        "issue" => parsed.object_attributes,
        _ => parsed.issue,
    };
    let Some(iid) = iid else {
        warn!(event = event_type, "Event does not reference an issue");
        return Ok(None);
    };

    Ok(Some(TriggerEvent::Issue(IssueRef {
        owner: parsed.project.namespace,
        repo: parsed.project.id.to_string(),
        id: iid.iid,
    })))
}

fn read_payload(path: &Path) -> Result<Value, PlatformError> {
    let content = fs::read_to_string(path).map_err(|source| PlatformError::EventIo {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| PlatformError::EventPayload {
        event: path.display().to_string(),
        source,
    })
}

/// The event this run was triggered by, read from the CI environment.
pub fn read_trigger_event(env: &Environment) -> Result<Option<TriggerEvent>, PlatformError> {
    let value = match &env.event_path {
        Some(path) => {
            debug!(path = %path.display(), "Reading event payload");
            read_payload(path)?
        }
        None => Value::Object(Default::default()),
    };

    match env.platform {
        PlatformKind::Github => {
            let name = env.event_name.as_deref().ok_or(PlatformError::MissingEventName)?;
            github_event(name, &value)
        }
        PlatformKind::Gitlab => gitlab_event(&value),
    }
}
