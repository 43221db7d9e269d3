//! Issue records as normalised across code-hosting platforms.

use serde::{Deserialize, Serialize};

/// Addresses one issue on a platform.
///
/// `repo` is the repository name on GitHub and the numeric project id on GitLab;
/// `id` is the issue number (GitHub) or iid (GitLab).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRef {
    pub owner: String,
    pub repo: String,
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueComment {
    pub author: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub owner: String,
    pub repo: String,
    pub id: u64,
    pub title: String,
    pub content: String,
    /// `open` for open issues on every platform.
    pub state: String,
    pub labels: Vec<Label>,
    pub comments: Vec<IssueComment>,
}

impl Issue {
    pub fn is_open(&self) -> bool {
        self.state.eq_ignore_ascii_case("open")
    }

    pub fn reference(&self) -> IssueRef {
        IssueRef {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            id: self.id,
        }
    }

    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|label| label.name == name)
    }
}
