//! Turns a trigger event into character runs.

use super::character::Character;
use crate::config::RunContext;
use crate::constants::SCHEDULE_LABEL;
use crate::domain::Issue;
use crate::platform::{Platform, PlatformError, TriggerEvent};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Counters of one driver invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub issues: usize,
    pub skipped: usize,
    pub runs: usize,
    pub failures: usize,
}

pub struct Driver {
    platform: Arc<dyn Platform>,
    characters: Vec<Character>,
    context: RunContext,
}

impl Driver {
    pub fn new(platform: Arc<dyn Platform>, characters: Vec<Character>, context: RunContext) -> Self {
        Self {
            platform,
            characters,
            context,
        }
    }

    /// Fetch the issues the event refers to and let every matching
    /// character work on each, one at a time.
    pub async fn handle(&mut self, event: &TriggerEvent) -> Result<RunSummary, PlatformError> {
        let mut queue: VecDeque<Issue> = match event {
            TriggerEvent::Issue(reference) => {
                info!(owner = %reference.owner, repo = %reference.repo, issue = reference.id, "Issue event");
                VecDeque::from([self.platform.get_issue(reference).await?])
            }
            TriggerEvent::Schedule => {
                let issues = self
                    .platform
                    .list_issues(
                        &self.context.owner,
                        &self.context.repo,
                        &[SCHEDULE_LABEL.to_string()],
                    )
                    .await?;
                info!(count = issues.len(), "Scheduled run");
                issues.into()
            }
        };

        let mut summary = RunSummary::default();
        while let Some(issue) = queue.pop_front() {
            summary.issues += 1;
            if !issue.is_open() {
                debug!(issue = issue.id, state = %issue.state, "Skipping issue that is not open");
                summary.skipped += 1;
                continue;
            }
            self.run_characters(&issue, &mut summary).await;
        }
        Ok(summary)
    }

    async fn run_characters(&mut self, issue: &Issue, summary: &mut RunSummary) {
        for character in &mut self.characters {
            if !character.matches(issue) {
                continue;
            }
            summary.runs += 1;
            info!(character = %character.name(), issue = issue.id, "Character starts");

            let result = match character.initialize().await {
                Ok(()) => character.do_task(issue).await.map(|_| ()).map_err(|e| e.to_string()),
                Err(err) => Err(err.to_string()),
            };
            character.finalize().await;

            if let Err(err) = result {
                summary.failures += 1;
                error!(character = %character.name(), issue = issue.id, %err, "Character failed");
            }
        }
    }
}
