//! Per-run configuration and results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which DSL a Dangerfile is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DslType {
    /// Full pull request DSL.
    Pr,
    /// The raw webhook payload only.
    Import,
}

/// A resolved rule: which Dangerfile to run and where it lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// External repo holding the Dangerfile. `None` means the event's own repo.
    pub repo_slug: Option<String>,
    pub dangerfile_path: String,
    /// The original rule reference, e.g. `org/repo@rules/pr.ts`.
    pub reference_string: String,
    pub dsl_type: DslType,
}

/// Installation-level context for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSettings {
    pub installation_id: i64,
    /// Full name of the repo the event came from.
    pub repo_name: Option<String>,
    /// Login of the user who triggered the event.
    pub triggered_by_username: Option<String>,
    /// Issue or PR number comments go to, when there is one.
    pub commentable_id: Option<u64>,
    pub installation_settings: Value,
}

/// One result entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub message: String,
}

impl Violation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Structured output of a Dangerfile run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub fails: Vec<Violation>,
    pub warnings: Vec<Violation>,
    pub messages: Vec<Violation>,
    pub markdowns: Vec<Violation>,
}

impl RunResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            fails: vec![Violation::new(message)],
            ..Default::default()
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            messages: vec![Violation::new(message)],
            ..Default::default()
        }
    }

    /// Ran, but nothing to report.
    pub fn is_empty(&self) -> bool {
        self.fails.is_empty()
            && self.warnings.is_empty()
            && self.messages.is_empty()
            && self.markdowns.is_empty()
    }
}
