//! Inbound webhook events.
//!
//! Payloads are kept as raw JSON; only the handful of fields the run
//! pipeline needs are read out.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A webhook delivery from GitHub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// `resource.action`, e.g. `pull_request.opened`. Events without an
    /// action are just `resource`.
    pub name: String,
    /// GitHub's `X-GitHub-Delivery` GUID.
    pub delivery_id: String,
    pub payload: Value,
}

impl WebhookEvent {
    /// Build an event from the `X-GitHub-Event` header value and the body.
    pub fn from_delivery(event_header: &str, delivery_id: impl Into<String>, payload: Value) -> Self {
        let name = match payload.get("action").and_then(Value::as_str) {
            Some(action) => format!("{event_header}.{action}"),
            None => event_header.to_string(),
        };
        Self {
            name,
            delivery_id: delivery_id.into(),
            payload,
        }
    }

    /// The resource half of the name.
    pub fn resource(&self) -> &str {
        self.name.split('.').next().unwrap_or_default()
    }

    pub fn is_pull_request(&self) -> bool {
        self.resource() == "pull_request"
    }

    pub fn installation_id(&self) -> Option<i64> {
        self.payload
            .pointer("/installation/id")
            .and_then(Value::as_i64)
    }

    pub fn repo_full_name(&self) -> Option<&str> {
        self.payload
            .pointer("/repository/full_name")
            .and_then(Value::as_str)
    }

    pub fn sender_login(&self) -> Option<&str> {
        self.payload
            .pointer("/sender/login")
            .and_then(Value::as_str)
    }

    /// The pull request embedded in the payload, if it parses.
    pub fn pull_request(&self) -> Option<PullRequest> {
        let pr = self.payload.get("pull_request")?;
        serde_json::from_value(pr.clone()).ok()
    }

    /// The PR or issue number a comment would be attached to.
    pub fn commentable_id(&self) -> Option<u64> {
        self.payload
            .pointer("/pull_request/number")
            .or_else(|| self.payload.pointer("/issue/number"))
            .and_then(Value::as_u64)
    }
}

/// The subset of a GitHub pull request the run pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    #[serde(default)]
    pub body: Option<String>,
    pub head: BranchRef,
    pub base: BranchRef,
}

/// One side of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRef {
    #[serde(rename = "ref")]
    pub git_ref: String,
    #[serde(default)]
    pub sha: String,
    /// Missing when the fork was deleted.
    #[serde(default)]
    pub repo: Option<RepoRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    pub full_name: String,
}
