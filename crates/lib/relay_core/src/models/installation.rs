//! Installation domain models.
//!
//! An installation is one tenant's configuration of Relay on a GitHub
//! account. Recorded webhooks hang off an installation by `iid`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// A stored installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installation {
    /// Storage ID (UUIDv7 text), stable for the life of the record.
    pub id: String,
    /// Installation ID as numbered by GitHub. Unique across the store.
    pub iid: i64,
    /// Login of the user or org the installation is attached to.
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub avatar_url: String,
    /// Where the settings JSON lives. `None` means the installation still
    /// needs setting up.
    #[serde(default)]
    pub settings_url: Option<String>,
    /// Per-repo rules.
    #[serde(default = "empty_object")]
    pub repos: Value,
    /// Rules applied to every repo.
    #[serde(default = "empty_object")]
    pub rules: Value,
    /// Scheduled tasks to run repeatedly.
    #[serde(default = "empty_object")]
    pub scheduler: Value,
    /// Free-form installation settings, e.g. ignored repos.
    #[serde(default = "empty_object")]
    pub settings: Value,
    /// Tasks which can be scheduled to run in the future.
    #[serde(default = "empty_object")]
    pub tasks: Value,
    /// Deadline of the current webhook recording window, if one was opened.
    #[serde(default)]
    pub record_webhooks_until: Option<DateTime<Utc>>,
}

impl Installation {
    /// A fresh, unconfigured installation.
    pub fn new(id: impl Into<String>, iid: i64) -> Self {
        Self {
            id: id.into(),
            iid,
            login: String::new(),
            avatar_url: String::new(),
            settings_url: None,
            repos: empty_object(),
            rules: empty_object(),
            scheduler: empty_object(),
            settings: empty_object(),
            tasks: empty_object(),
            record_webhooks_until: None,
        }
    }

    /// Whether a settings URL has been set.
    pub fn is_configured(&self) -> bool {
        self.settings_url.is_some()
    }

    /// Whether webhooks should be recorded at `now`.
    pub fn is_recording(&self, now: DateTime<Utc>) -> bool {
        self.record_webhooks_until.is_some_and(|until| now < until)
    }

    /// Merge the fields supplied in `patch` over this installation.
    ///
    /// The `iid` of the patch is ignored; callers match records by `iid`
    /// before applying.
    pub fn apply(&mut self, patch: InstallationPatch) {
        let InstallationPatch {
            iid: _,
            login,
            avatar_url,
            settings_url,
            repos,
            rules,
            scheduler,
            settings,
            tasks,
            record_webhooks_until,
        } = patch;

        if let Some(login) = login {
            self.login = login;
        }
        if let Some(avatar_url) = avatar_url {
            self.avatar_url = avatar_url;
        }
        if let Some(settings_url) = settings_url {
            self.settings_url = settings_url;
        }
        if let Some(repos) = repos {
            self.repos = repos;
        }
        if let Some(rules) = rules {
            self.rules = rules;
        }
        if let Some(scheduler) = scheduler {
            self.scheduler = scheduler;
        }
        if let Some(settings) = settings {
            self.settings = settings;
        }
        if let Some(tasks) = tasks {
            self.tasks = tasks;
        }
        if let Some(until) = record_webhooks_until {
            self.record_webhooks_until = until;
        }
    }
}

/// Partial update for an installation, keyed by `iid`.
///
/// `None` leaves a field untouched. Nullable fields use a nested option so
/// they can be cleared with `Some(None)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstallationPatch {
    pub iid: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_url: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repos: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduler: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_webhooks_until: Option<Option<DateTime<Utc>>>,
}

impl InstallationPatch {
    pub fn new(iid: i64) -> Self {
        Self {
            iid,
            ..Default::default()
        }
    }

    pub fn login(mut self, login: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self
    }

    pub fn avatar_url(mut self, avatar_url: impl Into<String>) -> Self {
        self.avatar_url = Some(avatar_url.into());
        self
    }

    pub fn settings_url(mut self, url: Option<String>) -> Self {
        self.settings_url = Some(url);
        self
    }

    pub fn record_webhooks_until(mut self, until: Option<DateTime<Utc>>) -> Self {
        self.record_webhooks_until = Some(until);
        self
    }

    /// Copy the rule maps out of a fetched settings document.
    ///
    /// Keys missing from the document are left untouched.
    pub fn with_settings_document(mut self, doc: &Value) -> Self {
        let take = |key: &str| doc.get(key).filter(|v| !v.is_null()).cloned();
        self.repos = take("repos");
        self.rules = take("rules");
        self.scheduler = take("scheduler");
        self.settings = take("settings");
        self.tasks = take("tasks");
        self
    }
}

/// A webhook captured while its installation was recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedWebhook {
    pub iid: i64,
    /// Event name such as `pull_request.closed`.
    pub event: String,
    /// The raw webhook payload.
    pub json: Value,
    /// GitHub's delivery GUID.
    pub event_id: String,
    pub created_at: DateTime<Utc>,
}
