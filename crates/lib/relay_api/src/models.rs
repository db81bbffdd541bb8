//! Request and response bodies.
//!
//! Field names are camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use relay_core::models::auth::UserIdentity;
use relay_core::models::installation::{Installation, RecordedWebhook};
use relay_core::recording::RecordOutcome;

use crate::services::control::Viewer;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub name: String,
    pub avatar_url: String,
    pub id: String,
}

impl From<UserIdentity> for UserResponse {
    fn from(user: UserIdentity) -> Self {
        Self {
            name: user.name,
            avatar_url: user.avatar_url,
            id: user.id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationResponse {
    pub id: String,
    pub iid: i64,
    pub login: String,
    pub avatar_url: String,
    pub settings_url: Option<String>,
    pub repos: Value,
    pub rules: Value,
    pub scheduler: Value,
    pub settings: Value,
    pub tasks: Value,
    pub record_webhooks_until: Option<DateTime<Utc>>,
}

impl From<Installation> for InstallationResponse {
    fn from(i: Installation) -> Self {
        Self {
            id: i.id,
            iid: i.iid,
            login: i.login,
            avatar_url: i.avatar_url,
            settings_url: i.settings_url,
            repos: i.repos,
            rules: i.rules,
            scheduler: i.scheduler,
            settings: i.settings,
            tasks: i.tasks,
            record_webhooks_until: i.record_webhooks_until,
        }
    }
}

/// `GET /api/me`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerResponse {
    pub user: UserResponse,
    pub installations: Vec<InstallationResponse>,
    pub installations_to_set_up: Vec<InstallationResponse>,
}

impl From<Viewer> for ViewerResponse {
    fn from(viewer: Viewer) -> Self {
        Self {
            user: viewer.user.into(),
            installations: viewer.installations.into_iter().map(Into::into).collect(),
            installations_to_set_up: viewer
                .installations_to_set_up
                .into_iter()
                .map(Into::into)
                .collect(),
        }
    }
}

/// `PATCH /api/installations/{iid}`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditInstallationRequest {
    pub settings_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedWebhookResponse {
    pub iid: i64,
    pub event: String,
    pub event_id: String,
    pub json: Value,
    pub created_at: DateTime<Utc>,
}

impl From<RecordedWebhook> for RecordedWebhookResponse {
    fn from(w: RecordedWebhook) -> Self {
        Self {
            iid: w.iid,
            event: w.event,
            event_id: w.event_id,
            json: w.json,
            created_at: w.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordedWebhookListResponse {
    pub webhooks: Vec<RecordedWebhookResponse>,
}

/// `POST /webhook`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAcceptedResponse {
    pub event: String,
    pub outcome: String,
}

pub fn outcome_name(outcome: RecordOutcome) -> &'static str {
    match outcome {
        RecordOutcome::Recorded => "recorded",
        RecordOutcome::NotRecording => "not_recording",
        RecordOutcome::WindowElapsed => "window_elapsed",
        RecordOutcome::UnknownInstallation => "unknown_installation",
    }
}
