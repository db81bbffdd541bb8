//! Time-boxed webhook recording.
//!
//! Starting a recording wipes what was captured before and opens a window.
//! Nothing closes the window on a timer: the first event that arrives after
//! the deadline wipes the recordings, clears the deadline, and is dropped.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::models::event::WebhookEvent;
use crate::models::installation::{Installation, InstallationPatch, RecordedWebhook};
use crate::storage::{InstallationStore, Result, StorageError};

/// Default recording window, in seconds.
pub const DEFAULT_RECORDING_WINDOW_SECS: i64 = 5 * 60;

/// What happened to an inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    NotRecording,
    /// The window had closed; its recordings are wiped, the deadline is
    /// cleared and the event was dropped.
    WindowElapsed,
    UnknownInstallation,
}

/// Wipe old recordings for `iid`, then open a window of `window` from `now`.
pub async fn start_recording(
    store: &dyn InstallationStore,
    iid: i64,
    window: Duration,
    now: DateTime<Utc>,
) -> Result<Installation> {
    if store.get_installation(iid).await?.is_none() {
        return Err(StorageError::NotFound(iid));
    }
    store.wipe_recorded_webhooks(iid).await?;
    let until = now + window;
    let installation = store
        .save_installation(InstallationPatch::new(iid).record_webhooks_until(Some(until)))
        .await?;
    info!(iid, %until, "recording webhooks");
    Ok(installation)
}

/// Record `event` if its installation is currently recording.
pub async fn record_if_active(
    store: &dyn InstallationStore,
    event: &WebhookEvent,
    now: DateTime<Utc>,
) -> Result<RecordOutcome> {
    let Some(iid) = event.installation_id() else {
        return Ok(RecordOutcome::UnknownInstallation);
    };
    let Some(installation) = store.get_installation(iid).await? else {
        debug!(iid, "event for unknown installation");
        return Ok(RecordOutcome::UnknownInstallation);
    };

    match installation.record_webhooks_until {
        None => Ok(RecordOutcome::NotRecording),
        Some(_) if !installation.is_recording(now) => {
            store.wipe_recorded_webhooks(iid).await?;
            store
                .save_installation(InstallationPatch::new(iid).record_webhooks_until(None))
                .await?;
            info!(iid, "recording window elapsed");
            Ok(RecordOutcome::WindowElapsed)
        }
        Some(_) => {
            store
                .record_webhook(RecordedWebhook {
                    iid,
                    event: event.name.clone(),
                    json: event.payload.clone(),
                    event_id: event.delivery_id.clone(),
                    created_at: now,
                })
                .await?;
            debug!(iid, event = %event.name, delivery = %event.delivery_id, "recorded webhook");
            Ok(RecordOutcome::Recorded)
        }
    }
}
