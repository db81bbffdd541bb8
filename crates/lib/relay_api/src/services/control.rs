//! Control-plane operations.
//!
//! Every operation starts by turning the caller's token into `AuthClaims`,
//! then checks the target installation against the issuer set before the
//! store is touched. Reads are gated exactly like writes.

use std::sync::Arc;

use chrono::{Duration, Utc};
use thiserror::Error;
use tracing::info;

use relay_core::auth::AuthError;
use relay_core::auth::jwt::{authorize, verify_token};
use relay_core::models::auth::{AuthClaims, UserIdentity};
use relay_core::models::installation::{Installation, InstallationPatch, RecordedWebhook};
use relay_core::recording::{self, DEFAULT_RECORDING_WINDOW_SECS};
use relay_core::settings::SettingsSource;
use relay_core::storage::{InstallationStore, StorageError};

/// Control-plane errors.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("No token supplied")]
    Unauthenticated,

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type ControlResult<T> = Result<T, ControlError>;

/// The caller and their installations, split by setup state.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewer {
    pub user: UserIdentity,
    pub installations: Vec<Installation>,
    pub installations_to_set_up: Vec<Installation>,
}

/// Tenant-facing operations over the installation store.
#[derive(Clone)]
pub struct ControlService {
    store: Arc<dyn InstallationStore>,
    settings: Arc<dyn SettingsSource>,
    jwt_secret: Arc<str>,
    recording_window: Duration,
}

impl ControlService {
    pub fn new(
        store: Arc<dyn InstallationStore>,
        settings: Arc<dyn SettingsSource>,
        jwt_secret: &str,
    ) -> Self {
        Self {
            store,
            settings,
            jwt_secret: Arc::from(jwt_secret),
            recording_window: Duration::seconds(DEFAULT_RECORDING_WINDOW_SECS),
        }
    }

    pub fn with_recording_window(mut self, window: Duration) -> Self {
        self.recording_window = window;
        self
    }

    pub fn store(&self) -> &Arc<dyn InstallationStore> {
        &self.store
    }

    /// Verify `token` and return its claims.
    pub fn authorize(&self, token: &str) -> ControlResult<AuthClaims> {
        if token.trim().is_empty() {
            return Err(ControlError::Unauthenticated);
        }
        Ok(verify_token(token, self.jwt_secret.as_bytes())?)
    }

    fn authorize_for(&self, token: &str, iid: i64) -> ControlResult<AuthClaims> {
        let claims = self.authorize(token)?;
        authorize(&claims, iid)?;
        Ok(claims)
    }

    /// The caller plus their configured and pending installations.
    pub async fn me(&self, token: &str) -> ControlResult<Viewer> {
        let claims = self.authorize(token)?;
        let all = self
            .store
            .get_installations(&claims.installation_ids())
            .await?;
        let (installations, installations_to_set_up): (Vec<_>, Vec<_>) =
            all.into_iter().partition(Installation::is_configured);
        Ok(Viewer {
            user: claims.data.user,
            installations,
            installations_to_set_up,
        })
    }

    pub async fn installation(&self, token: &str, iid: i64) -> ControlResult<Option<Installation>> {
        self.authorize_for(token, iid)?;
        Ok(self.store.get_installation(iid).await?)
    }

    pub async fn recorded_webhooks(
        &self,
        token: &str,
        iid: i64,
    ) -> ControlResult<Vec<RecordedWebhook>> {
        self.authorize_for(token, iid)?;
        Ok(self.store.list_recorded_webhooks(iid).await?)
    }

    /// Point an installation at a new settings URL and pull its rules.
    pub async fn edit_installation(
        &self,
        token: &str,
        iid: i64,
        settings_url: Option<String>,
    ) -> ControlResult<Installation> {
        self.authorize_for(token, iid)?;
        self.store
            .save_installation(InstallationPatch::new(iid).settings_url(settings_url))
            .await?;
        info!(iid, "installation settings URL changed");
        Ok(self
            .store
            .update_installation(iid, self.settings.as_ref())
            .await?)
    }

    /// Wipe old recordings and open a new recording window.
    pub async fn make_installation_record(
        &self,
        token: &str,
        iid: i64,
    ) -> ControlResult<Installation> {
        self.authorize_for(token, iid)?;
        Ok(recording::start_recording(
            self.store.as_ref(),
            iid,
            self.recording_window,
            Utc::now(),
        )
        .await?)
    }
}
