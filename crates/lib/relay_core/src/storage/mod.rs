//! Installation persistence.
//!
//! `InstallationStore` is the one interface the rest of Relay uses for
//! installations and recorded webhooks. Two interchangeable backends exist:
//! a JSON file (`JsonFileStore`) and PostgreSQL JSONB documents (`PgStore`).
//! Exactly one is opened at process start and shared as
//! `Arc<dyn InstallationStore>`.

pub mod json;
pub mod postgres;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::github::FetchError;
use crate::models::installation::{Installation, InstallationPatch, RecordedWebhook};
use crate::settings::SettingsSource;

pub use json::JsonFileStore;
pub use postgres::PgStore;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("No storage configured: set DATABASE_JSON_FILE or DATABASE_URL")]
    NotConfigured,

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Installation {0} not found")]
    NotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Could not fetch installation settings: {0}")]
    SettingsFetch(#[from] FetchError),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Uniform interface over the backing stores.
///
/// Concurrent saves to the same installation are last-write-wins.
#[async_trait]
pub trait InstallationStore: Send + Sync {
    /// One-time initialization. Safe to call more than once.
    async fn setup(&self) -> Result<()>;

    /// Installations whose `iid` is in `iids`. Unknown IDs are skipped.
    async fn get_installations(&self, iids: &[i64]) -> Result<Vec<Installation>>;

    /// Upsert by `iid`, merging the supplied fields over the stored record.
    async fn save_installation(&self, patch: InstallationPatch) -> Result<Installation>;

    /// Append a recorded webhook. A repeated `event_id` for the same
    /// installation is ignored.
    async fn record_webhook(&self, webhook: RecordedWebhook) -> Result<()>;

    /// Recorded webhooks for an installation, oldest first.
    async fn list_recorded_webhooks(&self, iid: i64) -> Result<Vec<RecordedWebhook>>;

    /// Delete every recorded webhook for an installation.
    async fn wipe_recorded_webhooks(&self, iid: i64) -> Result<()>;

    async fn get_installation(&self, iid: i64) -> Result<Option<Installation>> {
        Ok(self.get_installations(&[iid]).await?.into_iter().next())
    }

    async fn get_recorded_webhook(
        &self,
        iid: i64,
        event_id: &str,
    ) -> Result<Option<RecordedWebhook>> {
        Ok(self
            .list_recorded_webhooks(iid)
            .await?
            .into_iter()
            .find(|w| w.event_id == event_id))
    }

    /// Refresh an installation's rule maps from its settings URL.
    ///
    /// Installations without a settings URL are returned unchanged.
    async fn update_installation(
        &self,
        iid: i64,
        source: &dyn SettingsSource,
    ) -> Result<Installation> {
        let installation = self
            .get_installation(iid)
            .await?
            .ok_or(StorageError::NotFound(iid))?;

        let Some(url) = installation.settings_url.as_deref() else {
            debug!(iid, "no settings URL, skipping refresh");
            return Ok(installation);
        };

        let document = source.fetch_settings(url).await?;
        info!(iid, url, "refreshed installation settings");
        self.save_installation(InstallationPatch::new(iid).with_settings_document(&document))
            .await
    }
}

/// Storage ID for a new installation. UUIDv7, so IDs sort by creation time.
pub(crate) fn new_storage_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// Which backend to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    /// File-backed JSON store. `None` keeps everything in memory.
    JsonFile(Option<PathBuf>),
    /// PostgreSQL connection URL.
    Postgres(String),
}

impl StorageConfig {
    /// Pick a backend from the environment.
    ///
    /// | Variable             | Backend          |
    /// |----------------------|------------------|
    /// | `DATABASE_JSON_FILE` | `JsonFileStore`  |
    /// | `DATABASE_URL`       | `PgStore`        |
    ///
    /// `DATABASE_JSON_FILE` wins when both are set.
    pub fn from_env() -> Result<Self> {
        Self::select(
            std::env::var("DATABASE_JSON_FILE").ok(),
            std::env::var("DATABASE_URL").ok(),
        )
    }

    /// Pick a backend from explicit settings, with the same precedence as
    /// `from_env`. Empty values count as unset.
    pub fn select(json_file: Option<String>, database_url: Option<String>) -> Result<Self> {
        if let Some(path) = json_file.filter(|p| !p.is_empty()) {
            return Ok(Self::JsonFile(Some(PathBuf::from(path))));
        }
        if let Some(url) = database_url.filter(|u| !u.is_empty()) {
            return Ok(Self::Postgres(url));
        }
        Err(StorageError::NotConfigured)
    }
}

/// Open and set up the configured backend.
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn InstallationStore>> {
    let store: Arc<dyn InstallationStore> = match config {
        StorageConfig::JsonFile(path) => {
            info!(path = ?path, "using JSON file storage");
            Arc::new(JsonFileStore::new(path.clone()))
        }
        StorageConfig::Postgres(url) => {
            info!("using PostgreSQL storage");
            Arc::new(PgStore::connect(url).await?)
        }
    };
    store.setup().await?;
    Ok(store)
}
