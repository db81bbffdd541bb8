//! File-backed JSON store.
//!
//! The whole dataset is one JSON document, loaded on `setup` and rewritten
//! after every mutation (write to a temp file, then rename). With no path the
//! store lives purely in memory, which is what tests and local demos use.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{InstallationStore, Result, new_storage_id};
use crate::models::installation::{Installation, InstallationPatch, RecordedWebhook};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Dataset {
    #[serde(default)]
    installations: Vec<Installation>,
    #[serde(default)]
    webhooks: Vec<RecordedWebhook>,
}

/// JSON document store.
pub struct JsonFileStore {
    path: Option<PathBuf>,
    data: RwLock<Dataset>,
}

impl JsonFileStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            data: RwLock::new(Dataset::default()),
        }
    }

    /// A store that never touches disk.
    pub fn in_memory() -> Self {
        Self::new(None)
    }

    async fn persist(&self, data: &Dataset) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(data)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        debug!(path = %path.display(), "persisted JSON store");
        Ok(())
    }
}

#[async_trait]
impl InstallationStore for JsonFileStore {
    async fn setup(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !tokio::fs::try_exists(path).await? {
            info!(path = %path.display(), "JSON store file missing, starting empty");
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                tokio::fs::create_dir_all(parent).await?;
            }
            return Ok(());
        }
        let bytes = tokio::fs::read(path).await?;
        let loaded: Dataset = if bytes.is_empty() {
            Dataset::default()
        } else {
            serde_json::from_slice(&bytes)?
        };
        info!(
            path = %path.display(),
            installations = loaded.installations.len(),
            webhooks = loaded.webhooks.len(),
            "loaded JSON store"
        );
        *self.data.write().await = loaded;
        Ok(())
    }

    async fn get_installations(&self, iids: &[i64]) -> Result<Vec<Installation>> {
        let data = self.data.read().await;
        Ok(data
            .installations
            .iter()
            .filter(|i| iids.contains(&i.iid))
            .cloned()
            .collect())
    }

    async fn save_installation(&self, patch: InstallationPatch) -> Result<Installation> {
        let mut data = self.data.write().await;
        let mut staged = data.clone();
        let iid = patch.iid;
        let saved = match staged.installations.iter_mut().find(|i| i.iid == iid) {
            Some(existing) => {
                existing.apply(patch);
                existing.clone()
            }
            None => {
                let mut created = Installation::new(new_storage_id(), iid);
                created.apply(patch);
                staged.installations.push(created.clone());
                created
            }
        };
        self.persist(&staged).await?;
        *data = staged;
        Ok(saved)
    }

    async fn record_webhook(&self, webhook: RecordedWebhook) -> Result<()> {
        let mut data = self.data.write().await;
        let duplicate = data
            .webhooks
            .iter()
            .any(|w| w.iid == webhook.iid && w.event_id == webhook.event_id);
        if duplicate {
            debug!(iid = webhook.iid, event_id = %webhook.event_id, "webhook already recorded");
            return Ok(());
        }
        let mut staged = data.clone();
        staged.webhooks.push(webhook);
        self.persist(&staged).await?;
        *data = staged;
        Ok(())
    }

    async fn list_recorded_webhooks(&self, iid: i64) -> Result<Vec<RecordedWebhook>> {
        let data = self.data.read().await;
        Ok(data
            .webhooks
            .iter()
            .filter(|w| w.iid == iid)
            .cloned()
            .collect())
    }

    async fn wipe_recorded_webhooks(&self, iid: i64) -> Result<()> {
        let mut data = self.data.write().await;
        let mut staged = data.clone();
        staged.webhooks.retain(|w| w.iid != iid);
        self.persist(&staged).await?;
        *data = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::FetchError;
    use crate::settings::SettingsSource;
    use crate::storage::StorageError;
    use chrono::Utc;
    use serde_json::{Value, json};

    fn webhook(iid: i64, event_id: &str) -> RecordedWebhook {
        RecordedWebhook {
            iid,
            event: "pull_request.opened".into(),
            json: json!({ "action": "opened" }),
            event_id: event_id.into(),
            created_at: Utc::now(),
        }
    }

    struct FixedSettings(Value);

    #[async_trait]
    impl SettingsSource for FixedSettings {
        async fn fetch_settings(&self, _url: &str) -> std::result::Result<Value, FetchError> {
            Ok(self.0.clone())
        }
    }

    struct FailingSettings;

    #[async_trait]
    impl SettingsSource for FailingSettings {
        async fn fetch_settings(&self, url: &str) -> std::result::Result<Value, FetchError> {
            Err(FetchError::Api {
                status: 404,
                message: format!("{url} not found"),
            })
        }
    }

    #[tokio::test]
    async fn get_installations_skips_unknown_ids() {
        let store = JsonFileStore::in_memory();
        store.save_installation(InstallationPatch::new(1)).await.unwrap();

        let found = store.get_installations(&[1, 2, 3]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].iid, 1);
    }

    #[tokio::test]
    async fn save_merges_over_existing_record() {
        let store = JsonFileStore::in_memory();
        let first = store
            .save_installation(InstallationPatch::new(1).login("acme").avatar_url("a.png"))
            .await
            .unwrap();
        let second = store
            .save_installation(InstallationPatch::new(1).settings_url(Some("https://s".into())))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.login, "acme");
        assert_eq!(second.settings_url.as_deref(), Some("https://s"));
        assert_eq!(store.get_installations(&[1]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn recorded_webhooks_are_scoped_and_deduplicated() {
        let store = JsonFileStore::in_memory();
        store.record_webhook(webhook(1, "a")).await.unwrap();
        store.record_webhook(webhook(1, "a")).await.unwrap();
        store.record_webhook(webhook(1, "b")).await.unwrap();
        store.record_webhook(webhook(2, "c")).await.unwrap();

        let ids: Vec<_> = store
            .list_recorded_webhooks(1)
            .await
            .unwrap()
            .into_iter()
            .map(|w| w.event_id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(store.get_recorded_webhook(1, "b").await.unwrap().is_some());
        assert!(store.get_recorded_webhook(1, "c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn wipe_only_touches_one_installation() {
        let store = JsonFileStore::in_memory();
        store.record_webhook(webhook(1, "a")).await.unwrap();
        store.record_webhook(webhook(2, "b")).await.unwrap();
        store.wipe_recorded_webhooks(1).await.unwrap();

        assert!(store.list_recorded_webhooks(1).await.unwrap().is_empty());
        assert_eq!(store.list_recorded_webhooks(2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("relay.json");

        let store = JsonFileStore::new(Some(path.clone()));
        store.setup().await.unwrap();
        store
            .save_installation(InstallationPatch::new(9).login("acme"))
            .await
            .unwrap();
        store.record_webhook(webhook(9, "x")).await.unwrap();

        let reopened = JsonFileStore::new(Some(path));
        reopened.setup().await.unwrap();
        let inst = reopened.get_installation(9).await.unwrap().unwrap();
        assert_eq!(inst.login, "acme");
        assert_eq!(reopened.list_recorded_webhooks(9).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn setup_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(Some(dir.path().join("relay.json")));
        store.setup().await.unwrap();
        store.setup().await.unwrap();
        assert!(store.get_installations(&[1]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_installation_merges_settings_document() {
        let store = JsonFileStore::in_memory();
        store
            .save_installation(InstallationPatch::new(1).settings_url(Some("https://s".into())))
            .await
            .unwrap();

        let source = FixedSettings(json!({
            "rules": { "pull_request": "acme/settings@pr.ts" },
            "settings": { "ignored_repos": ["acme/old"] }
        }));
        let updated = store.update_installation(1, &source).await.unwrap();
        assert_eq!(updated.rules, json!({ "pull_request": "acme/settings@pr.ts" }));
        assert_eq!(updated.settings, json!({ "ignored_repos": ["acme/old"] }));
        assert_eq!(updated.repos, json!({}));
    }

    #[tokio::test]
    async fn update_installation_without_url_is_noop() {
        let store = JsonFileStore::in_memory();
        store.save_installation(InstallationPatch::new(1)).await.unwrap();
        let updated = store.update_installation(1, &FailingSettings).await.unwrap();
        assert!(!updated.is_configured());
    }

    #[tokio::test]
    async fn update_installation_reports_fetch_failure() {
        let store = JsonFileStore::in_memory();
        store
            .save_installation(InstallationPatch::new(1).settings_url(Some("https://s".into())))
            .await
            .unwrap();
        assert!(matches!(
            store.update_installation(1, &FailingSettings).await,
            Err(StorageError::SettingsFetch(_))
        ));
    }

    #[tokio::test]
    async fn update_unknown_installation_is_not_found() {
        let store = JsonFileStore::in_memory();
        assert!(matches!(
            store.update_installation(5, &FailingSettings).await,
            Err(StorageError::NotFound(5))
        ));
    }

    #[tokio::test]
    async fn failed_persist_leaves_store_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");
        let store = JsonFileStore::new(Some(path.clone()));
        store.setup().await.unwrap();
        store.save_installation(InstallationPatch::new(1)).await.unwrap();
        store.record_webhook(webhook(1, "a")).await.unwrap();

        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();

        assert!(store.save_installation(InstallationPatch::new(7)).await.is_err());
        assert!(store.record_webhook(webhook(1, "b")).await.is_err());
        assert!(store.wipe_recorded_webhooks(1).await.is_err());

        let iids: Vec<_> = store
            .get_installations(&[1, 7])
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.iid)
            .collect();
        assert_eq!(iids, vec![1]);
        let ids: Vec<_> = store
            .list_recorded_webhooks(1)
            .await
            .unwrap()
            .into_iter()
            .map(|w| w.event_id)
            .collect();
        assert_eq!(ids, vec!["a"]);
    }
}
