//! PostgreSQL document store.
//!
//! Installations are stored whole as JSONB documents keyed by `iid`, so the
//! record shape stays identical to the JSON file store. Recorded webhooks
//! get their own table ordered by an insertion sequence.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use tracing::info;

use super::{InstallationStore, Result, new_storage_id};
use crate::models::installation::{Installation, InstallationPatch, RecordedWebhook};

/// Maximum number of pooled connections.
const MAX_CONNECTIONS: u32 = 5;

/// JSONB-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect a pool to `url`. Migrations run in `setup`.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(url)
            .await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InstallationStore for PgStore {
    async fn setup(&self) -> Result<()> {
        info!("running database migrations");
        crate::migrate::migrate(&self.pool).await?;
        Ok(())
    }

    async fn get_installations(&self, iids: &[i64]) -> Result<Vec<Installation>> {
        let rows = sqlx::query_scalar::<_, Json<Installation>>(
            "SELECT doc FROM installations WHERE iid = ANY($1) ORDER BY iid",
        )
        .bind(iids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|Json(i)| i).collect())
    }

    async fn save_installation(&self, patch: InstallationPatch) -> Result<Installation> {
        let mut tx = self.pool.begin().await?;
        let iid = patch.iid;

        let existing = sqlx::query_scalar::<_, Json<Installation>>(
            "SELECT doc FROM installations WHERE iid = $1 FOR UPDATE",
        )
        .bind(iid)
        .fetch_optional(&mut *tx)
        .await?;

        let mut installation = match existing {
            Some(Json(i)) => i,
            None => Installation::new(new_storage_id(), iid),
        };
        installation.apply(patch);

        sqlx::query(
            "INSERT INTO installations (iid, id, doc, updated_at) VALUES ($1, $2, $3, now()) \
             ON CONFLICT (iid) DO UPDATE SET doc = EXCLUDED.doc, updated_at = now()",
        )
        .bind(iid)
        .bind(&installation.id)
        .bind(Json(&installation))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(installation)
    }

    async fn record_webhook(&self, webhook: RecordedWebhook) -> Result<()> {
        sqlx::query(
            "INSERT INTO recorded_webhooks (iid, event_id, event, json, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (iid, event_id) DO NOTHING",
        )
        .bind(webhook.iid)
        .bind(&webhook.event_id)
        .bind(&webhook.event)
        .bind(Json(&webhook.json))
        .bind(webhook.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_recorded_webhooks(&self, iid: i64) -> Result<Vec<RecordedWebhook>> {
        let rows = sqlx::query_as::<
            _,
            (
                i64,
                String,
                String,
                Json<serde_json::Value>,
                chrono::DateTime<chrono::Utc>,
            ),
        >(
            "SELECT iid, event, event_id, json, created_at \
             FROM recorded_webhooks \
             WHERE iid = $1 \
             ORDER BY seq",
        )
        .bind(iid)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(iid, event, event_id, Json(json), created_at)| RecordedWebhook {
                iid,
                event,
                json,
                event_id,
                created_at,
            })
            .collect())
    }

    async fn wipe_recorded_webhooks(&self, iid: i64) -> Result<()> {
        sqlx::query("DELETE FROM recorded_webhooks WHERE iid = $1")
            .bind(iid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
