//! Fetching installation settings documents.
//!
//! An installation's settings URL is either a plain `http(s)` URL or a
//! GitHub shorthand `owner/repo@path/to/settings.json`, which resolves to the
//! raw file on the default branch.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::github::FetchError;

const RAW_GITHUB_BASE: &str = "https://raw.githubusercontent.com";

/// Where installation settings come from.
#[async_trait]
pub trait SettingsSource: Send + Sync {
    /// Fetch and parse the settings JSON at `reference`.
    async fn fetch_settings(&self, reference: &str) -> Result<Value, FetchError>;
}

/// Turn a settings reference into a fetchable URL.
pub fn resolve_settings_url(reference: &str) -> Result<Url, FetchError> {
    if let Ok(url) = Url::parse(reference)
        && matches!(url.scheme(), "http" | "https")
    {
        return Ok(url);
    }

    let (repo, path) = reference
        .split_once('@')
        .ok_or_else(|| FetchError::InvalidUrl(reference.to_string()))?;
    let valid_repo = repo.split('/').filter(|p| !p.is_empty()).count() == 2;
    if !valid_repo || path.is_empty() {
        return Err(FetchError::InvalidUrl(reference.to_string()));
    }
    let raw = format!(
        "{RAW_GITHUB_BASE}/{repo}/HEAD/{}",
        path.trim_start_matches('/')
    );
    Url::parse(&raw).map_err(|e| FetchError::InvalidUrl(format!("{reference}: {e}")))
}

/// Fetches settings over HTTP.
#[derive(Clone, Default)]
pub struct HttpSettingsSource {
    http: reqwest::Client,
}

impl HttpSettingsSource {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl SettingsSource for HttpSettingsSource {
    async fn fetch_settings(&self, reference: &str) -> Result<Value, FetchError> {
        let url = resolve_settings_url(reference)?;
        debug!(%url, "fetching installation settings");

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FetchError::Api {
                status: status.as_u16(),
                message,
            });
        }
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| FetchError::Decode(e.to_string()))
    }
}
