//! GitHub REST access.
//!
//! `GitHubClient` is a thin authenticated wrapper over `reqwest` for the few
//! endpoints Relay needs. The run pipeline only sees it through
//! `SourceHost`, so tests can swap in a fake.

pub mod pull_request;
pub mod webhook;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub use pull_request::GitHubPullRequest;

/// Public GitHub API root.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const USER_AGENT: &str = "relay";
const API_VERSION: &str = "2022-11-28";

/// Errors talking to GitHub or another HTTP source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("GitHub API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Could not decode response: {0}")]
    Decode(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Read access to repositories.
#[async_trait]
pub trait SourceHost: Send + Sync {
    /// Contents of `path` in `repo` at `git_ref` (default branch when
    /// `None`). A missing file is an empty string, not an error.
    async fn file_contents(
        &self,
        repo: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<String, FetchError>;

    /// Whether `user` has write access (or better) to `repo`.
    async fn can_user_write_to_repo(&self, user: &str, repo: &str) -> Result<bool, FetchError>;
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Deserialize)]
struct PermissionResponse {
    permission: String,
}

/// Authenticated GitHub REST client.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: Url,
    token: String,
}

impl GitHubClient {
    /// Client for the API root in `GITHUB_API_URL`, or api.github.com.
    pub fn new(token: impl Into<String>) -> Result<Self, FetchError> {
        let api_url =
            std::env::var("GITHUB_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Self::with_api_url(reqwest::Client::new(), &api_url, token)
    }

    pub fn with_api_url(
        http: reqwest::Client,
        api_url: &str,
        token: impl Into<String>,
    ) -> Result<Self, FetchError> {
        // `Url::join` drops the last segment unless the base ends in a slash.
        let normalized = format!("{}/", api_url.trim_end_matches('/'));
        let api_url = Url::parse(&normalized)
            .map_err(|e| FetchError::InvalidUrl(format!("{api_url}: {e}")))?;
        Ok(Self {
            http,
            api_url,
            token: token.into(),
        })
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
        self.api_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| FetchError::InvalidUrl(format!("{path}: {e}")))
    }

    pub(crate) fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("User-Agent", USER_AGENT)
    }

    /// Send a request and decode a JSON body.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, FetchError> {
        let response = check_status(request.send().await?).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// Send a request whose body is ignored.
    pub(crate) async fn send_empty(&self, request: RequestBuilder) -> Result<(), FetchError> {
        check_status(request.send().await?).await?;
        Ok(())
    }
}

/// Turn a non-2xx response into `FetchError::Api`.
pub(crate) async fn check_status(response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), "GitHub request failed");
    Err(FetchError::Api {
        status: status.as_u16(),
        message,
    })
}

fn decode_content(content: &ContentResponse) -> Result<String, FetchError> {
    match content.encoding.as_deref() {
        Some("base64") | None => {
            let compact: String = content
                .content
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            let bytes = STANDARD
                .decode(compact)
                .map_err(|e| FetchError::Decode(e.to_string()))?;
            String::from_utf8(bytes).map_err(|e| FetchError::Decode(e.to_string()))
        }
        Some(other) => Err(FetchError::Decode(format!("unsupported encoding {other}"))),
    }
}

#[async_trait]
impl SourceHost for GitHubClient {
    async fn file_contents(
        &self,
        repo: &str,
        path: &str,
        git_ref: Option<&str>,
    ) -> Result<String, FetchError> {
        let mut url = self.endpoint(&format!(
            "repos/{repo}/contents/{}",
            path.trim_start_matches('/')
        ))?;
        if let Some(git_ref) = git_ref {
            url.query_pairs_mut().append_pair("ref", git_ref);
        }
        debug!(repo, path, git_ref, "fetching file contents");

        let response = self.request(Method::GET, url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(repo, path, "file not found");
            return Ok(String::new());
        }
        let response = check_status(response).await?;
        let text = response.text().await?;
        let content: ContentResponse =
            serde_json::from_str(&text).map_err(|e| FetchError::Decode(e.to_string()))?;
        decode_content(&content)
    }

    async fn can_user_write_to_repo(&self, user: &str, repo: &str) -> Result<bool, FetchError> {
        let url = self.endpoint(&format!("repos/{repo}/collaborators/{user}/permission"))?;
        let response = self.request(Method::GET, url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        let response = check_status(response).await?;
        let text = response.text().await?;
        let permission: PermissionResponse =
            serde_json::from_str(&text).map_err(|e| FetchError::Decode(e.to_string()))?;
        let can_write = matches!(permission.permission.as_str(), "admin" | "maintain" | "write");
        debug!(user, repo, permission = %permission.permission, can_write, "checked repo permission");
        Ok(can_write)
    }
}
