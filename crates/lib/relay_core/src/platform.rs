//! Review platform capabilities.
//!
//! `ReviewPlatform` is the fixed set of operations a Dangerfile run can
//! perform against whatever triggered it. `PlatformAdaptor` picks between a
//! live pull request handle and a reduced surface built from the raw event,
//! so the same execution path serves PR and non-PR events. Capabilities that
//! a degraded surface lacks are harmless no-ops, never errors.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::github::FetchError;

/// What kind of run is happening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunType {
    /// Triggered by a pull request event.
    Pr,
    /// Triggered by any other webhook.
    Event,
}

/// An inline review comment to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineComment {
    pub path: String,
    pub line: u64,
    pub body: String,
}

/// An inline review comment that already exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineCommentRecord {
    pub id: u64,
    pub path: String,
    pub line: Option<u64>,
    pub body: String,
}

/// Commit status state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusState {
    Pending,
    Success,
    Failure,
    Error,
}

/// A commit status to post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub state: StatusState,
    pub description: String,
    pub target_url: Option<String>,
}

/// Operations a run may perform on its review surface.
#[async_trait]
pub trait ReviewPlatform: Send + Sync {
    /// Short platform name, e.g. `GitHub`.
    fn name(&self) -> &str;

    /// File contents at `git_ref`, or an empty string when the file does not
    /// exist. `repo_slug` of `None` means the platform's own repository.
    async fn get_file_contents(
        &self,
        path: &str,
        repo_slug: Option<&str>,
        git_ref: Option<&str>,
    ) -> Result<String, FetchError>;

    /// Post a new top-level comment, returning its URL.
    async fn create_comment(&self, body: &str) -> Result<String, FetchError>;

    /// Edit the main comment in place, or post it if there is none.
    async fn update_or_create_comment(&self, body: &str) -> Result<String, FetchError>;

    /// Delete the main comment. `false` when there was nothing to delete.
    async fn delete_main_comment(&self) -> Result<bool, FetchError>;

    async fn create_inline_comment(&self, comment: &InlineComment) -> Result<String, FetchError>;

    async fn update_inline_comment(&self, id: u64, body: &str) -> Result<String, FetchError>;

    async fn delete_inline_comment(&self, id: u64) -> Result<bool, FetchError>;

    async fn list_inline_comments(&self) -> Result<Vec<InlineCommentRecord>, FetchError>;

    fn supports_commenting(&self) -> bool;

    fn supports_inline_comments(&self) -> bool;

    async fn update_status(&self, status: &StatusUpdate) -> Result<bool, FetchError>;

    /// Render a list of file paths for a comment body.
    fn file_links(&self, paths: &[String]) -> String;

    /// The platform half of the Dangerfile DSL.
    async fn review_surface_representation(&self) -> Result<Value, FetchError>;

    /// The git half of the Dangerfile DSL.
    async fn source_control_representation(&self) -> Result<Value, FetchError>;
}

/// A reduced surface for events that have nothing to comment on.
pub struct DegradedPlatform {
    event: Value,
    api: Option<Arc<dyn ReviewPlatform>>,
}

impl DegradedPlatform {
    pub fn new(event: Value, api: Option<Arc<dyn ReviewPlatform>>) -> Self {
        Self { event, api }
    }
}

/// The capability set handed to a Dangerfile run.
pub enum PlatformAdaptor {
    /// Every call goes straight to the live handle.
    Full(Arc<dyn ReviewPlatform>),
    /// Writes are no-ops; reads go through the optional read-only API.
    Degraded(DegradedPlatform),
}

impl PlatformAdaptor {
    /// Choose the surface for an event.
    ///
    /// Only a PR run with a live handle gets the full surface. The handle, if
    /// any, stays available to degraded runs for reads.
    pub fn for_event(
        run_type: RunType,
        handle: Option<Arc<dyn ReviewPlatform>>,
        event: Value,
    ) -> Self {
        match (run_type, handle) {
            (RunType::Pr, Some(handle)) => Self::Full(handle),
            (_, api) => Self::Degraded(DegradedPlatform::new(event, api)),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }
}

#[async_trait]
impl ReviewPlatform for DegradedPlatform {
    fn name(&self) -> &str {
        "Relay"
    }

    async fn get_file_contents(
        &self,
        path: &str,
        repo_slug: Option<&str>,
        git_ref: Option<&str>,
    ) -> Result<String, FetchError> {
        match &self.api {
            Some(api) => api.get_file_contents(path, repo_slug, git_ref).await,
            None => Ok(String::new()),
        }
    }

    async fn create_comment(&self, _body: &str) -> Result<String, FetchError> {
        Ok(String::new())
    }

    async fn update_or_create_comment(&self, _body: &str) -> Result<String, FetchError> {
        Ok(String::new())
    }

    async fn delete_main_comment(&self) -> Result<bool, FetchError> {
        Ok(false)
    }

    async fn create_inline_comment(&self, _comment: &InlineComment) -> Result<String, FetchError> {
        Ok(String::new())
    }

    async fn update_inline_comment(&self, _id: u64, _body: &str) -> Result<String, FetchError> {
        Ok(String::new())
    }

    async fn delete_inline_comment(&self, _id: u64) -> Result<bool, FetchError> {
        Ok(false)
    }

    async fn list_inline_comments(&self) -> Result<Vec<InlineCommentRecord>, FetchError> {
        Ok(Vec::new())
    }

    fn supports_commenting(&self) -> bool {
        false
    }

    fn supports_inline_comments(&self) -> bool {
        false
    }

    async fn update_status(&self, _status: &StatusUpdate) -> Result<bool, FetchError> {
        Ok(false)
    }

    fn file_links(&self, paths: &[String]) -> String {
        paths.join(", ")
    }

    /// The raw event, plus `api` and `utils` describing what is reachable.
    async fn review_surface_representation(&self) -> Result<Value, FetchError> {
        let mut surface = match &self.event {
            Value::Object(fields) => fields.clone(),
            other => {
                let mut fields = Map::new();
                fields.insert("event".into(), other.clone());
                fields
            }
        };
        let api = self
            .api
            .as_ref()
            .map(|api| json!({ "platform": api.name(), "readOnly": true }))
            .unwrap_or(Value::Null);
        surface.insert("api".into(), api);
        surface.insert(
            "utils".into(),
            json!({ "fileContents": self.api.is_some(), "fileLinks": "plain" }),
        );
        Ok(Value::Object(surface))
    }

    async fn source_control_representation(&self) -> Result<Value, FetchError> {
        Ok(json!({}))
    }
}

#[async_trait]
impl ReviewPlatform for PlatformAdaptor {
    fn name(&self) -> &str {
        match self {
            Self::Full(p) => p.name(),
            Self::Degraded(p) => p.name(),
        }
    }

    async fn get_file_contents(
        &self,
        path: &str,
        repo_slug: Option<&str>,
        git_ref: Option<&str>,
    ) -> Result<String, FetchError> {
        match self {
            Self::Full(p) => p.get_file_contents(path, repo_slug, git_ref).await,
            Self::Degraded(p) => p.get_file_contents(path, repo_slug, git_ref).await,
        }
    }

    async fn create_comment(&self, body: &str) -> Result<String, FetchError> {
        match self {
            Self::Full(p) => p.create_comment(body).await,
            Self::Degraded(p) => p.create_comment(body).await,
        }
    }

    async fn update_or_create_comment(&self, body: &str) -> Result<String, FetchError> {
        match self {
            Self::Full(p) => p.update_or_create_comment(body).await,
            Self::Degraded(p) => p.update_or_create_comment(body).await,
        }
    }

    async fn delete_main_comment(&self) -> Result<bool, FetchError> {
        match self {
            Self::Full(p) => p.delete_main_comment().await,
            Self::Degraded(p) => p.delete_main_comment().await,
        }
    }

    async fn create_inline_comment(&self, comment: &InlineComment) -> Result<String, FetchError> {
        match self {
            Self::Full(p) => p.create_inline_comment(comment).await,
            Self::Degraded(p) => p.create_inline_comment(comment).await,
        }
    }

    async fn update_inline_comment(&self, id: u64, body: &str) -> Result<String, FetchError> {
        match self {
            Self::Full(p) => p.update_inline_comment(id, body).await,
            Self::Degraded(p) => p.update_inline_comment(id, body).await,
        }
    }

    async fn delete_inline_comment(&self, id: u64) -> Result<bool, FetchError> {
        match self {
            Self::Full(p) => p.delete_inline_comment(id).await,
            Self::Degraded(p) => p.delete_inline_comment(id).await,
        }
    }

    async fn list_inline_comments(&self) -> Result<Vec<InlineCommentRecord>, FetchError> {
        match self {
            Self::Full(p) => p.list_inline_comments().await,
            Self::Degraded(p) => p.list_inline_comments().await,
        }
    }

    fn supports_commenting(&self) -> bool {
        match self {
            Self::Full(p) => p.supports_commenting(),
            Self::Degraded(p) => p.supports_commenting(),
        }
    }

    fn supports_inline_comments(&self) -> bool {
        match self {
            Self::Full(p) => p.supports_inline_comments(),
            Self::Degraded(p) => p.supports_inline_comments(),
        }
    }

    async fn update_status(&self, status: &StatusUpdate) -> Result<bool, FetchError> {
        match self {
            Self::Full(p) => p.update_status(status).await,
            Self::Degraded(p) => p.update_status(status).await,
        }
    }

    fn file_links(&self, paths: &[String]) -> String {
        match self {
            Self::Full(p) => p.file_links(paths),
            Self::Degraded(p) => p.file_links(paths),
        }
    }

    async fn review_surface_representation(&self) -> Result<Value, FetchError> {
        match self {
            Self::Full(p) => p.review_surface_representation().await,
            Self::Degraded(p) => p.review_surface_representation().await,
        }
    }

    async fn source_control_representation(&self) -> Result<Value, FetchError> {
        match self {
            Self::Full(p) => p.source_control_representation().await,
            Self::Degraded(p) => p.source_control_representation().await,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records how many write calls reached it.
    #[derive(Default)]
    pub(crate) struct RecordingPlatform {
        pub writes: AtomicUsize,
    }

    impl RecordingPlatform {
        fn write(&self) -> Result<String, FetchError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok("https://github.com/acme/app/pull/1#comment".into())
        }
    }

    #[async_trait]
    impl ReviewPlatform for RecordingPlatform {
        fn name(&self) -> &str {
            "GitHub"
        }

        async fn get_file_contents(
            &self,
            path: &str,
            _repo_slug: Option<&str>,
            _git_ref: Option<&str>,
        ) -> Result<String, FetchError> {
            Ok(format!("contents of {path}"))
        }

        async fn create_comment(&self, _body: &str) -> Result<String, FetchError> {
            self.write()
        }

        async fn update_or_create_comment(&self, _body: &str) -> Result<String, FetchError> {
            self.write()
        }

        async fn delete_main_comment(&self) -> Result<bool, FetchError> {
            self.write().map(|_| true)
        }

        async fn create_inline_comment(&self, _c: &InlineComment) -> Result<String, FetchError> {
            self.write()
        }

        async fn update_inline_comment(&self, _id: u64, _body: &str) -> Result<String, FetchError> {
            self.write()
        }

        async fn delete_inline_comment(&self, _id: u64) -> Result<bool, FetchError> {
            self.write().map(|_| true)
        }

        async fn list_inline_comments(&self) -> Result<Vec<InlineCommentRecord>, FetchError> {
            Ok(vec![InlineCommentRecord {
                id: 1,
                path: "src/lib.rs".into(),
                line: Some(3),
                body: "nit".into(),
            }])
        }

        fn supports_commenting(&self) -> bool {
            true
        }

        fn supports_inline_comments(&self) -> bool {
            true
        }

        async fn update_status(&self, _status: &StatusUpdate) -> Result<bool, FetchError> {
            self.write().map(|_| true)
        }

        fn file_links(&self, paths: &[String]) -> String {
            paths
                .iter()
                .map(|p| format!("[{p}](https://github.com/acme/app/blob/main/{p})"))
                .collect::<Vec<_>>()
                .join(", ")
        }

        async fn review_surface_representation(&self) -> Result<Value, FetchError> {
            Ok(json!({ "pr": { "number": 1 } }))
        }

        async fn source_control_representation(&self) -> Result<Value, FetchError> {
            Ok(json!({ "modified_files": ["src/lib.rs"] }))
        }
    }

    fn issue_comment_event() -> Value {
        json!({
            "action": "created",
            "issue": { "number": 4 },
            "comment": { "body": "hi" },
            "repository": { "full_name": "acme/app" }
        })
    }

    #[test]
    fn pr_with_handle_is_full() {
        let handle: Arc<dyn ReviewPlatform> = Arc::new(RecordingPlatform::default());
        let adaptor = PlatformAdaptor::for_event(RunType::Pr, Some(handle), json!({}));
        assert!(!adaptor.is_degraded());
        assert!(adaptor.supports_commenting());
    }

    #[test]
    fn pr_without_handle_is_degraded() {
        let adaptor = PlatformAdaptor::for_event(RunType::Pr, None, json!({}));
        assert!(adaptor.is_degraded());
    }

    #[tokio::test]
    async fn full_adaptor_delegates_writes() {
        let handle = Arc::new(RecordingPlatform::default());
        let adaptor = PlatformAdaptor::for_event(RunType::Pr, Some(handle.clone()), json!({}));
        adaptor.create_comment("hello").await.unwrap();
        adaptor.delete_main_comment().await.unwrap();
        assert_eq!(handle.writes.load(Ordering::SeqCst), 2);
        assert_eq!(adaptor.list_inline_comments().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn degraded_writes_are_empty_noops() {
        let adaptor = PlatformAdaptor::for_event(RunType::Event, None, issue_comment_event());
        let inline = InlineComment {
            path: "a.rs".into(),
            line: 1,
            body: "x".into(),
        };
        let status = StatusUpdate {
            state: StatusState::Success,
            description: "ok".into(),
            target_url: None,
        };

        assert_eq!(adaptor.create_comment("x").await.unwrap(), "");
        assert_eq!(adaptor.update_or_create_comment("x").await.unwrap(), "");
        assert!(!adaptor.delete_main_comment().await.unwrap());
        assert_eq!(adaptor.create_inline_comment(&inline).await.unwrap(), "");
        assert_eq!(adaptor.update_inline_comment(1, "x").await.unwrap(), "");
        assert!(!adaptor.delete_inline_comment(1).await.unwrap());
        assert!(adaptor.list_inline_comments().await.unwrap().is_empty());
        assert!(!adaptor.update_status(&status).await.unwrap());
        assert!(!adaptor.supports_commenting());
        assert!(!adaptor.supports_inline_comments());
        assert_eq!(adaptor.get_file_contents("a.rs", None, None).await.unwrap(), "");
        assert_eq!(adaptor.source_control_representation().await.unwrap(), json!({}));
    }

    #[tokio::test]
    async fn degraded_writes_never_reach_the_handle() {
        let handle = Arc::new(RecordingPlatform::default());
        let adaptor =
            PlatformAdaptor::for_event(RunType::Event, Some(handle.clone()), issue_comment_event());
        adaptor.create_comment("x").await.unwrap();
        adaptor.update_or_create_comment("x").await.unwrap();
        assert_eq!(handle.writes.load(Ordering::SeqCst), 0);

        let contents = adaptor.get_file_contents("README.md", None, None).await.unwrap();
        assert_eq!(contents, "contents of README.md");
    }

    #[tokio::test]
    async fn degraded_surface_keeps_every_event_field() {
        let event = issue_comment_event();
        let adaptor = PlatformAdaptor::for_event(RunType::Event, None, event.clone());
        let surface = adaptor.review_surface_representation().await.unwrap();

        for (key, value) in event.as_object().unwrap() {
            assert_eq!(surface.get(key), Some(value), "missing {key}");
        }
        assert_eq!(surface["api"], Value::Null);
    }

    #[tokio::test]
    async fn degraded_surface_describes_read_only_api() {
        let handle: Arc<dyn ReviewPlatform> = Arc::new(RecordingPlatform::default());
        let adaptor =
            PlatformAdaptor::for_event(RunType::Event, Some(handle), issue_comment_event());
        let surface = adaptor.review_surface_representation().await.unwrap();
        assert_eq!(surface["api"]["platform"], "GitHub");
        assert_eq!(surface["api"]["readOnly"], true);
    }

    #[test]
    fn degraded_file_links_are_plain() {
        let adaptor = PlatformAdaptor::for_event(RunType::Event, None, json!({}));
        let paths = vec!["a.rs".to_string(), "b.rs".to_string()];
        assert_eq!(adaptor.file_links(&paths), "a.rs, b.rs");
    }
}
