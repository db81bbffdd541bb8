//! A live GitHub pull request as a review platform.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::{FetchError, GitHubClient, SourceHost};
use crate::platform::{
    InlineComment, InlineCommentRecord, ReviewPlatform, StatusUpdate,
};

/// Hidden marker identifying the comment `update_or_create_comment` owns.
pub const MAIN_COMMENT_MARKER: &str = "<!-- relay-main-comment -->";

const STATUS_CONTEXT: &str = "Relay";
const PER_PAGE: &str = "100";

#[derive(Deserialize)]
struct IssueComment {
    id: u64,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    html_url: String,
}

#[derive(Deserialize)]
struct CreatedComment {
    #[serde(default)]
    html_url: String,
}

#[derive(Deserialize)]
struct ChangedFile {
    filename: String,
    status: String,
}

/// Review surface for one pull request.
pub struct GitHubPullRequest {
    client: GitHubClient,
    repo: String,
    number: u64,
    head_sha: String,
}

impl GitHubPullRequest {
    pub fn new(
        client: GitHubClient,
        repo: impl Into<String>,
        number: u64,
        head_sha: impl Into<String>,
    ) -> Self {
        Self {
            client,
            repo: repo.into(),
            number,
            head_sha: head_sha.into(),
        }
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        paged: bool,
    ) -> Result<T, FetchError> {
        let mut url = self.client.endpoint(path)?;
        if paged {
            url.query_pairs_mut().append_pair("per_page", PER_PAGE);
        }
        self.client
            .send_json(self.client.request(Method::GET, url))
            .await
    }

    async fn main_comment(&self) -> Result<Option<IssueComment>, FetchError> {
        let comments: Vec<IssueComment> = self
            .get_json(
                &format!("repos/{}/issues/{}/comments", self.repo, self.number),
                true,
            )
            .await?;
        Ok(comments.into_iter().find(|c| {
            c.body
                .as_deref()
                .is_some_and(|b| b.contains(MAIN_COMMENT_MARKER))
        }))
    }

    async fn post_issue_comment(&self, body: &str) -> Result<String, FetchError> {
        let url = self.client.endpoint(&format!(
            "repos/{}/issues/{}/comments",
            self.repo, self.number
        ))?;
        let created: CreatedComment = self
            .client
            .send_json(
                self.client
                    .request(Method::POST, url)
                    .json(&json!({ "body": body })),
            )
            .await?;
        Ok(created.html_url)
    }
}

fn with_marker(body: &str) -> String {
    format!("{body}\n\n{MAIN_COMMENT_MARKER}")
}

#[async_trait]
impl ReviewPlatform for GitHubPullRequest {
    fn name(&self) -> &str {
        "GitHub"
    }

    async fn get_file_contents(
        &self,
        path: &str,
        repo_slug: Option<&str>,
        git_ref: Option<&str>,
    ) -> Result<String, FetchError> {
        let repo = repo_slug.unwrap_or(&self.repo);
        let git_ref = git_ref.unwrap_or(&self.head_sha);
        self.client.file_contents(repo, path, Some(git_ref)).await
    }

    async fn create_comment(&self, body: &str) -> Result<String, FetchError> {
        self.post_issue_comment(body).await
    }

    async fn update_or_create_comment(&self, body: &str) -> Result<String, FetchError> {
        let body = with_marker(body);
        match self.main_comment().await? {
            Some(existing) => {
                debug!(repo = %self.repo, id = existing.id, "updating main comment");
                let url = self.client.endpoint(&format!(
                    "repos/{}/issues/comments/{}",
                    self.repo, existing.id
                ))?;
                let updated: CreatedComment = self
                    .client
                    .send_json(
                        self.client
                            .request(Method::PATCH, url)
                            .json(&json!({ "body": body })),
                    )
                    .await?;
                Ok(updated.html_url)
            }
            None => self.post_issue_comment(&body).await,
        }
    }

    async fn delete_main_comment(&self) -> Result<bool, FetchError> {
        let Some(existing) = self.main_comment().await? else {
            return Ok(false);
        };
        let url = self.client.endpoint(&format!(
            "repos/{}/issues/comments/{}",
            self.repo, existing.id
        ))?;
        self.client
            .send_empty(self.client.request(Method::DELETE, url))
            .await?;
        info!(repo = %self.repo, url = %existing.html_url, "deleted main comment");
        Ok(true)
    }

    async fn create_inline_comment(&self, comment: &InlineComment) -> Result<String, FetchError> {
        let url = self.client.endpoint(&format!(
            "repos/{}/pulls/{}/comments",
            self.repo, self.number
        ))?;
        let created: CreatedComment = self
            .client
            .send_json(self.client.request(Method::POST, url).json(&json!({
                "body": comment.body,
                "path": comment.path,
                "line": comment.line,
                "side": "RIGHT",
                "commit_id": self.head_sha,
            })))
            .await?;
        Ok(created.html_url)
    }

    async fn update_inline_comment(&self, id: u64, body: &str) -> Result<String, FetchError> {
        let url = self
            .client
            .endpoint(&format!("repos/{}/pulls/comments/{id}", self.repo))?;
        let updated: CreatedComment = self
            .client
            .send_json(
                self.client
                    .request(Method::PATCH, url)
                    .json(&json!({ "body": body })),
            )
            .await?;
        Ok(updated.html_url)
    }

    async fn delete_inline_comment(&self, id: u64) -> Result<bool, FetchError> {
        let url = self
            .client
            .endpoint(&format!("repos/{}/pulls/comments/{id}", self.repo))?;
        self.client
            .send_empty(self.client.request(Method::DELETE, url))
            .await?;
        Ok(true)
    }

    async fn list_inline_comments(&self) -> Result<Vec<InlineCommentRecord>, FetchError> {
        self.get_json(
            &format!("repos/{}/pulls/{}/comments", self.repo, self.number),
            true,
        )
        .await
    }

    fn supports_commenting(&self) -> bool {
        true
    }

    fn supports_inline_comments(&self) -> bool {
        true
    }

    async fn update_status(&self, status: &StatusUpdate) -> Result<bool, FetchError> {
        let url = self
            .client
            .endpoint(&format!("repos/{}/statuses/{}", self.repo, self.head_sha))?;
        self.client
            .send_empty(self.client.request(Method::POST, url).json(&json!({
                "state": status.state,
                "description": status.description,
                "target_url": status.target_url,
                "context": STATUS_CONTEXT,
            })))
            .await?;
        Ok(true)
    }

    fn file_links(&self, paths: &[String]) -> String {
        paths
            .iter()
            .map(|path| {
                format!(
                    "[{path}](https://github.com/{}/blob/{}/{path})",
                    self.repo, self.head_sha
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    async fn review_surface_representation(&self) -> Result<Value, FetchError> {
        let pr: Value = self
            .get_json(&format!("repos/{}/pulls/{}", self.repo, self.number), false)
            .await?;
        let commits: Value = self
            .get_json(
                &format!("repos/{}/pulls/{}/commits", self.repo, self.number),
                true,
            )
            .await?;
        let reviews: Value = self
            .get_json(
                &format!("repos/{}/pulls/{}/reviews", self.repo, self.number),
                true,
            )
            .await?;
        let (owner, repo) = self.repo.split_once('/').unwrap_or((&self.repo, ""));
        Ok(json!({
            "pr": pr,
            "commits": commits,
            "reviews": reviews,
            "thisPR": { "owner": owner, "repo": repo, "number": self.number },
        }))
    }

    async fn source_control_representation(&self) -> Result<Value, FetchError> {
        let files: Vec<ChangedFile> = self
            .get_json(
                &format!("repos/{}/pulls/{}/files", self.repo, self.number),
                true,
            )
            .await?;

        let mut created = Vec::new();
        let mut deleted = Vec::new();
        let mut modified = Vec::new();
        for file in files {
            match file.status.as_str() {
                "added" => created.push(file.filename),
                "removed" => deleted.push(file.filename),
                _ => modified.push(file.filename),
            }
        }
        Ok(json!({
            "created_files": created,
            "deleted_files": deleted,
            "modified_files": modified,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::StatusState;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn pull_request(server: &MockServer) -> GitHubPullRequest {
        let client =
            GitHubClient::with_api_url(reqwest::Client::new(), &server.uri(), "t0ken").unwrap();
        GitHubPullRequest::new(client, "acme/app", 7, "abc123")
    }

    #[tokio::test]
    async fn update_or_create_posts_when_no_main_comment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/app/issues/7/comments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": 1, "body": "unrelated", "html_url": "u1" }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/app/issues/7/comments"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "html_url": "new" })))
            .expect(1)
            .mount(&server)
            .await;

        let url = pull_request(&server)
            .await
            .update_or_create_comment("All good")
            .await
            .unwrap();
        assert_eq!(url, "new");
    }

    #[tokio::test]
    async fn update_or_create_edits_marked_comment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/app/issues/7/comments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": 1, "body": "unrelated", "html_url": "u1" },
                { "id": 2, "body": format!("old\n\n{MAIN_COMMENT_MARKER}"), "html_url": "u2" }
            ])))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/repos/acme/app/issues/comments/2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "html_url": "u2" })))
            .expect(1)
            .mount(&server)
            .await;

        let url = pull_request(&server)
            .await
            .update_or_create_comment("new body")
            .await
            .unwrap();
        assert_eq!(url, "u2");
    }

    #[tokio::test]
    async fn delete_main_comment_without_one_is_false() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/app/issues/7/comments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        assert!(!pull_request(&server).await.delete_main_comment().await.unwrap());
    }

    #[tokio::test]
    async fn status_is_posted_against_head_sha() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/app/statuses/abc123"))
            .and(body_partial_json(json!({ "state": "failure", "context": "Relay" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let posted = pull_request(&server)
            .await
            .update_status(&StatusUpdate {
                state: StatusState::Failure,
                description: "1 failure".into(),
                target_url: None,
            })
            .await
            .unwrap();
        assert!(posted);
    }

    #[tokio::test]
    async fn changed_files_are_partitioned() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/app/pulls/7/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "filename": "new.rs", "status": "added" },
                { "filename": "old.rs", "status": "removed" },
                { "filename": "lib.rs", "status": "modified" },
                { "filename": "moved.rs", "status": "renamed" }
            ])))
            .mount(&server)
            .await;

        let git = pull_request(&server)
            .await
            .source_control_representation()
            .await
            .unwrap();
        assert_eq!(git["created_files"], json!(["new.rs"]));
        assert_eq!(git["deleted_files"], json!(["old.rs"]));
        assert_eq!(git["modified_files"], json!(["lib.rs", "moved.rs"]));
    }

    #[tokio::test]
    async fn file_links_point_at_head() {
        let server = MockServer::start().await;
        let pr = pull_request(&server).await;
        let links = pr.file_links(&["src/lib.rs".to_string()]);
        assert_eq!(
            links,
            "[src/lib.rs](https://github.com/acme/app/blob/abc123/src/lib.rs)"
        );
    }
}
