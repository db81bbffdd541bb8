//! Dangerfile runs.
//!
//! The pipeline decides what to run and whether it is safe to. Evaluating
//! the Dangerfile itself is delegated to a `DangerfileExecutor`.

pub mod pr;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::github::{FetchError, SourceHost};
use crate::models::event::WebhookEvent;
use crate::models::installation::Installation;
use crate::models::run::{DslType, RunConfig, RunResult, RunSettings};
use crate::platform::{PlatformAdaptor, ReviewPlatform, RunType};

pub use pr::PullRequestRunner;
use pr::DEFAULT_BRANCH_LABEL;

/// Run pipeline errors.
#[derive(Debug, Error)]
pub enum RunError {
    /// Transport failure while fetching source. Fails the delivery.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The executor could not evaluate the Dangerfile.
    #[error("Dangerfile execution failed: {0}")]
    Execution(String),
}

/// Installation context handed to the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallationContext {
    pub iid: i64,
    pub settings: Value,
}

/// Everything an executor needs to evaluate one Dangerfile.
pub struct ExecutionRequest<'a> {
    /// Dangerfile source.
    pub dangerfile: &'a str,
    /// Rule reference, used for error reporting.
    pub reference: &'a str,
    pub platform: &'a dyn ReviewPlatform,
    pub dsl_type: DslType,
    pub installation: InstallationContext,
    /// The DSL object exposed to the Dangerfile.
    pub dsl: Value,
}

/// Evaluates Dangerfiles.
#[async_trait]
pub trait DangerfileExecutor: Send + Sync {
    /// `Ok(None)` when the Dangerfile produced nothing.
    async fn execute(&self, request: ExecutionRequest<'_>) -> Result<Option<RunResult>, RunError>;
}

/// Derive run settings for `event` on `installation`.
pub fn settings_for_event(event: &WebhookEvent, installation: &Installation) -> RunSettings {
    RunSettings {
        installation_id: installation.iid,
        repo_name: event.repo_full_name().map(str::to_string),
        triggered_by_username: event.sender_login().map(str::to_string),
        commentable_id: event.commentable_id(),
        installation_settings: installation.settings.clone(),
    }
}

/// Run `run` for a raw webhook event.
///
/// Pull request events go through [`PullRequestRunner`] with the live handle
/// when there is one. Any other event runs against the degraded platform
/// with the webhook payload as its DSL.
pub async fn run_for_event(
    host: &dyn SourceHost,
    executor: &dyn DangerfileExecutor,
    run: &RunConfig,
    event: &WebhookEvent,
    installation: &Installation,
    handle: Option<Arc<dyn ReviewPlatform>>,
) -> Result<Option<RunResult>, RunError> {
    let settings = settings_for_event(event, installation);

    if event.is_pull_request() {
        match event.pull_request() {
            Some(pr) => {
                let platform =
                    PlatformAdaptor::for_event(RunType::Pr, handle, event.payload.clone());
                info!(event = %event.name, delivery = %event.delivery_id, "running pull request rules");
                return PullRequestRunner::new(host, executor)
                    .run(run, &settings, &pr, &platform)
                    .await;
            }
            None => warn!(
                event = %event.name,
                delivery = %event.delivery_id,
                "unreadable pull_request payload, running as a plain event"
            ),
        }
    }

    let platform = PlatformAdaptor::for_event(RunType::Event, handle, event.payload.clone());
    let Some(repo) = run.repo_slug.as_deref().or(settings.repo_name.as_deref()) else {
        debug!(event = %event.name, "no repository to load a Dangerfile from, skipping");
        return Ok(None);
    };

    let dangerfile = host.file_contents(repo, &run.dangerfile_path, None).await?;
    if dangerfile.is_empty() {
        return Ok(Some(RunResult::failure(format!(
            "Could not find Dangerfile at <code>{}</code> on <code>{repo}</code> on branch <code>{DEFAULT_BRANCH_LABEL}</code>",
            run.dangerfile_path
        ))));
    }

    info!(event = %event.name, delivery = %event.delivery_id, repo, "running event rules");
    let dsl = platform.review_surface_representation().await?;
    let request = ExecutionRequest {
        dangerfile: &dangerfile,
        reference: &run.reference_string,
        platform: &platform,
        dsl_type: run.dsl_type,
        installation: InstallationContext {
            iid: settings.installation_id,
            settings: settings.installation_settings.clone(),
        },
        dsl,
    };
    match executor.execute(request).await {
        Err(RunError::Execution(message)) => Ok(Some(RunResult::failure(message))),
        other => other,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    /// A source host that answers from a queue.
    #[derive(Default)]
    pub(crate) struct FakeHost {
        pub contents: Mutex<VecDeque<String>>,
        pub fetches: Mutex<Vec<(String, String, Option<String>)>>,
        pub can_write: bool,
        pub permission_checks: Mutex<Vec<(String, String)>>,
    }

    impl FakeHost {
        pub fn serving(contents: &[&str]) -> Self {
            Self {
                contents: Mutex::new(contents.iter().map(|c| c.to_string()).collect()),
                ..Default::default()
            }
        }

        pub fn fetch_count(&self) -> usize {
            self.fetches.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SourceHost for FakeHost {
        async fn file_contents(
            &self,
            repo: &str,
            path: &str,
            git_ref: Option<&str>,
        ) -> Result<String, FetchError> {
            self.fetches.lock().unwrap().push((
                repo.to_string(),
                path.to_string(),
                git_ref.map(str::to_string),
            ));
            let mut queue = self.contents.lock().unwrap();
            // The last entry repeats once the queue is drained.
            let next = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            };
            Ok(next.unwrap_or_default())
        }

        async fn can_user_write_to_repo(&self, user: &str, repo: &str) -> Result<bool, FetchError> {
            self.permission_checks
                .lock()
                .unwrap()
                .push((user.to_string(), repo.to_string()));
            Ok(self.can_write)
        }
    }

    /// Counts executions and returns a canned result.
    #[derive(Default)]
    pub(crate) struct SpyExecutor {
        pub calls: AtomicUsize,
        pub result: Option<RunResult>,
        pub fail_with: Option<String>,
        pub seen: Mutex<Vec<(String, DslType, Value)>>,
    }

    impl SpyExecutor {
        pub fn returning(result: RunResult) -> Self {
            Self {
                result: Some(result),
                ..Default::default()
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DangerfileExecutor for SpyExecutor {
        async fn execute(
            &self,
            request: ExecutionRequest<'_>,
        ) -> Result<Option<RunResult>, RunError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push((
                request.dangerfile.to_string(),
                request.dsl_type,
                request.dsl,
            ));
            if let Some(message) = &self.fail_with {
                return Err(RunError::Execution(message.clone()));
            }
            Ok(self.result.clone())
        }
    }

    fn installation() -> Installation {
        let mut installation = Installation::new("id", 42);
        installation.settings = json!({ "env_vars": ["SLACK_WEBHOOK"] });
        installation
    }

    fn event_config() -> RunConfig {
        RunConfig {
            repo_slug: Some("acme/rules".into()),
            dangerfile_path: "issues.ts".into(),
            reference_string: "acme/rules@issues.ts".into(),
            dsl_type: DslType::Import,
        }
    }

    fn issue_comment() -> WebhookEvent {
        WebhookEvent::from_delivery(
            "issue_comment",
            "d-1",
            json!({
                "action": "created",
                "installation": { "id": 42 },
                "repository": { "full_name": "acme/app" },
                "sender": { "login": "octocat" },
                "issue": { "number": 3 }
            }),
        )
    }

    #[test]
    fn settings_come_from_event_and_installation() {
        let settings = settings_for_event(&issue_comment(), &installation());
        assert_eq!(settings.installation_id, 42);
        assert_eq!(settings.repo_name.as_deref(), Some("acme/app"));
        assert_eq!(settings.triggered_by_username.as_deref(), Some("octocat"));
        assert_eq!(settings.commentable_id, Some(3));
        assert_eq!(settings.installation_settings["env_vars"][0], "SLACK_WEBHOOK");
    }

    #[tokio::test]
    async fn non_pr_event_runs_with_webhook_dsl() {
        let host = FakeHost::serving(&["schedule()"]);
        let executor = SpyExecutor::returning(RunResult::message("done"));

        let result = run_for_event(
            &host,
            &executor,
            &event_config(),
            &issue_comment(),
            &installation(),
            None,
        )
        .await
        .unwrap();

        assert_eq!(result, Some(RunResult::message("done")));
        let seen = executor.seen.lock().unwrap();
        let (source, dsl_type, dsl) = &seen[0];
        assert_eq!(source, "schedule()");
        assert_eq!(*dsl_type, DslType::Import);
        assert_eq!(dsl["issue"]["number"], 3);
        assert_eq!(
            host.fetches.lock().unwrap()[0],
            ("acme/rules".to_string(), "issues.ts".to_string(), None)
        );
    }

    #[tokio::test]
    async fn non_pr_event_without_dangerfile_fails_visibly() {
        let host = FakeHost::serving(&[""]);
        let executor = SpyExecutor::default();

        let result = run_for_event(
            &host,
            &executor,
            &event_config(),
            &issue_comment(),
            &installation(),
            None,
        )
        .await
        .unwrap()
        .unwrap();

        assert!(result.fails[0].message.contains("issues.ts"));
        assert!(result.fails[0].message.contains("acme/rules"));
        assert!(result.fails[0].message.contains("on branch <code>master</code>"));
        assert_eq!(executor.call_count(), 0);
    }

    #[tokio::test]
    async fn executor_failure_becomes_failure_result() {
        let host = FakeHost::serving(&["boom()"]);
        let executor = SpyExecutor {
            fail_with: Some("ReferenceError: boom is not defined".into()),
            ..Default::default()
        };

        let result = run_for_event(
            &host,
            &executor,
            &event_config(),
            &issue_comment(),
            &installation(),
            None,
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(result.fails[0].message, "ReferenceError: boom is not defined");
    }

    #[tokio::test]
    async fn event_without_any_repo_is_skipped() {
        let host = FakeHost::serving(&["x"]);
        let executor = SpyExecutor::default();
        let mut config = event_config();
        config.repo_slug = None;
        let event = WebhookEvent::from_delivery("installation", "d-2", json!({ "action": "created" }));

        let result = run_for_event(&host, &executor, &config, &event, &installation(), None)
            .await
            .unwrap();
        assert_eq!(result, None);
        assert_eq!(host.fetch_count(), 0);
    }

    #[tokio::test]
    async fn unreadable_pull_request_runs_as_plain_event() {
        let host = FakeHost::serving(&["check()"]);
        let executor = SpyExecutor::returning(RunResult::message("ok"));
        let event = WebhookEvent::from_delivery(
            "pull_request",
            "d-3",
            json!({
                "action": "opened",
                "installation": { "id": 42 },
                "repository": { "full_name": "acme/app" },
                "sender": { "login": "octocat" },
                "pull_request": { "number": "not a number" }
            }),
        );
        assert!(event.is_pull_request());
        assert!(event.pull_request().is_none());

        let result = run_for_event(&host, &executor, &event_config(), &event, &installation(), None)
            .await
            .unwrap();

        assert_eq!(result, Some(RunResult::message("ok")));
        assert!(host.permission_checks.lock().unwrap().is_empty());
        let seen = executor.seen.lock().unwrap();
        assert_eq!(seen[0].2["pull_request"]["number"], "not a number");
    }
}
