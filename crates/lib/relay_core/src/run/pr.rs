//! The pull request run pipeline.
//!
//! Stages, each of which can end the run:
//!
//! 1. Preconditions: repo name, triggering user and head repo must be known.
//! 2. Resolve where the Dangerfile lives and fetch it.
//! 3. Missing Dangerfile: report a failure with the pipeline state.
//! 4. Tamper gate: a changed Dangerfile only runs for users with write access.
//! 5. Execute.
//! 6. Append the pipeline state when the PR body asks for it.

use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};

use super::{DangerfileExecutor, ExecutionRequest, InstallationContext, RunError};
use crate::github::SourceHost;
use crate::models::event::PullRequest;
use crate::models::run::{RunConfig, RunResult, RunSettings, Violation};
use crate::platform::{PlatformAdaptor, ReviewPlatform};

/// Literal in a PR body that turns on the state dump.
pub const DEBUG_MARKER: &str = "Relay: Debug";

/// Shown instead of running a Dangerfile changed by a non-writer.
pub const TAMPER_MESSAGE: &str =
    "Not running Danger rules due to user with no write access changing the Dangerfile.";

pub(crate) const DEFAULT_BRANCH_LABEL: &str = "master";

/// Pipeline state included in diagnostics.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunState<'a> {
    branch: Option<&'a str>,
    dangerfile_branch_for_pr: &'a str,
    needed_dangerfile_is_local_repo: bool,
    repo_for_dangerfile: &'a str,
    run: &'a RunConfig,
    settings: &'a RunSettings,
}

impl RunState<'_> {
    fn report(&self, reason: &str) -> String {
        let state = serde_json::to_string_pretty(self).unwrap_or_default();
        format!("{reason}\n\n## Full state of PR run:\n\n```json\n{state}\n```\n")
    }
}

/// Runs a Dangerfile against one pull request.
pub struct PullRequestRunner<'a> {
    host: &'a dyn SourceHost,
    executor: &'a dyn DangerfileExecutor,
}

impl<'a> PullRequestRunner<'a> {
    pub fn new(host: &'a dyn SourceHost, executor: &'a dyn DangerfileExecutor) -> Self {
        Self { host, executor }
    }

    /// Run `run` for `pr`.
    ///
    /// `Ok(None)` means the run was skipped or produced nothing. Only fetch
    /// failures are returned as errors; every other problem is reported in
    /// the result.
    pub async fn run(
        &self,
        run: &RunConfig,
        settings: &RunSettings,
        pr: &PullRequest,
        platform: &PlatformAdaptor,
    ) -> Result<Option<RunResult>, RunError> {
        let Some(repo_name) = settings.repo_name.as_deref() else {
            error!(reference = %run.reference_string, "pull request run without a repo name");
            return Ok(None);
        };
        let Some(username) = settings.triggered_by_username.as_deref() else {
            error!(repo = repo_name, "pull request run without a triggering user");
            return Ok(None);
        };
        let Some(head_repo) = pr.head.repo.as_ref().map(|r| r.full_name.as_str()) else {
            error!(repo = repo_name, pr = pr.number, "pull request run without a head repo");
            return Ok(None);
        };

        let needed_dangerfile_is_local_repo = run.repo_slug.is_none();
        let branch = needed_dangerfile_is_local_repo.then_some(pr.head.git_ref.as_str());
        let repo_for_dangerfile = run.repo_slug.as_deref().unwrap_or(head_repo);

        // Base and head both read the resolved branch, so they only differ if
        // the file changes between the two reads.
        let base_dangerfile = self
            .host
            .file_contents(repo_for_dangerfile, &run.dangerfile_path, branch)
            .await?;
        let head_dangerfile = self
            .host
            .file_contents(repo_for_dangerfile, &run.dangerfile_path, branch)
            .await?;

        let state = RunState {
            branch,
            dangerfile_branch_for_pr: &pr.head.git_ref,
            needed_dangerfile_is_local_repo,
            repo_for_dangerfile,
            run,
            settings,
        };

        if head_dangerfile.is_empty() {
            let message = format!(
                "Could not find Dangerfile at <code>{}</code> on <code>{repo_for_dangerfile}</code> on branch <code>{}</code>",
                run.dangerfile_path,
                branch.unwrap_or(DEFAULT_BRANCH_LABEL),
            );
            warn!(repo = repo_for_dangerfile, path = %run.dangerfile_path, "Dangerfile not found");
            return Ok(Some(RunResult::failure(state.report(&message))));
        }

        if !base_dangerfile.is_empty() && base_dangerfile != head_dangerfile {
            let can_write = self.host.can_user_write_to_repo(username, head_repo).await?;
            if !can_write {
                info!(user = username, repo = head_repo, "Dangerfile changed by a non-writer, not running");
                return Ok(Some(RunResult::message(TAMPER_MESSAGE)));
            }
        }

        let dsl = json!({
            "github": platform.review_surface_representation().await?,
            "git": platform.source_control_representation().await?,
        });
        let request = ExecutionRequest {
            dangerfile: &head_dangerfile,
            reference: &run.reference_string,
            platform,
            dsl_type: run.dsl_type,
            installation: InstallationContext {
                iid: settings.installation_id,
                settings: settings.installation_settings.clone(),
            },
            dsl,
        };

        let result = match self.executor.execute(request).await {
            Ok(result) => result,
            Err(RunError::Execution(message)) => {
                warn!(reference = %run.reference_string, %message, "Dangerfile execution failed");
                Some(RunResult::failure(state.report(&message)))
            }
            Err(err) => return Err(err),
        };

        Ok(result.map(|mut result| {
            if pr.body.as_deref().is_some_and(|b| b.contains(DEBUG_MARKER)) {
                let reason = format!("Showing PR details due to including '{DEBUG_MARKER}'");
                result.markdowns.push(Violation::new(state.report(&reason)));
            }
            result
        }))
    }
}
