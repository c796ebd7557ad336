//! GitHub-backed issue tracker.

use super::{select_issue, IssueTracker, RemoteIssue, RemoteIssueState, TrackerConnector, TrackerError};
use crate::rate_limit::ensure_core_rate_limit;
use crate::repo_ref::RepoRef;
use async_trait::async_trait;
use octocrab::models::issues::Issue;
use octocrab::models::IssueState;
use octocrab::{params, Octocrab};
use tracing::{debug, info, info_span, Instrument};

/// Results per page when listing issues.
const RESULTS_PER_PAGE: u8 = 100;

/// Status GitHub answers with when an edit changes nothing it accepts.
const UNPROCESSABLE: u16 = 422;

/// Issue tracker talking to the GitHub REST API.
///
/// An empty token is a valid construction state; every call then fails with
/// [`TrackerError::Unauthorized`] without reaching the network.
#[derive(Clone)]
pub struct GithubClient {
    octocrab: Option<Octocrab>,
}

impl GithubClient {
    /// Builds a client authenticated with a personal access token.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError`] if the HTTP client can't be built.
    pub fn new(token: &str) -> Result<Self, TrackerError> {
        Self::build(token, None)
    }

    /// Builds a client against a GitHub Enterprise or other API root.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError`] if the URI is invalid or the HTTP client
    /// can't be built.
    pub fn with_base_uri(token: &str, base_uri: &str) -> Result<Self, TrackerError> {
        Self::build(token, Some(base_uri))
    }

    fn build(token: &str, base_uri: Option<&str>) -> Result<Self, TrackerError> {
        if token.is_empty() {
            return Ok(Self { octocrab: None });
        }

        let mut builder = Octocrab::builder().personal_token(token.to_string());
        if let Some(base_uri) = base_uri {
            builder = builder.base_uri(base_uri)?;
        }

        Ok(Self {
            octocrab: Some(builder.build()?),
        })
    }

    fn api(&self) -> Result<&Octocrab, TrackerError> {
        self.octocrab.as_ref().ok_or(TrackerError::Unauthorized)
    }
}

#[async_trait]
impl IssueTracker for GithubClient {
    async fn find_issue(
        &self,
        repo: &RepoRef,
        title: &str,
        known_number: Option<u64>,
    ) -> Result<Option<RemoteIssue>, TrackerError> {
        let octocrab = self.api()?;
        debug!(repo = %repo, title = %title, known_number, "Looking up issue");

        let first_page = octocrab
            .issues(&repo.owner, &repo.name)
            .list()
            .state(params::State::All)
            .per_page(RESULTS_PER_PAGE)
            .send()
            .await?;
        let issues: Vec<RemoteIssue> = octocrab
            .all_pages(first_page)
            .await?
            .into_iter()
            .map(to_remote_issue)
            .collect();

        debug!(count = issues.len(), "Listed issues");
        Ok(select_issue(&issues, title, known_number))
    }

    async fn create_issue(
        &self,
        repo: &RepoRef,
        title: &str,
        body: &str,
    ) -> Result<RemoteIssue, TrackerError> {
        let octocrab = self.api()?;
        let span = info_span!("create_issue", repo = %repo);

        async {
            ensure_core_rate_limit(octocrab).await?;
            let issue = octocrab
                .issues(&repo.owner, &repo.name)
                .create(title)
                .body(body)
                .send()
                .await?;

            info!(issue_number = issue.number, "Issue created");
            Ok(to_remote_issue(issue))
        }
        .instrument(span)
        .await
    }

    async fn update_issue(
        &self,
        repo: &RepoRef,
        issue: &RemoteIssue,
        title: &str,
        body: &str,
    ) -> Result<RemoteIssue, TrackerError> {
        let octocrab = self.api()?;
        let span = info_span!("update_issue", repo = %repo, issue_number = issue.number);

        async {
            ensure_core_rate_limit(octocrab).await?;
            let updated = octocrab
                .issues(&repo.owner, &repo.name)
                .update(issue.number)
                .title(title)
                .body(body)
                .send()
                .await?;

            info!("Issue updated");
            Ok(to_remote_issue(updated))
        }
        .instrument(span)
        .await
    }

    async fn close_issue(&self, repo: &RepoRef, issue: &RemoteIssue) -> Result<(), TrackerError> {
        let octocrab = self.api()?;
        let span = info_span!("close_issue", repo = %repo, issue_number = issue.number);

        async {
            ensure_core_rate_limit(octocrab).await?;
            let result = octocrab
                .issues(&repo.owner, &repo.name)
                .update(issue.number)
                .state(IssueState::Closed)
                .send()
                .await;

            match result.map_err(TrackerError::from) {
                Ok(_) => {
                    info!("Issue closed");
                    Ok(())
                }
                Err(TrackerError::RemoteRejected { status, message }) if status == UNPROCESSABLE => {
                    debug!(message = %message, "Close rejected as a no-op, treating as closed");
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
        .instrument(span)
        .await
    }
}

/// Connects [`GithubClient`]s with the token read on each pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct GithubConnector;

impl TrackerConnector for GithubConnector {
    type Tracker = GithubClient;

    fn connect(&self, token: &str) -> Result<GithubClient, TrackerError> {
        GithubClient::new(token)
    }
}

fn to_remote_issue(issue: Issue) -> RemoteIssue {
    let state = match issue.state {
        IssueState::Open => RemoteIssueState::Open,
        _ => RemoteIssueState::Closed,
    };

    RemoteIssue {
        number: issue.number,
        title: issue.title,
        body: issue.body.unwrap_or_default(),
        state,
        has_linked_change_request: issue.pull_request.is_some(),
        is_pull_request: issue.pull_request.is_some(),
    }
}
