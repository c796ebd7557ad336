//! The reconcile state machine.
//!
//! One pass runs these steps strictly in order, stopping at the first one
//! that decides the outcome:
//!
//! 1. Fetch the record; a missing record ends the pass.
//! 2. If deletion was requested, tear down: close the remote issue, delete
//!    the record and release the finalizer.
//! 3. Attach the finalizer. No remote call happens before this succeeds.
//! 4. Resolve the token from the record's secret.
//! 5. Create or update the remote issue.
//! 6. Write the projected status. Conflicts are retried after a short delay
//!    instead of failing the pass.

mod backoff;
mod error;

pub use backoff::Backoff;
pub use error::{ReconcileError, Retry};

use crate::config::OperatorConfig;
use crate::crd::{IssueRequest, IssueRequestStatus};
use crate::guard::{ensure_guard, remove_guard};
use crate::issues::{IssueTracker, RemoteIssue, TrackerConnector, TrackerError};
use crate::repo_ref::RepoRef;
use crate::secret::{ensure_holder, read_token, TokenState};
use crate::status::{needs_write, project, with_token_required};
use crate::store::{CredentialStore, RecordKey, RecordStore, StoreError};
use crate::validation::validate_spec;
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};

/// What the scheduler should do after a successful pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Wait for the next change.
    Done,

    /// Run again immediately.
    RequeueNow,

    /// Run again after a delay.
    RequeueAfter(Duration),
}

/// Result of a conditional status write.
enum StatusWrite {
    Written(Box<IssueRequest>),
    Conflict,
}

/// Drives records toward their desired remote issue state.
pub struct Reconciler<S, C> {
    store: S,
    connector: C,
    config: OperatorConfig,
}

impl<S, C> Reconciler<S, C>
where
    S: RecordStore + CredentialStore,
    C: TrackerConnector,
{
    /// Creates a reconciler over a store and a tracker connector.
    pub fn new(store: S, connector: C, config: OperatorConfig) -> Self {
        Self {
            store,
            connector,
            config,
        }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the operator configuration.
    pub fn config(&self) -> &OperatorConfig {
        &self.config
    }

    /// Runs one reconcile pass for the record identified by `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError`] for failures the scheduler must retry (or,
    /// for a malformed repository, give up on). Status write conflicts are
    /// not errors; they yield [`Outcome::RequeueAfter`].
    pub async fn reconcile(&self, key: &RecordKey) -> Result<Outcome, ReconcileError> {
        let span = info_span!("reconcile", record = %key);

        async {
            info!("Reconciling IssueRequest");

            let Some(record) = self.store.get(key).await? else {
                info!("IssueRequest is gone, nothing to do");
                return Ok(Outcome::Done);
            };

            if record.is_deleting() {
                return self.teardown(key, &record).await;
            }

            self.apply(key, record).await
        }
        .instrument(span)
        .await
    }

    async fn apply(&self, key: &RecordKey, record: IssueRequest) -> Result<Outcome, ReconcileError> {
        let record = match ensure_guard(&self.store, &record, &self.config.guard_token).await {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Unable to add finalizer, retrying");
                return Ok(Outcome::RequeueNow);
            }
        };

        let token = match read_token(&self.store, key).await? {
            TokenState::NotFound => {
                ensure_holder(&self.store, &record).await?;
                return self
                    .mark_token_required(&record, true, Outcome::RequeueNow)
                    .await;
            }
            TokenState::Empty => {
                info!("GitHub token missing in secret, waiting for it");
                let poll = Outcome::RequeueAfter(self.config.token_poll_interval());
                return self.mark_token_required(&record, true, poll).await;
            }
            TokenState::Ready(token) => token,
        };

        let record = match with_token_required(&record, false) {
            None => record,
            Some(status) => match self.write_status(&record, &status).await? {
                StatusWrite::Written(updated) => *updated,
                StatusWrite::Conflict => return Ok(self.conflict_retry()),
            },
        };

        if let Err(violations) = validate_spec(&record.spec) {
            let violations: Vec<String> = violations.iter().map(ToString::to_string).collect();
            warn!(violations = %violations.join("; "), "Spec violates admission rules");
        }

        let repo = RepoRef::parse(&record.spec.repo_url)?;
        let tracker = self.connector.connect(&token)?;
        let issue = sync_issue(&tracker, &repo, &record).await?;

        let status = project(&record, &issue, Utc::now());
        if !needs_write(record.status.as_ref(), &status) {
            debug!(issue_number = issue.number, "Status already up to date");
            return Ok(Outcome::Done);
        }

        match self.write_status(&record, &status).await? {
            StatusWrite::Written(_) => {
                info!(issue_number = issue.number, "Status updated");
                Ok(Outcome::Done)
            }
            StatusWrite::Conflict => Ok(self.conflict_retry()),
        }
    }

    async fn teardown(&self, key: &RecordKey, record: &IssueRequest) -> Result<Outcome, ReconcileError> {
        let guard = &self.config.guard_token;
        if !record.has_guard(guard) {
            debug!("Deletion pending on other finalizers only");
            return Ok(Outcome::Done);
        }

        info!("IssueRequest marked for deletion, cleaning up");
        if let Some(wait) = self.close_remote_issue(key, record).await? {
            return Ok(wait);
        }

        self.store.delete(key).await?;
        remove_guard(&self.store, key, guard).await?;

        info!("Cleanup finished, finalizer released");
        Ok(Outcome::Done)
    }

    /// Closes the record's remote issue if it is still open.
    ///
    /// Returns an outcome when teardown has to wait for a token.
    async fn close_remote_issue(
        &self,
        key: &RecordKey,
        record: &IssueRequest,
    ) -> Result<Option<Outcome>, ReconcileError> {
        let known = record.remote_issue_id();

        let repo = match RepoRef::parse(&record.spec.repo_url) {
            Ok(repo) => repo,
            Err(e) if known.is_none() => {
                warn!(error = %e, "No issue recorded and repository unparseable, skipping remote cleanup");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let token = match read_token(&self.store, key).await? {
            TokenState::Ready(token) => token,
            state if known.is_none() => {
                info!(token = ?state, "No issue recorded and no token, skipping remote cleanup");
                return Ok(None);
            }
            _ => {
                info!("GitHub token missing, waiting for it before closing the issue");
                return Ok(Some(Outcome::RequeueAfter(self.config.token_poll_interval())));
            }
        };

        let tracker = self.connector.connect(&token)?;
        match tracker.find_issue(&repo, &record.spec.title, known).await? {
            Some(issue) if issue.is_open() => {
                tracker.close_issue(&repo, &issue).await?;
                info!(issue_number = issue.number, "Closed issue");
            }
            Some(issue) => debug!(issue_number = issue.number, "Issue already closed"),
            None => debug!("No issue found, nothing to close"),
        }

        Ok(None)
    }

    async fn mark_token_required(
        &self,
        record: &IssueRequest,
        required: bool,
        then: Outcome,
    ) -> Result<Outcome, ReconcileError> {
        let Some(status) = with_token_required(record, required) else {
            return Ok(then);
        };

        match self.write_status(record, &status).await? {
            StatusWrite::Written(_) => {
                info!(token_required = required, "Token status updated");
                Ok(then)
            }
            StatusWrite::Conflict => Ok(self.conflict_retry()),
        }
    }

    async fn write_status(
        &self,
        record: &IssueRequest,
        status: &IssueRequestStatus,
    ) -> Result<StatusWrite, StoreError> {
        match self.store.update_status(record, status).await {
            Ok(updated) => Ok(StatusWrite::Written(Box::new(updated))),
            Err(e) if e.is_conflict() => {
                info!(error = %e, "Conflict occurred, requeueing");
                Ok(StatusWrite::Conflict)
            }
            Err(e) => Err(e),
        }
    }

    fn conflict_retry(&self) -> Outcome {
        Outcome::RequeueAfter(self.config.conflict_retry())
    }
}

/// Creates the record's issue, or updates it if it already exists.
///
/// An issue whose title and body already match is returned as found.
///
/// # Errors
///
/// Returns [`TrackerError`] if any remote call fails.
pub async fn sync_issue<T>(
    tracker: &T,
    repo: &RepoRef,
    record: &IssueRequest,
) -> Result<RemoteIssue, TrackerError>
where
    T: IssueTracker + ?Sized,
{
    let spec = &record.spec;

    match tracker
        .find_issue(repo, &spec.title, record.remote_issue_id())
        .await?
    {
        None => {
            info!(repo = %repo, "No existing issue, creating one");
            tracker
                .create_issue(repo, &spec.title, &spec.description)
                .await
        }
        Some(existing) if existing.title == spec.title && existing.body == spec.description => {
            debug!(issue_number = existing.number, "Issue already up to date");
            Ok(existing)
        }
        Some(existing) => {
            debug!(issue_number = existing.number, "Found existing issue, updating");
            tracker
                .update_issue(repo, &existing, &spec.title, &spec.description)
                .await
        }
    }
}
