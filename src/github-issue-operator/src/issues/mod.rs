//! Remote issue tracking.
//!
//! The controller only needs four operations from the tracker: find, create,
//! update and close. [`IssueTracker`] is that seam; [`GithubClient`] is the
//! implementation backed by the GitHub REST API.

mod error;
mod github;
mod remote_issue;
mod status;

pub use error::TrackerError;
pub use github::{GithubClient, GithubConnector};
pub use remote_issue::RemoteIssue;
pub use status::RemoteIssueState;

use crate::repo_ref::RepoRef;
use async_trait::async_trait;

/// Operations the controller performs against the issue tracker.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Finds the issue backing a record.
    ///
    /// A known number takes precedence over a title match, so a different
    /// issue sharing the title never shadows the one already tracked.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError`] if listing issues fails.
    async fn find_issue(
        &self,
        repo: &RepoRef,
        title: &str,
        known_number: Option<u64>,
    ) -> Result<Option<RemoteIssue>, TrackerError>;

    /// Creates a new open issue.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError`] if the issue can't be created.
    async fn create_issue(
        &self,
        repo: &RepoRef,
        title: &str,
        body: &str,
    ) -> Result<RemoteIssue, TrackerError>;

    /// Sets the title and body of an existing issue.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError`] if the update fails.
    async fn update_issue(
        &self,
        repo: &RepoRef,
        issue: &RemoteIssue,
        title: &str,
        body: &str,
    ) -> Result<RemoteIssue, TrackerError>;

    /// Closes an issue. Closing an already closed issue succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError`] if the issue can't be closed.
    async fn close_issue(&self, repo: &RepoRef, issue: &RemoteIssue) -> Result<(), TrackerError>;
}

/// Builds an [`IssueTracker`] from a bearer token.
///
/// A tracker is built on every reconcile pass so token rotation takes effect
/// without a restart.
pub trait TrackerConnector: Send + Sync {
    type Tracker: IssueTracker;

    /// Creates a tracker authenticated with `token`.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError`] if the underlying client can't be built.
    fn connect(&self, token: &str) -> Result<Self::Tracker, TrackerError>;
}

/// Picks the issue matching `known_number`, else the first issue titled `title`.
///
/// The issues endpoint also lists pull requests. Those are only reachable
/// through `known_number`; a title match never adopts one.
pub fn select_issue<'a, I>(issues: I, title: &str, known_number: Option<u64>) -> Option<RemoteIssue>
where
    I: IntoIterator<Item = &'a RemoteIssue>,
    I::IntoIter: Clone,
{
    let issues = issues.into_iter();

    let by_number = known_number
        .filter(|number| *number > 0)
        .and_then(|number| issues.clone().find(|issue| issue.number == number));

    by_number
        .or_else(|| {
            issues
                .clone()
                .find(|issue| !issue.is_pull_request && issue.title == title)
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(number: u64, title: &str) -> RemoteIssue {
        RemoteIssue {
            number,
            title: title.to_string(),
            body: String::new(),
            state: RemoteIssueState::Open,
            has_linked_change_request: false,
            is_pull_request: false,
        }
    }

    fn pull_request(number: u64, title: &str) -> RemoteIssue {
        RemoteIssue {
            state: RemoteIssueState::Closed,
            has_linked_change_request: true,
            is_pull_request: true,
            ..issue(number, title)
        }
    }

    #[test]
    fn test_matches_by_title() {
        let issues = [issue(1, "Other"), issue(2, "Wanted")];
        let found = select_issue(&issues, "Wanted", None).unwrap();
        assert_eq!(found.number, 2);
    }

    #[test]
    fn test_number_takes_precedence_over_title() {
        let issues = [issue(7, "Wanted"), issue(42, "Renamed")];
        let found = select_issue(&issues, "Wanted", Some(42)).unwrap();
        assert_eq!(found.number, 42);
    }

    #[test]
    fn test_falls_back_to_title_when_number_missing() {
        let issues = [issue(7, "Wanted")];
        let found = select_issue(&issues, "Wanted", Some(42)).unwrap();
        assert_eq!(found.number, 7);
    }

    #[test]
    fn test_zero_number_is_ignored() {
        let issues = [issue(0, "Zero"), issue(3, "Wanted")];
        let found = select_issue(&issues, "Wanted", Some(0)).unwrap();
        assert_eq!(found.number, 3);
    }

    #[test]
    fn test_no_match_returns_none() {
        let issues = [issue(1, "Other")];
        assert!(select_issue(&issues, "Wanted", Some(5)).is_none());
    }

    #[test]
    fn test_title_match_skips_pull_requests() {
        assert!(select_issue(&[pull_request(7, "Wanted")], "Wanted", None).is_none());

        let issues = [pull_request(7, "Wanted"), issue(9, "Wanted")];
        let found = select_issue(&issues, "Wanted", None).unwrap();
        assert_eq!(found.number, 9);
    }

    #[test]
    fn test_known_number_reaches_pull_request() {
        let issues = [pull_request(7, "Wanted")];
        let found = select_issue(&issues, "Other", Some(7)).unwrap();
        assert_eq!(found.number, 7);
    }
}
