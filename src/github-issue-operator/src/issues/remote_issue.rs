//! Remote issue information.

use super::RemoteIssueState;

/// The fields of a GitHub issue the controller consults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteIssue {
    /// Issue number within the repository.
    pub number: u64,

    /// Issue title.
    pub title: String,

    /// Issue body (empty when unset).
    pub body: String,

    /// Open or closed.
    pub state: RemoteIssueState,

    /// Whether the issue carries a pull request reference.
    pub has_linked_change_request: bool,

    /// The entry is a pull request listed through the issues endpoint.
    pub is_pull_request: bool,
}

impl RemoteIssue {
    /// Returns true if the issue is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == RemoteIssueState::Open
    }
}
