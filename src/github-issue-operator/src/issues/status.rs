//! Remote issue state.

/// Open/closed state of a remote issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteIssueState {
    /// Issue is open.
    Open,

    /// Issue is closed.
    Closed,
}
