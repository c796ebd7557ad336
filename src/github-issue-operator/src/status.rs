//! Status projection from the remote issue.

use crate::crd::{Condition, ConditionStatus, IssueRequest, IssueRequestStatus};
use crate::issues::RemoteIssue;
use chrono::{DateTime, Utc};
use tracing::warn;

/// Condition type tracking whether the remote issue is open.
pub const ISSUE_OPEN: &str = "IssueOpen";

/// Condition type tracking whether the remote issue has a pull request.
pub const HAS_LINKED_CHANGE_REQUEST: &str = "HasLinkedChangeRequest";

/// Derives the status of `record` after syncing `issue`.
///
/// Everything not derived from the issue (token flag) is carried over from
/// the current status. A condition keeps its transition time unless its
/// truth value changed. Once a non-zero issue number is recorded it is
/// never replaced.
#[must_use]
pub fn project(record: &IssueRequest, issue: &RemoteIssue, now: DateTime<Utc>) -> IssueRequestStatus {
    let previous = record.status_or_default();

    let conditions = vec![
        carry_transition(&previous.conditions, issue_open_condition(issue, now)),
        carry_transition(&previous.conditions, linked_change_condition(issue, now)),
    ];

    let remote_issue_id = match record.remote_issue_id() {
        Some(known) if known != issue.number => {
            warn!(
                known,
                found = issue.number,
                "Synced issue differs from the recorded one, keeping recorded number"
            );
            known
        }
        _ => issue.number,
    };

    IssueRequestStatus {
        conditions,
        remote_issue_id: Some(remote_issue_id),
        last_updated: Some(now),
        token_required: previous.token_required,
        observed_generation: record.metadata.generation,
    }
}

/// Returns the status with `token_required` set, or `None` if unchanged.
#[must_use]
pub fn with_token_required(record: &IssueRequest, required: bool) -> Option<IssueRequestStatus> {
    let status = record.status_or_default();
    (status.token_required != required).then(|| IssueRequestStatus {
        token_required: required,
        ..status
    })
}

/// Returns true if `next` differs from `current` in more than timestamps.
///
/// Skipping timestamp-only writes keeps the controller from re-triggering
/// itself through its own status updates.
#[must_use]
pub fn needs_write(current: Option<&IssueRequestStatus>, next: &IssueRequestStatus) -> bool {
    let Some(current) = current else {
        return true;
    };
    let strip = |status: &IssueRequestStatus| IssueRequestStatus {
        last_updated: None,
        ..status.clone()
    };
    strip(current) != strip(next)
}

fn issue_open_condition(issue: &RemoteIssue, now: DateTime<Utc>) -> Condition {
    let (reason, message) = if issue.is_open() {
        ("IssueIsOpen", format!("Issue #{} is currently open", issue.number))
    } else {
        ("IssueIsClosed", format!("Issue #{} is closed", issue.number))
    };
    condition(ISSUE_OPEN, issue.is_open(), reason, message, now)
}

fn linked_change_condition(issue: &RemoteIssue, now: DateTime<Utc>) -> Condition {
    let linked = issue.has_linked_change_request;
    let (reason, message) = if linked {
        (
            "PullRequestExists",
            format!("Issue #{} has an associated pull request", issue.number),
        )
    } else {
        (
            "NoPullRequest",
            format!("Issue #{} does not have an associated pull request", issue.number),
        )
    };
    condition(HAS_LINKED_CHANGE_REQUEST, linked, reason, message, now)
}

fn condition(
    type_: &str,
    value: bool,
    reason: &str,
    message: String,
    now: DateTime<Utc>,
) -> Condition {
    Condition {
        type_: type_.to_string(),
        status: ConditionStatus::from(value),
        reason: reason.to_string(),
        message,
        last_transition_time: now,
    }
}

fn carry_transition(previous: &[Condition], mut next: Condition) -> Condition {
    if let Some(old) = previous
        .iter()
        .find(|old| old.type_ == next.type_ && old.status == next.status)
    {
        next.last_transition_time = old.last_transition_time;
    }
    next
}
