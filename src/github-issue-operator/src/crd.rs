//! The `IssueRequest` custom resource.
//!
//! An `IssueRequest` describes one GitHub issue that should exist while the
//! resource exists. The spec is owned by whoever creates the resource; the
//! status is written only by the controller through the status subresource.

use chrono::{DateTime, Utc};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Desired state of a GitHub issue.
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[kube(
    group = "issue.core.github.io",
    version = "v1",
    kind = "IssueRequest",
    namespaced,
    status = "IssueRequestStatus",
    shortname = "ir",
    printcolumn = r#"{"name":"Issue", "type":"integer", "jsonPath":".status.remoteIssueID"}"#,
    printcolumn = r#"{"name":"Open", "type":"string", "jsonPath":".status.conditions[?(@.type==\"IssueOpen\")].status"}"#,
    printcolumn = r#"{"name":"TokenRequired", "type":"boolean", "jsonPath":".status.tokenRequired"}"#
)]
pub struct IssueRequestSpec {
    /// Repository URL in the form `https://github.com/{owner}/{repo}`.
    #[serde(rename = "repoURL")]
    #[schemars(regex(pattern = r"^https://github\.com/[^/]+/[^/]+$"))]
    pub repo_url: String,

    /// Issue title.
    #[schemars(length(min = 1))]
    pub title: String,

    /// Issue body.
    #[serde(default)]
    #[schemars(length(max = 256))]
    pub description: String,
}

/// Observed state of an `IssueRequest`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequestStatus {
    /// `IssueOpen` and `HasLinkedChangeRequest`, in that order.
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Number of the GitHub issue backing this resource.
    #[serde(rename = "remoteIssueID", default, skip_serializing_if = "Option::is_none")]
    pub remote_issue_id: Option<u64>,

    /// When the controller last synced the issue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,

    /// Set while the token secret is missing or empty.
    #[serde(default)]
    pub token_required: bool,

    /// `metadata.generation` of the spec the status was computed from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// A single observation about the remote issue.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type, e.g. `IssueOpen`.
    #[serde(rename = "type")]
    pub type_: String,

    /// Whether the condition holds.
    pub status: ConditionStatus,

    /// Machine-readable reason in CamelCase.
    pub reason: String,

    /// Human-readable message.
    pub message: String,

    /// Last time `status` flipped.
    pub last_transition_time: DateTime<Utc>,
}

/// Truth value of a [`Condition`].
#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
}

impl From<bool> for ConditionStatus {
    fn from(value: bool) -> Self {
        if value {
            Self::True
        } else {
            Self::False
        }
    }
}

impl IssueRequest {
    /// Returns the known remote issue number, treating `0` as unknown.
    #[must_use]
    pub fn remote_issue_id(&self) -> Option<u64> {
        self.status
            .as_ref()
            .and_then(|status| status.remote_issue_id)
            .filter(|number| *number > 0)
    }

    /// Returns true once deletion has been requested.
    #[must_use]
    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Returns true if the finalizer `guard` is attached.
    #[must_use]
    pub fn has_guard(&self, guard: &str) -> bool {
        self.finalizers().iter().any(|f| f == guard)
    }

    /// Returns the current status or an empty one.
    #[must_use]
    pub fn status_or_default(&self) -> IssueRequestStatus {
        self.status.clone().unwrap_or_default()
    }
}
