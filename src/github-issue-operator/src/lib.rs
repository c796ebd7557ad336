#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

pub mod config;
pub mod controller;
pub mod crd;
pub mod guard;
pub mod issues;
pub mod rate_limit;
pub mod reconcile;
pub mod repo_ref;
pub mod secret;
pub mod status;
pub mod store;
pub mod validation;

pub use config::{load_config, ConfigError, OperatorConfig};
pub use controller::{run, ControllerError};
pub use crd::{Condition, ConditionStatus, IssueRequest, IssueRequestSpec, IssueRequestStatus};
pub use guard::{ensure_guard, remove_guard};
pub use issues::{
    select_issue, GithubClient, GithubConnector, IssueTracker, RemoteIssue, RemoteIssueState,
    TrackerConnector, TrackerError,
};
pub use reconcile::{sync_issue, Backoff, Outcome, ReconcileError, Reconciler, Retry};
pub use repo_ref::{RepoRef, RepoRefError};
pub use secret::{ensure_holder, read_token, TokenState};
pub use status::{needs_write, project, with_token_required};
pub use store::{CredentialHolder, CredentialStore, KubeStore, RecordKey, RecordStore, StoreError};
pub use validation::{validate_spec, FieldViolation};
