//! Reconcile error types and retry classification.

use crate::issues::TrackerError;
use crate::rate_limit::retry_after;
use crate::repo_ref::RepoRefError;
use crate::store::StoreError;
use std::time::Duration;
use thiserror::Error;

/// Errors that end a reconcile pass early.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The spec names no usable repository. Only a spec edit fixes this.
    #[error(transparent)]
    MalformedRepoRef(#[from] RepoRefError),

    /// Issue tracker failure.
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    /// Record store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// When a failed pass should run again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retry {
    /// Not until the record changes.
    Never,

    /// After the slow token poll interval.
    TokenPoll,

    /// After a fixed delay.
    After(Duration),

    /// After the record's exponential backoff delay.
    Backoff,
}

impl ReconcileError {
    /// Classifies the error into a retry strategy.
    #[must_use]
    pub fn retry(&self) -> Retry {
        match self {
            Self::MalformedRepoRef(_) | Self::Store(StoreError::MissingMetadata(_)) => Retry::Never,
            Self::Tracker(TrackerError::Unauthorized) => Retry::TokenPoll,
            Self::Tracker(TrackerError::RateLimited { reset_at }) => {
                Retry::After(retry_after(*reset_at))
            }
            Self::Tracker(_) | Self::Store(_) => Retry::Backoff,
        }
    }
}
