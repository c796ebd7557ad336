//! Store error types.

use thiserror::Error;

/// HTTP status the API server answers a stale `resourceVersion` with.
const CONFLICT: u16 = 409;

/// Errors that can occur while reading or writing the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The write was based on a stale version of the object.
    #[error("Write conflict: {message}")]
    Conflict { message: String },

    /// An object lacks metadata the controller needs.
    #[error("Object is missing {0}")]
    MissingMetadata(&'static str),

    /// Any other API server failure.
    #[error("Kubernetes API error: {0}")]
    Kube(#[source] kube::Error),
}

impl StoreError {
    /// Returns true for optimistic concurrency failures.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<kube::Error> for StoreError {
    fn from(error: kube::Error) -> Self {
        match error {
            kube::Error::Api(response) if response.code == CONFLICT => Self::Conflict {
                message: response.message,
            },
            other => Self::Kube(other),
        }
    }
}
