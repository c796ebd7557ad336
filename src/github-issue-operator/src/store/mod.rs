//! Record and credential storage.
//!
//! The reconcile state machine only sees the [`RecordStore`] and
//! [`CredentialStore`] traits. [`KubeStore`] implements both against the
//! Kubernetes API server.

mod error;
mod kube_store;

pub use error::StoreError;
pub use kube_store::KubeStore;

use crate::crd::{IssueRequest, IssueRequestStatus};
use async_trait::async_trait;
use kube::ResourceExt;
use std::fmt;

/// Namespace and name of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub namespace: String,
    pub name: String,
}

impl RecordKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Reads the key of a record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MissingMetadata`] for records without a
    /// namespace or name.
    pub fn of(record: &IssueRequest) -> Result<Self, StoreError> {
        let namespace = record
            .namespace()
            .ok_or(StoreError::MissingMetadata("metadata.namespace"))?;
        let name = record
            .metadata
            .name
            .clone()
            .ok_or(StoreError::MissingMetadata("metadata.name"))?;
        Ok(Self { namespace, name })
    }

    /// Name of the secret holding this record's token.
    #[must_use]
    pub fn holder_name(&self) -> String {
        format!("{}-token-secret", self.name)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Contents of a record's token secret.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialHolder {
    /// Bearer token, possibly empty.
    pub token: String,
}

/// Access to `IssueRequest` records.
///
/// Every write carries the `resourceVersion` of the record it was computed
/// from and fails with [`StoreError::Conflict`] if the record moved on.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Loads a record, returning `None` once it is gone.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    async fn get(&self, key: &RecordKey) -> Result<Option<IssueRequest>, StoreError>;

    /// Replaces the finalizer list and returns the updated record.
    ///
    /// Only `metadata.finalizers` is written; concurrent edits to other
    /// fields survive.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    async fn replace_guards(
        &self,
        record: &IssueRequest,
        guards: Vec<String>,
    ) -> Result<IssueRequest, StoreError>;

    /// Writes the status subresource and returns the updated record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    async fn update_status(
        &self,
        record: &IssueRequest,
        status: &IssueRequestStatus,
    ) -> Result<IssueRequest, StoreError>;

    /// Requests deletion of a record. Deleting a missing record succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the request fails.
    async fn delete(&self, key: &RecordKey) -> Result<(), StoreError>;
}

/// Access to per-record token secrets.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Loads the holder for a record, returning `None` if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    async fn get_holder(&self, key: &RecordKey) -> Result<Option<CredentialHolder>, StoreError>;

    /// Creates an empty holder owned by `owner`.
    ///
    /// Returns `false` without touching anything if a holder already exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the create fails.
    async fn create_holder(&self, owner: &IssueRequest) -> Result<bool, StoreError>;
}
