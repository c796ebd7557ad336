//! Kubernetes API server implementation of the stores.

use super::{CredentialHolder, CredentialStore, RecordKey, RecordStore, StoreError};
use crate::crd::{IssueRequest, IssueRequestStatus};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, DeleteParams, ObjectMeta, Patch, PatchParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::debug;

/// Key of the token inside the holder secret.
pub const TOKEN_KEY: &str = "token";

/// Field manager recorded on every write.
const FIELD_MANAGER: &str = "github-issue-operator";

const NOT_FOUND: u16 = 404;
const ALREADY_EXISTS: u16 = 409;

/// Stores backed by a Kubernetes client.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    /// Wraps a Kubernetes client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn records(&self, namespace: &str) -> Api<IssueRequest> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn patch_params() -> PatchParams {
        PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        }
    }
}

fn resource_version(record: &IssueRequest) -> Result<String, StoreError> {
    record
        .resource_version()
        .ok_or(StoreError::MissingMetadata("metadata.resourceVersion"))
}

#[async_trait]
impl RecordStore for KubeStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<IssueRequest>, StoreError> {
        Ok(self.records(&key.namespace).get_opt(&key.name).await?)
    }

    async fn replace_guards(
        &self,
        record: &IssueRequest,
        guards: Vec<String>,
    ) -> Result<IssueRequest, StoreError> {
        let key = RecordKey::of(record)?;
        let patch = json!({
            "metadata": {
                "finalizers": guards,
                "resourceVersion": resource_version(record)?,
            }
        });

        debug!(record = %key, "Patching finalizers");
        Ok(self
            .records(&key.namespace)
            .patch(&key.name, &Self::patch_params(), &Patch::Merge(&patch))
            .await?)
    }

    async fn update_status(
        &self,
        record: &IssueRequest,
        status: &IssueRequestStatus,
    ) -> Result<IssueRequest, StoreError> {
        let key = RecordKey::of(record)?;
        let patch = json!({
            "metadata": { "resourceVersion": resource_version(record)? },
            "status": status,
        });

        debug!(record = %key, "Patching status");
        Ok(self
            .records(&key.namespace)
            .patch_status(&key.name, &Self::patch_params(), &Patch::Merge(&patch))
            .await?)
    }

    async fn delete(&self, key: &RecordKey) -> Result<(), StoreError> {
        match self
            .records(&key.namespace)
            .delete(&key.name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(response)) if response.code == NOT_FOUND => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl CredentialStore for KubeStore {
    async fn get_holder(&self, key: &RecordKey) -> Result<Option<CredentialHolder>, StoreError> {
        let secret = self
            .secrets(&key.namespace)
            .get_opt(&key.holder_name())
            .await?;
        Ok(secret.map(|secret| CredentialHolder {
            token: token_of(&secret),
        }))
    }

    async fn create_holder(&self, owner: &IssueRequest) -> Result<bool, StoreError> {
        let key = RecordKey::of(owner)?;
        let secret = empty_holder(owner, &key)?;
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };

        match self.secrets(&key.namespace).create(&params, &secret).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(response)) if response.code == ALREADY_EXISTS => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Builds the empty token secret, owned by the record so it is garbage
/// collected with it.
fn empty_holder(owner: &IssueRequest, key: &RecordKey) -> Result<Secret, StoreError> {
    let owner_ref = owner
        .controller_owner_ref(&())
        .ok_or(StoreError::MissingMetadata("metadata.uid"))?;

    Ok(Secret {
        metadata: ObjectMeta {
            name: Some(key.holder_name()),
            namespace: owner.namespace(),
            owner_references: Some(vec![owner_ref]),
            ..Default::default()
        },
        string_data: Some(BTreeMap::from([(TOKEN_KEY.to_string(), String::new())])),
        ..Default::default()
    })
}

fn token_of(secret: &Secret) -> String {
    let from_data = secret
        .data
        .as_ref()
        .and_then(|data| data.get(TOKEN_KEY))
        .map(|bytes| String::from_utf8_lossy(&bytes.0).into_owned());
    let from_string_data = || {
        secret
            .string_data
            .as_ref()
            .and_then(|data| data.get(TOKEN_KEY))
            .cloned()
    };

    from_data
        .or_else(from_string_data)
        .map(|token| token.trim().to_string())
        .unwrap_or_default()
}
