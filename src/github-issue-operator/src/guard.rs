//! Deletion guard (finalizer) handling.
//!
//! While the guard is attached, deleting a record only sets its deletion
//! timestamp; the store erases it once the guard is removed. Both writes
//! touch only the finalizer list and are conditional on the record version.

use crate::crd::IssueRequest;
use crate::store::{RecordKey, RecordStore, StoreError};
use kube::ResourceExt;
use tracing::{debug, info};

/// Attaches `guard` to the record if missing.
///
/// Returns the record as stored after the call.
///
/// # Errors
///
/// Returns [`StoreError`] if the write fails, including conflicts.
pub async fn ensure_guard<S>(
    store: &S,
    record: &IssueRequest,
    guard: &str,
) -> Result<IssueRequest, StoreError>
where
    S: RecordStore + ?Sized,
{
    if record.has_guard(guard) {
        debug!(guard, "Finalizer already present");
        return Ok(record.clone());
    }

    let mut guards = record.finalizers().to_vec();
    guards.push(guard.to_string());

    let updated = store.replace_guards(record, guards).await?;
    info!(guard, "Finalizer added");
    Ok(updated)
}

/// Detaches `guard` from the latest version of the record if present.
///
/// # Errors
///
/// Returns [`StoreError`] if the read or write fails.
pub async fn remove_guard<S>(store: &S, key: &RecordKey, guard: &str) -> Result<(), StoreError>
where
    S: RecordStore + ?Sized,
{
    let Some(record) = store.get(key).await? else {
        debug!("Record already erased");
        return Ok(());
    };
    if !record.has_guard(guard) {
        debug!(guard, "Finalizer already removed");
        return Ok(());
    }

    let guards: Vec<String> = record
        .finalizers()
        .iter()
        .filter(|existing| existing.as_str() != guard)
        .cloned()
        .collect();

    store.replace_guards(&record, guards).await?;
    info!(guard, "Finalizer removed");
    Ok(())
}
