//! Token secret provisioning.
//!
//! Each record gets a `{name}-token-secret` holding a `token` key. The
//! controller creates it empty on first sight and from then on only reads
//! it; an operator fills in the token.

use crate::crd::IssueRequest;
use crate::store::{CredentialStore, RecordKey, StoreError};
use std::fmt;
use tracing::{debug, info};

/// What the token secret currently holds.
#[derive(Clone, PartialEq, Eq)]
pub enum TokenState {
    /// No secret exists yet; it should be provisioned.
    NotFound,

    /// The secret exists but nobody filled in a token.
    Empty,

    /// A usable token.
    Ready(String),
}

impl fmt::Debug for TokenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("NotFound"),
            Self::Empty => f.write_str("Empty"),
            Self::Ready(_) => f.write_str("Ready(<redacted>)"),
        }
    }
}

/// Reads the token secret of a record.
///
/// # Errors
///
/// Returns [`StoreError`] if the read fails.
pub async fn read_token<S>(store: &S, key: &RecordKey) -> Result<TokenState, StoreError>
where
    S: CredentialStore + ?Sized,
{
    let state = match store.get_holder(key).await? {
        None => TokenState::NotFound,
        Some(holder) if holder.token.is_empty() => TokenState::Empty,
        Some(holder) => TokenState::Ready(holder.token),
    };
    debug!(state = ?state, "Read token secret");
    Ok(state)
}

/// Creates the empty token secret if none exists.
///
/// Returns whether a secret was created. An existing secret is never
/// rewritten.
///
/// # Errors
///
/// Returns [`StoreError`] if the read or create fails.
pub async fn ensure_holder<S>(store: &S, record: &IssueRequest) -> Result<bool, StoreError>
where
    S: CredentialStore + ?Sized,
{
    let key = RecordKey::of(record)?;
    if store.get_holder(&key).await?.is_some() {
        debug!("Token secret already exists");
        return Ok(false);
    }

    let created = store.create_holder(record).await?;
    if created {
        info!(secret = %key.holder_name(), "Created empty token secret");
    }
    Ok(created)
}
