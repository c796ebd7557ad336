//! Issue tracker error types.

use thiserror::Error;

/// Errors that can occur while talking to the issue tracker.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The token is missing or was refused.
    #[error("Unauthorized: missing or invalid GitHub token")]
    Unauthorized,

    /// The API refused the request (validation, permissions, unknown repo).
    #[error("GitHub rejected the request ({status}): {message}")]
    RemoteRejected { status: u16, message: String },

    /// Too few requests left in the current rate limit window.
    #[error("Rate limit exceeded, reset at {reset_at}")]
    RateLimited { reset_at: u64 },

    /// Transport, server or decoding failure.
    #[error("GitHub API unavailable: {0}")]
    RemoteUnavailable(#[source] Box<octocrab::Error>),
}

impl From<octocrab::Error> for TrackerError {
    fn from(error: octocrab::Error) -> Self {
        let rejection = match &error {
            octocrab::Error::GitHub { source, .. } => {
                Some((source.status_code.as_u16(), source.message.clone()))
            }
            _ => None,
        };

        match rejection {
            Some((401, _)) => Self::Unauthorized,
            Some((status, message)) if (400..500).contains(&status) => {
                Self::RemoteRejected { status, message }
            }
            _ => Self::RemoteUnavailable(Box::new(error)),
        }
    }
}
