//! Rate limiting utilities for GitHub API.
//!
//! The controller never sleeps inside a reconcile pass. When the core bucket
//! runs low, the call fails with [`TrackerError::RateLimited`] and the
//! record is requeued for when the window resets.

use crate::issues::TrackerError;
use octocrab::Octocrab;
use std::time::Duration;
use tracing::{debug, warn};

/// Maximum time to wait for rate limit reset (1 hour).
const MAX_WAIT_SECS: u64 = 3600;

/// Minimum remaining requests before backing off.
const MIN_REMAINING_THRESHOLD: u32 = 5;

/// Rate limit information for a specific resource.
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    /// Requests remaining in the current window.
    pub remaining: u32,
    /// Unix timestamp when the rate limit resets.
    pub reset: u64,
    /// Total requests allowed per window.
    pub limit: u32,
}

impl RateLimitInfo {
    /// Returns true if the bucket is low and resets after `now`.
    #[must_use]
    pub fn is_exhausted(&self, now: u64) -> bool {
        self.remaining < MIN_REMAINING_THRESHOLD && self.reset > now
    }
}

/// Checks the current rate limit status for core API (issues, PRs, etc.).
///
/// # Errors
///
/// Returns an error if the rate limit API call fails.
pub async fn check_core_rate_limit(octocrab: &Octocrab) -> Result<RateLimitInfo, octocrab::Error> {
    let rate_limit = octocrab.ratelimit().get().await?;
    let core = &rate_limit.resources.core;

    Ok(RateLimitInfo {
        remaining: core.remaining as u32,
        reset: core.reset,
        limit: core.limit as u32,
    })
}

/// Ensures sufficient rate limit before making core API calls.
///
/// # Errors
///
/// Returns [`TrackerError::RateLimited`] if the bucket is exhausted, or the
/// error of the rate limit call itself.
pub async fn ensure_core_rate_limit(octocrab: &Octocrab) -> Result<(), TrackerError> {
    let info = check_core_rate_limit(octocrab).await?;
    let now = unix_now();

    if info.is_exhausted(now) {
        warn!(
            remaining = info.remaining,
            limit = info.limit,
            reset = info.reset,
            "Rate limit low, deferring call"
        );
        return Err(TrackerError::RateLimited {
            reset_at: info.reset,
        });
    }

    debug!(remaining = info.remaining, "Rate limit ok");
    Ok(())
}

/// Returns how long to wait until `reset_at`, capped at one hour.
#[must_use]
pub fn retry_after(reset_at: u64) -> Duration {
    let wait_secs = reset_at.saturating_sub(unix_now());
    if wait_secs > MAX_WAIT_SECS {
        warn!(
            wait_secs,
            max_wait = MAX_WAIT_SECS,
            "Rate limit reset too far in future, capping wait time"
        );
    }
    Duration::from_secs(wait_secs.clamp(1, MAX_WAIT_SECS))
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
