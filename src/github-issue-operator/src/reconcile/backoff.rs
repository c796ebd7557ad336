//! Per-record exponential backoff.

use crate::store::RecordKey;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Tracks consecutive failures per record.
///
/// Each record backs off independently; a success resets only that record.
#[derive(Debug)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: Mutex<HashMap<RecordKey, u32>>,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Records a failure and returns how long to wait before retrying.
    pub fn next_delay(&self, key: &RecordKey) -> Duration {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        let attempts = failures.entry(key.clone()).or_insert(0);

        let factor = 2u32.saturating_pow(*attempts);
        *attempts = attempts.saturating_add(1);

        self.base.saturating_mul(factor).min(self.max)
    }

    /// Forgets the failures of a record.
    pub fn reset(&self, key: &RecordKey) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}
