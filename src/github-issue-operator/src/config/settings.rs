//! Operator settings deserialization.

use crate::config::ConfigError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Finalizer attached to every reconciled `IssueRequest`.
pub const DEFAULT_GUARD_TOKEN: &str = "finalizer.issuerequest.issue.core.github.io";

/// Tunables for the controller, parsed from a `config.toml` file.
///
/// Every key is optional; missing keys fall back to [`Default`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct OperatorConfig {
    /// Finalizer name used as the deletion guard.
    pub guard_token: String,

    /// Delay between checks while the token secret is empty.
    pub token_poll_interval_secs: u64,

    /// Delay before retrying after a status write conflict.
    pub conflict_retry_secs: u64,

    /// First delay of the per-record exponential backoff.
    pub backoff_base_secs: u64,

    /// Upper bound of the per-record exponential backoff.
    pub backoff_max_secs: u64,

    /// Restrict the watch to a single namespace.
    pub namespace: Option<String>,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            guard_token: DEFAULT_GUARD_TOKEN.to_string(),
            token_poll_interval_secs: 60,
            conflict_retry_secs: 5,
            backoff_base_secs: 1,
            backoff_max_secs: 300,
            namespace: None,
        }
    }
}

impl OperatorConfig {
    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file can't be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        debug!(path = %path.display(), "Loading operator config");

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlError {
            path: path.display().to_string(),
            source: e,
        })?;

        config.validate(path)?;
        Ok(config)
    }

    /// Checks that intervals are usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] describing the first bad value.
    pub fn validate(&self, path: &Path) -> Result<(), ConfigError> {
        let fail = |message: &str| {
            Err(ConfigError::ValidationError {
                path: path.display().to_string(),
                message: message.to_string(),
            })
        };

        if self.guard_token.trim().is_empty() {
            return fail("guard-token cannot be empty");
        }
        if self.token_poll_interval_secs == 0 {
            return fail("token-poll-interval-secs must be greater than zero");
        }
        if self.conflict_retry_secs == 0 {
            return fail("conflict-retry-secs must be greater than zero");
        }
        if self.backoff_base_secs == 0 {
            return fail("backoff-base-secs must be greater than zero");
        }
        if self.backoff_base_secs > self.backoff_max_secs {
            return fail("backoff-base-secs cannot exceed backoff-max-secs");
        }
        if self.namespace.as_deref().is_some_and(|ns| ns.trim().is_empty()) {
            return fail("namespace cannot be empty when set");
        }

        Ok(())
    }

    /// Overrides the watched namespace, keeping the file value when `None`.
    #[must_use]
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        if namespace.is_some() {
            self.namespace = namespace;
        }
        self
    }

    pub fn token_poll_interval(&self) -> Duration {
        Duration::from_secs(self.token_poll_interval_secs)
    }

    pub fn conflict_retry(&self) -> Duration {
        Duration::from_secs(self.conflict_retry_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_secs(self.backoff_base_secs)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_secs(self.backoff_max_secs)
    }
}
