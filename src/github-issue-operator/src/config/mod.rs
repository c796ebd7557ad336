//! Operator configuration loading.
//!
//! Configuration lives in an optional TOML file:
//! ```toml
//! guard-token = "finalizer.issuerequest.issue.core.github.io"
//! token-poll-interval-secs = 60
//! conflict-retry-secs = 5
//! backoff-base-secs = 1
//! backoff-max-secs = 300
//! namespace = "issues"
//! ```

mod error;
mod settings;

pub use error::ConfigError;
pub use settings::{OperatorConfig, DEFAULT_GUARD_TOKEN};

use std::path::Path;
use tracing::info;

/// Loads the operator configuration, falling back to defaults without a file.
///
/// # Errors
///
/// Returns [`ConfigError`] if the given file can't be loaded.
pub fn load_config(path: Option<&Path>) -> Result<OperatorConfig, ConfigError> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration file");
            OperatorConfig::load(path)
        }
        None => {
            info!("No configuration file given, using defaults");
            Ok(OperatorConfig::default())
        }
    }
}
