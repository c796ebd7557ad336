//! Repository URL parsing.

use std::fmt;
use thiserror::Error;

/// Prefix stripped from repository URLs before splitting.
const GITHUB_PREFIX: &str = "https://github.com/";

/// The repository URL does not name an owner and a repository.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Malformed repository reference: '{url}'")]
pub struct RepoRefError {
    /// The URL as given in the spec.
    pub url: String,
}

/// An `(owner, repo)` pair identifying a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    /// Repository owner (user or organization).
    pub owner: String,

    /// Repository name.
    pub name: String,
}

impl RepoRef {
    /// Parses a repository URL into owner and name.
    ///
    /// The `https://github.com/` prefix is optional. The first two non-empty
    /// path segments are the owner and the repository; anything after them
    /// is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`RepoRefError`] when fewer than two segments remain.
    pub fn parse(url: &str) -> Result<Self, RepoRefError> {
        let path = url.trim().strip_prefix(GITHUB_PREFIX).unwrap_or(url.trim());
        let mut segments = path.split('/').filter(|segment| !segment.is_empty());

        match (segments.next(), segments.next()) {
            (Some(owner), Some(name)) => Ok(Self {
                owner: owner.to_string(),
                name: name.to_string(),
            }),
            _ => Err(RepoRefError {
                url: url.to_string(),
            }),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
