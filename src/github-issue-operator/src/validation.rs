//! Admission rules for `IssueRequest` specs.
//!
//! These mirror what the admission webhook enforces upstream of the
//! controller. Records written straight to the store can bypass admission, so
//! the controller only reports violations and never relies on them.

use crate::crd::IssueRequestSpec;
use std::fmt;
use url::Url;

/// Maximum length of `spec.description`, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 256;

/// A single rejected field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    /// JSON path of the field, e.g. `spec.title`.
    pub field: &'static str,

    /// Why the value was rejected.
    pub message: String,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Checks a spec against the admission rules, collecting every violation.
///
/// # Errors
///
/// Returns all [`FieldViolation`]s found.
pub fn validate_spec(spec: &IssueRequestSpec) -> Result<(), Vec<FieldViolation>> {
    let violations: Vec<FieldViolation> = [
        validate_title(&spec.title),
        validate_description(&spec.description),
        validate_repo_url(&spec.repo_url),
    ]
    .into_iter()
    .flatten()
    .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

fn validate_title(title: &str) -> Option<FieldViolation> {
    title.is_empty().then(|| FieldViolation {
        field: "spec.title",
        message: "title must not be empty".to_string(),
    })
}

fn validate_description(description: &str) -> Option<FieldViolation> {
    (description.chars().count() > MAX_DESCRIPTION_LEN).then(|| FieldViolation {
        field: "spec.description",
        message: format!("description must not be longer than {MAX_DESCRIPTION_LEN} characters"),
    })
}

fn validate_repo_url(repo_url: &str) -> Option<FieldViolation> {
    let violation = |message: &str| {
        Some(FieldViolation {
            field: "spec.repoURL",
            message: message.to_string(),
        })
    };

    let Ok(parsed) = Url::parse(repo_url) else {
        return violation("invalid url format");
    };
    if parsed.scheme() != "https" {
        return violation("repository url should start with https");
    }
    if parsed.host_str() != Some("github.com") {
        return violation("the host name of the repository should be github.com");
    }

    let segments: Vec<&str> = parsed.path().trim_start_matches('/').split('/').collect();
    let well_formed = segments.len() == 2 && segments.iter().all(|segment| !segment.is_empty());
    if !well_formed {
        return violation(
            "repository URL must be in the format 'https://github.com/{owner}/{repo}'",
        );
    }

    None
}
