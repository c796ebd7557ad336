//! Controller error types.

/// Errors that stop the controller from starting.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// Configuration loading errors.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// Kubernetes client initialization errors.
    #[error(transparent)]
    Kube(#[from] kube::Error),

    /// The CRD can't be listed, usually because it isn't installed.
    #[error("IssueRequest CRD is not queryable, is it installed? {0}")]
    CrdNotQueryable(#[source] kube::Error),
}
