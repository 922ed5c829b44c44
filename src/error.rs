//! Error types for the XStore Backup Operator

use thiserror::Error;

use crate::crd::XStoreBackupPhase;

/// Result type alias using the operator's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Operator error types
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Coordinating ClusterBackup not found
    #[error("ClusterBackup not found: {0}")]
    ClusterBackupNotFound(String),

    /// Secret not found
    #[error("Secret not found: {0}")]
    SecretNotFound(String),

    /// ConfigMap not found
    #[error("ConfigMap not found: {0}")]
    ConfigMapNotFound(String),

    /// A backup job finished without producing what the next step needs
    #[error("Backup job error: {0}")]
    Job(String),

    /// The backup changed since this pass read it
    #[error("Status of {0} was modified since it was read")]
    StatusConflict(String),

    /// Attempt to overwrite a status field that may only be set once
    #[error("Status field '{field}' is already set to a different value")]
    WriteOnce { field: &'static str },

    /// Attempt to move a backup to an earlier phase
    #[error("Refusing phase regression from {from} to {to}")]
    PhaseRegression {
        from: XStoreBackupPhase,
        to: XStoreBackupPhase,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Finalizer error
    #[error("Finalizer error: {0}")]
    Finalizer(#[source] Box<kube::runtime::finalizer::Error<Error>>),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Create a backup job error
    pub fn job(msg: impl Into<String>) -> Self {
        Error::Job(msg.into())
    }

    /// Whether retrying soon cannot help until the spec or config changes
    pub fn is_permanent(&self) -> bool {
        use kube::runtime::finalizer::Error as FinalizerError;

        match self {
            Error::Config(_) | Error::Validation(_) => true,
            Error::Finalizer(inner) => match inner.as_ref() {
                FinalizerError::ApplyFailed(e) | FinalizerError::CleanupFailed(e) => {
                    e.is_permanent()
                }
                _ => false,
            },
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_stay_permanent_through_the_finalizer() {
        let wrapped = Error::Finalizer(Box::new(
            kube::runtime::finalizer::Error::ApplyFailed(Error::validation("bad provider")),
        ));
        assert!(wrapped.is_permanent());
        assert!(!Error::job("no timestamp").is_permanent());
    }
}
