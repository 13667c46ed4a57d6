//! Error types for the ParadeDB controller

use std::time::Duration;

use thiserror::Error;

/// Error variants are named with the `Error` suffix for clarity (e.g., `KubeError`, `ValidationError`).
#[allow(clippy::enum_variant_names)]
#[derive(Error, Debug)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Missing object key: {0}")]
    MissingObjectKey(&'static str),

    /// A user-referenced object is absent or unusable
    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Reconciliation timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::KubeError(e) => match e {
                kube::Error::Api(api_err) => {
                    // 4xx errors (except 409 Conflict, 429 TooManyRequests) are usually not retryable
                    let code = api_err.code;
                    if (400..500).contains(&code) {
                        return code == 409 || code == 429;
                    }
                    true
                }
                _ => true,
            },
            // The referenced object may be created later
            Error::MissingDependency(_) => true,
            Error::Timeout(_) => true,
            Error::ValidationError(_) => false,
            Error::SerializationError(_) => false,
            Error::YamlError(_) => false,
            Error::MissingObjectKey(_) => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::KubeError(kube::Error::Api(api_err)) if api_err.code == 404)
    }

    /// Optimistic-concurrency conflict: the object changed since it was read
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::KubeError(kube::Error::Api(api_err)) if api_err.code == 409)
    }

    /// Short machine-readable reason used for metrics labels
    pub fn metric_label(&self) -> &'static str {
        match self {
            Error::KubeError(_) if self.is_conflict() => "conflict",
            Error::KubeError(_) => "kube",
            Error::SerializationError(_) | Error::YamlError(_) => "serialization",
            Error::MissingObjectKey(_) => "missing_key",
            Error::MissingDependency(_) => "missing_dependency",
            Error::ValidationError(_) => "validation",
            Error::Timeout(_) => "timeout",
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
