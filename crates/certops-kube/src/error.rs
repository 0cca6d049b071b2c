//! Error types for certops-kube

use thiserror::Error;

/// Result type for certops-kube operations
pub type Result<T> = std::result::Result<T, CertopsError>;

/// Errors that can occur during cluster operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CertopsError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Resource not found (typed signal, callers branch on this instead of
    /// string-matching HTTP status text)
    #[error("{kind} '{name}' not found")]
    NotFound { kind: String, name: String },

    /// A manifest document could not be parsed
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// A document's apiVersion/kind is unknown to the cluster
    #[error("unknown resource type: {api_version}/{kind}")]
    UnknownResourceType { api_version: String, kind: String },

    /// Applying a document to the cluster failed
    #[error("failed to apply {resource}: {message}")]
    ApplyFailed { resource: String, message: String },

    /// A cert-manager CRD does not serve the API version the backup relies on
    #[error("CRD '{crd}' does not serve cert-manager.io/v1; refusing to back up a cluster whose core resources cannot be read consistently")]
    UnsupportedCrdVersion { crd: String },

    /// A core resource in a backup file failed strict decoding
    #[error("failed to decode {kind} '{name}' from backup: {message}")]
    CorruptBackup {
        kind: String,
        name: String,
        message: String,
    },

    /// The operation was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for CertopsError {
    fn from(e: serde_json::Error) -> Self {
        CertopsError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for CertopsError {
    fn from(e: serde_yaml::Error) -> Self {
        CertopsError::Serialization(e.to_string())
    }
}

impl CertopsError {
    /// Check if this is a not-found signal (typed variant or raw API 404)
    pub fn is_not_found(&self) -> bool {
        match self {
            CertopsError::NotFound { .. } => true,
            CertopsError::Api(kube::Error::Api(resp)) => resp.code == 404,
            _ => false,
        }
    }

    /// Check if this is a conflict error (409, AlreadyExists)
    pub fn is_already_exists(&self) -> bool {
        matches!(self, CertopsError::Api(kube::Error::Api(resp)) if resp.code == 409)
    }
}
