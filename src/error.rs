//! Error types for the DataVolume provider

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while managing a DataVolume
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error (any remote failure other than not-found)
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Remote object is absent
    #[error("DataVolume {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },

    // =========================================================================
    // Convergence Errors
    // =========================================================================
    /// The backing controller reported an explicit failure state
    #[error("{resource} failed to converge, finished with state \"{state}\"")]
    ConvergenceFailure { resource: String, state: String },

    /// Polling exceeded its deadline without reaching a terminal state
    #[error("timed out after {duration} waiting for {resource} (last state: \"{state}\")")]
    ConvergenceTimeout {
        resource: String,
        state: String,
        duration: String,
    },

    /// The wait was cancelled by the caller
    #[error("wait for {resource} was cancelled")]
    Cancelled { resource: String },

    // =========================================================================
    // Input Errors
    // =========================================================================
    /// Identity string does not parse into (namespace, name)
    #[error("malformed resource id {0:?}, expected \"namespace/name\"")]
    MalformedIdentity(String),

    /// Configuration rejected by schema validation or sub-schema expansion
    #[error("validation failed: {0}")]
    Validation(String),

    /// Duration parse error
    #[error("Failed to parse duration: {0}")]
    DurationParse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    // =========================================================================
    // Encoding and I/O
    // =========================================================================
    /// JSON encoding error
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML encoding error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the remote object is absent, whether reported by the store
    /// directly or as a raw 404 from the API server.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Kube(kube::Error::Api(e)) => e.code == 404,
            _ => false,
        }
    }

    /// True for a wait that ran out of time, as opposed to a hard failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::ConvergenceTimeout { .. })
    }

    /// True when the backing controller reported an explicit failure.
    pub fn is_convergence_failure(&self) -> bool {
        matches!(self, Error::ConvergenceFailure { .. })
    }
}
