use thiserror::Error;

/// Top-level failure taxonomy for a run.
///
/// A resource that is absent is never an error: probes report it as a normal
/// outcome and destroy logs it as a warning.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Missing or malformed project configuration or credentials. Raised
    /// before any cloud call is made.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Cloud(#[from] crate::cloud::AzureError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("variables artifact error: {0}")]
    Artifact(String),

    #[error("--provision and --destroy cannot be combined")]
    ConflictingModes,

    #[error("aborted: confirmation declined")]
    UserAbort,
}
