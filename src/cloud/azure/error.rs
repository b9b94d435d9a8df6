use thiserror::Error;

/// Failures talking to the Azure control plane.
///
/// SECURITY: Error messages must NEVER contain sensitive data like access
/// tokens, client secrets or storage account keys.
#[derive(Debug, Error)]
pub enum AzureError {
    /// Authentication failed (bad credentials, expired or rejected token)
    #[error("authentication failed: {message}")]
    Auth { message: String },

    /// API returned an error response
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Network-level error (connection failed, timeout, etc.)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A long-running create finished in a non-success state
    #[error("provisioning of {resource} failed: state '{state}'")]
    ProvisioningFailed { resource: String, state: String },

    #[error("unexpected response: {message}")]
    InvalidResponse { message: String },

    #[error("storage account key is not valid base64")]
    InvalidAccountKey,
}
