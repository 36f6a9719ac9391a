//! Error types for clair-adapter

use thiserror::Error;

/// Result type alias using clair-adapter Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while scanning or reporting
#[derive(Error, Debug)]
pub enum Error {
    /// Manifest or blob retrieval from the image registry failed
    #[error("Registry error: {0}")]
    Registry(#[from] adapter_oci::OciError),

    /// Clair rejected a layer submission
    #[error("Layer submission failed for {layer}: {message}")]
    Submit { layer: String, message: String },

    /// Clair has no result for the requested layer
    #[error("Scan report not found: {0}")]
    NotFound(String),

    /// Any other failure talking to Clair
    #[error("Clair error: {0}")]
    Backend(String),

    /// The manifest contains no scannable layers
    #[error("No scannable layers in {repository}@{digest}")]
    NoScannableLayers { repository: String, digest: String },

    /// Malformed or incomplete caller input
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification used by the HTTP boundary to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Image registry failure
    Upstream,
    /// Clair failure other than not-found
    Backend,
    /// Unknown scan handle
    NotFound,
    /// Caller sent something unusable
    InvalidInput,
    /// Everything else
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Registry(_) => ErrorKind::Upstream,
            Error::Submit { .. } | Error::Backend(_) | Error::Http(_) => ErrorKind::Backend,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::NoScannableLayers { .. } | Error::InvalidRequest(_) => ErrorKind::InvalidInput,
            Error::Serde(_) | Error::Io(_) | Error::Config(_) => ErrorKind::Internal,
        }
    }
}
