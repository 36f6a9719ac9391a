/// Errors produced while resolving an image manifest from a registry.
#[derive(Debug, thiserror::Error)]
pub enum OciError {
    #[error("registry returned {status} for {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("registry rejected credentials for {url} ({status})")]
    Unauthorized { url: String, status: u16 },

    #[error("manifest not found: {0}")]
    NotFound(String),

    #[error("image index has no manifest for platform {0}")]
    NoMatchingPlatform(String),

    #[error("unsupported manifest: {0}")]
    UnsupportedManifest(String),

    #[error("registry request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed manifest: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OciError>;
