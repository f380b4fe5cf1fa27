/// Unified error types for the vault uploader
use thiserror::Error;

/// Main error type for upload operations
#[derive(Error, Debug)]
pub enum UploadError {
    /// Media type and storage mode cannot be combined (e.g. PDF in local mode)
    #[error("Unsupported combination: {0}")]
    UnsupportedCombination(String),

    /// Media type is not one the uploader knows how to embed
    #[error("Unknown media type: {0}")]
    UnknownMediaType(String),

    /// Remote store rejected the request or was unreachable
    #[error("Upload failed: {0}")]
    UploadTransport(String),

    /// Writing to the local vault failed
    #[error("Local write failed: {0}")]
    LocalWrite(String),

    /// Placeholder text is no longer present in the document
    #[error("Placeholder not found: {0}")]
    PlaceholderNotFound(String),

    /// Remote store is not configured yet
    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    /// Invalid configuration or input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Front matter could not be parsed
    #[error("Front matter error: {0}")]
    FrontMatter(#[from] serde_yaml::Error),

    /// Settings blob could not be parsed
    #[error("Settings error: {0}")]
    Settings(#[from] serde_json::Error),

    /// Fetching a remote attachment failed
    #[error("Download failed: {0}")]
    Download(String),

    /// Referenced file or link does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// Whether the error came from the remote store and may be retried locally
    pub fn is_transport(&self) -> bool {
        matches!(self, UploadError::UploadTransport(_))
    }
}

/// Result type alias for upload operations
pub type UploadResult<T> = Result<T, UploadError>;
