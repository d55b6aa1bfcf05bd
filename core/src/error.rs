use thiserror::Error;

/// Deplab error types
#[derive(Error, Debug)]
pub enum DeplabError {
    /// Additional-sources file could not be parsed
    #[error("could not parse additional sources file: {path}: {message}")]
    SourcesFile { path: String, message: String },

    /// Tag string is not a valid image reference
    #[error("tag {tag} is invalid: {reason}")]
    InvalidTag { tag: String, reason: String },

    /// Debian package database inspection failed
    #[error("debian package metadata: {0}")]
    DebianMetadata(String),

    /// Git working tree inspection failed
    #[error("git metadata: {path}: {message}")]
    GitMetadata { path: String, message: String },

    /// Archive fetch or digest failed
    #[error("archive metadata: {url}: {message}")]
    ArchiveMetadata { url: String, message: String },

    /// OCI image error
    #[error("OCI image error: {0}")]
    OciImageError(String),

    /// Image runtime command failed
    #[error("image runtime: `{command}` failed: {message}")]
    RuntimeCommand { command: String, message: String },

    /// Image runtime answered with something we cannot parse
    #[error("unrecognized image runtime output: {0:?}")]
    UnrecognizedLoadOutput(String),

    /// Writing the annotated image archive failed
    #[error("could not export to {path}: {message}")]
    Export { path: String, message: String },

    /// Writing a metadata or package-list file failed
    #[error("could not write {path}: {message}")]
    OutputFile { path: String, message: String },

    /// Timeout error
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for DeplabError {
    fn from(err: serde_json::Error) -> Self {
        DeplabError::SerializationError(err.to_string())
    }
}

/// Result type alias for deplab operations
pub type Result<T> = std::result::Result<T, DeplabError>;
