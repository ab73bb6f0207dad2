//! Docker-specific error types

use std::path::PathBuf;

use thiserror::Error;

/// Docker-specific error type
#[derive(Error, Debug)]
pub enum DockerError {
    /// Bollard client error
    #[error("Docker client error: {0}")]
    Client(#[from] bollard::errors::Error),

    /// I/O error while assembling or streaming a build context
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Regular file whose content is not a gzip archive
    #[error("Unsupported build context {}: expected a directory or a gzip archive", path.display())]
    UnsupportedContext { path: PathBuf },

    /// Build request rejected before contacting the engine
    #[error("{reason}")]
    InvalidRequest { reason: String },

    /// Build failed
    #[error("Docker build failed: {reason}")]
    BuildFailed { reason: String },

    /// Registry refused the supplied credentials
    #[error("authentication is required")]
    AuthenticationRequired,

    /// Invalid configuration
    #[error("Invalid Docker configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Stream error
    #[error("Docker stream error: {reason}")]
    StreamError { reason: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for Docker operations
pub type Result<T> = std::result::Result<T, DockerError>;

impl DockerError {
    /// Whether the error was raised before anything was sent to the engine
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::UnsupportedContext { .. } | Self::InvalidRequest { .. })
    }
}
