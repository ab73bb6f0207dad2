//! Error types for the core library

use std::path::PathBuf;

use thiserror::Error;

/// Core error type for module plumbing
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The runner did not pass an argument file
    #[error("No argument file provided")]
    MissingArgumentFile,

    /// The argument file could not be read
    #[error("Could not read configuration file: {}", path.display())]
    UnreadableArguments {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The argument file is not valid JSON for the module
    #[error("Configuration file not valid JSON: {}", path.display())]
    InvalidArguments {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;
