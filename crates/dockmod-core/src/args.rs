//! Module argument files
//!
//! The automation runner writes the task's arguments to a JSON file and
//! passes its path as the only command-line argument.

use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Error, Result};

/// Read and decode a module argument file.
///
/// Unknown fields are ignored and missing fields take the target type's
/// defaults, so `T` should be `#[serde(default)]`.
pub fn load_arguments<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    debug!("Loading module arguments from {}", path.display());

    let text = std::fs::read(path)
        .map_err(|source| Error::UnreadableArguments { path: path.to_path_buf(), source })?;

    serde_json::from_slice(&text)
        .map_err(|source| Error::InvalidArguments { path: path.to_path_buf(), source })
}
