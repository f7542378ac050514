// src/error.rs
//
// Crate-wide error type.
//
// Nothing in the library terminates the process. Failures either degrade in
// place (store growth, batch allocation) or come back to the caller here.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HpaError {
    /// Action index outside `[0, ACTION_COUNT)`.
    #[error("invalid action index {0} (expected 0..9)")]
    InvalidAction(usize),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Persisted Q-table header could not be interpreted.
    #[error("malformed Q-table file {path}: {message}")]
    MalformedTable { path: PathBuf, message: String },

    #[error("allocation failed: {0}")]
    Allocation(String),

    #[error("invalid configuration: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}

impl HpaError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        HpaError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn validation(field: &str, message: impl Into<String>) -> Self {
        HpaError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HpaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_names_field() {
        let err = HpaError::validation("episodes", "must be positive");
        assert_eq!(
            err.to_string(),
            "invalid configuration: episodes: must be positive"
        );
    }

    #[test]
    fn test_io_error_carries_path() {
        let err = HpaError::io(
            "/tmp/missing.dat",
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("/tmp/missing.dat"));
    }
}
