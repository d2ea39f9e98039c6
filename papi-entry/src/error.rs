//! Error types for entry type loading

use std::path::PathBuf;
use thiserror::Error;

/// Result type for entry operations
pub type Result<T> = std::result::Result<T, EntryError>;

/// Errors raised while loading settings and entry type definitions.
///
/// Lookups by id never return these; a definition that fails to load is
/// logged and treated as absent.
#[derive(Debug, Error)]
pub enum EntryError {
    /// Settings could not be extracted
    #[error("Failed to load settings: {0}")]
    Config(#[from] figment::Error),

    /// Definition file could not be read
    #[error(transparent)]
    Directory(#[from] papi_directory::DirectoryError),

    /// YAML parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Definition is YAML but not a usable entry type
    #[error("Invalid entry type '{path}': {message}")]
    InvalidDefinition { path: PathBuf, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EntryError {
    pub fn invalid(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_definition_display() {
        let err = EntryError::invalid("/types/page.yaml", "unknown type 'post'");
        assert_eq!(
            err.to_string(),
            "Invalid entry type '/types/page.yaml': unknown type 'post'"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let err: EntryError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, EntryError::Io(_)));
    }
}
