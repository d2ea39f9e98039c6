//! Error types for loading property definitions

use std::path::PathBuf;
use thiserror::Error;

/// Result type for fields operations
pub type Result<T> = std::result::Result<T, FieldsError>;

/// Errors raised while loading property definition fragments.
///
/// Public lookups never surface these; they are logged and turned into
/// absence at the call site.
#[derive(Debug, Error)]
pub enum FieldsError {
    /// Definition fragment could not be read
    #[error(transparent)]
    Directory(#[from] papi_directory::DirectoryError),

    /// Liquid template failed to parse or render
    #[error("template error in '{path}': {message}")]
    Template { path: PathBuf, message: String },

    /// YAML parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// JSON conversion error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FieldsError {
    pub fn template(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Template {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_error_display() {
        let err = FieldsError::template("/boxes/simple.yaml", "unexpected end");
        assert_eq!(
            err.to_string(),
            "template error in '/boxes/simple.yaml': unexpected end"
        );
    }
}
