use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the semantic engine.
///
/// The index core surfaces every failure to its immediate caller through this
/// type. Higher layers (`sema-rag`, `sema-api`) wrap it in their own error
/// types via `From` so that `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SemaError {
    #[error("Dimension mismatch ({context}): expected {expected}, got {actual}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    #[error("Index not found: {} is missing", path.display())]
    IndexNotFound { path: PathBuf },

    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SemaError {
    /// Shorthand for a [`SemaError::DimensionMismatch`].
    pub fn dimension_mismatch(context: impl Into<String>, expected: usize, actual: usize) -> Self {
        SemaError::DimensionMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }
}

impl From<toml::de::Error> for SemaError {
    fn from(err: toml::de::Error) -> Self {
        SemaError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for SemaError {
    fn from(err: toml::ser::Error) -> Self {
        SemaError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for SemaError {
    fn from(err: serde_json::Error) -> Self {
        SemaError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for semantic engine operations.
pub type Result<T> = std::result::Result<T, SemaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_display() {
        let err = SemaError::dimension_mismatch("query vector", 4, 5);
        assert_eq!(
            err.to_string(),
            "Dimension mismatch (query vector): expected 4, got 5"
        );
    }

    #[test]
    fn test_index_not_found_display() {
        let err = SemaError::IndexNotFound {
            path: PathBuf::from("/data/idx.vectors"),
        };
        assert_eq!(err.to_string(), "Index not found: /data/idx.vectors is missing");
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(SemaError, &str)> = vec![
            (
                SemaError::CorruptIndex("3 vectors, 2 documents".to_string()),
                "Corrupt index: 3 vectors, 2 documents",
            ),
            (
                SemaError::BackendUnavailable("ndarray".to_string()),
                "Backend unavailable: ndarray",
            ),
            (
                SemaError::InvalidArgument("k must be at least 1".to_string()),
                "Invalid argument: k must be at least 1",
            ),
            (
                SemaError::InvalidDocument("empty text".to_string()),
                "Invalid document: empty text",
            ),
            (
                SemaError::Embedding("model crashed".to_string()),
                "Embedding error: model crashed",
            ),
            (
                SemaError::Config("bad key".to_string()),
                "Configuration error: bad key",
            ),
            (
                SemaError::Serialization("invalid json".to_string()),
                "Serialization error: invalid json",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SemaError = io_err.into();
        assert!(matches!(err, SemaError::Io(_)));
        assert!(err.to_string().starts_with("I/O error:"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let sema_err: SemaError = err.unwrap_err().into();
        assert!(matches!(sema_err, SemaError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let sema_err: SemaError = err.unwrap_err().into();
        assert!(matches!(sema_err, SemaError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(value.to_string())
        }

        assert_eq!(inner().unwrap(), "42");
    }
}
