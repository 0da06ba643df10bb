//! Error types for the RAG pipeline.

use sema_core::error::SemaError;

/// Errors from answering a query.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("query cannot be empty")]
    EmptyQuery,
    #[error("retrieval error: {0}")]
    Retrieval(#[from] SemaError),
    #[error("LLM error: {0}")]
    Llm(String),
}

impl From<reqwest::Error> for RagError {
    fn from(err: reqwest::Error) -> Self {
        RagError::Llm(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rag_error_display() {
        assert_eq!(RagError::EmptyQuery.to_string(), "query cannot be empty");
        assert_eq!(
            RagError::Llm("HTTP 429".to_string()).to_string(),
            "LLM error: HTTP 429"
        );
    }

    #[test]
    fn test_rag_error_from_sema_error() {
        let err: RagError = SemaError::InvalidArgument("k must be greater than 0".to_string()).into();
        assert!(matches!(err, RagError::Retrieval(SemaError::InvalidArgument(_))));
        assert!(err.to_string().starts_with("retrieval error:"));
    }
}
