//! Retriever composing an embedder with the vector index.
//!
//! `index_documents` embeds document texts and appends them to the index;
//! `retrieve` embeds a query and maps the nearest hits back to scored
//! documents.

use std::sync::Arc;

use tracing::{debug, info, warn};

use sema_core::error::{Result, SemaError};
use sema_core::types::{Document, RetrievedDocument};

use crate::embedding::{DynEmbedder, Embedder};
use crate::index::VectorIndex;

/// Turns text queries into ranked documents.
///
/// Uses dynamic dispatch (`Box<dyn DynEmbedder>`) so that production code can
/// supply a model-backed embedder while tests use `HashEmbedder`.
pub struct Retriever {
    index: Arc<VectorIndex>,
    embedder: Box<dyn DynEmbedder>,
}

impl Retriever {
    /// Create a retriever over a shared index and an embedding service.
    pub fn new(index: Arc<VectorIndex>, embedder: impl Embedder + 'static) -> Self {
        Self::new_dyn(index, Box::new(embedder))
    }

    /// Create a retriever from a pre-boxed dynamic embedding service.
    pub fn new_dyn(index: Arc<VectorIndex>, embedder: Box<dyn DynEmbedder>) -> Self {
        if embedder.dimension() != index.dimension() {
            warn!(
                embedder = embedder.dimension(),
                index = index.dimension(),
                "Embedder and index dimensions differ; indexing will fail"
            );
        }
        Self { index, embedder }
    }

    /// Embed and index `docs`, returning how many were added.
    ///
    /// All documents are validated and embedded before the index is touched,
    /// so a failure adds nothing.
    pub async fn index_documents(&self, docs: Vec<Document>) -> Result<usize> {
        for doc in &docs {
            doc.validate()?;
        }
        if docs.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = docs.iter().map(|d| d.text.clone()).collect();
        let vectors = self.embedder.embed_boxed(&texts).await?;
        if vectors.len() != docs.len() {
            return Err(SemaError::dimension_mismatch(
                "embedder output count",
                docs.len(),
                vectors.len(),
            ));
        }

        let count = docs.len();
        self.index.add(&vectors, docs)?;
        info!(count, total = self.index.len(), "Documents indexed");
        Ok(count)
    }

    /// Return up to `top_k` documents nearest to `query`, closest first.
    ///
    /// `score` is the raw squared L2 distance.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedDocument>> {
        let texts = [query.to_string()];
        let query_vec = self
            .embedder
            .embed_boxed(&texts)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SemaError::Embedding("embedder returned no vector".to_string()))?;

        let hits = self.index.search(&query_vec, top_k)?;
        debug!(top_k, hits = hits.len(), "Retrieved documents");
        Ok(hits
            .into_iter()
            .map(|hit| RetrievedDocument::from_hit(hit.document, hit.distance))
            .collect())
    }

    /// Get a reference to the underlying vector index.
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Get the embedding service.
    pub fn embedder(&self) -> &dyn DynEmbedder {
        self.embedder.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use sema_core::config::BackendKind;

    const DIM: usize = 384;

    fn make_retriever(backend: BackendKind) -> Retriever {
        let index = Arc::new(VectorIndex::new(DIM, backend).unwrap());
        Retriever::new(index, HashEmbedder::new(DIM))
    }

    fn paris_docs() -> Vec<Document> {
        vec![
            Document::new("d1", "The capital of France is Paris."),
            Document::new("d2", "Python is a programming language."),
            Document::new("d3", "The Eiffel Tower is in Paris."),
        ]
    }

    /// Embeds every text to a vector of the wrong width.
    struct WideEmbedder;

    impl Embedder for WideEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.0; DIM + 1]).collect())
        }

        fn dimension(&self) -> usize {
            DIM + 1
        }

        fn model_name(&self) -> &str {
            "wide"
        }
    }

    /// Drops the last vector of every batch.
    struct ShortEmbedder;

    impl Embedder for ShortEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().skip(1).map(|_| vec![0.0; DIM]).collect())
        }

        fn dimension(&self) -> usize {
            DIM
        }

        fn model_name(&self) -> &str {
            "short"
        }
    }

    #[tokio::test]
    async fn test_index_and_retrieve_paris() {
        for backend in [BackendKind::BruteForce, BackendKind::Specialized] {
            let retriever = make_retriever(backend);
            assert_eq!(retriever.index_documents(paris_docs()).await.unwrap(), 3);

            let results = retriever
                .retrieve("What is the capital of France?", 2)
                .await
                .unwrap();
            assert_eq!(results.len(), 2);

            let d2_score = {
                let all = retriever
                    .retrieve("What is the capital of France?", 3)
                    .await
                    .unwrap();
                all.iter().find(|r| r.id == "d2").unwrap().score
            };
            assert!(results
                .iter()
                .any(|r| (r.id == "d1" || r.id == "d3") && r.score < d2_score));
            assert!(results
                .iter()
                .any(|r| r.text.contains("France") || r.text.contains("Paris")));
        }
    }

    #[tokio::test]
    async fn test_retrieve_exact_text_scores_zero() {
        let retriever = make_retriever(BackendKind::BruteForce);
        retriever.index_documents(paris_docs()).await.unwrap();

        let results = retriever
            .retrieve("Python is a programming language.", 1)
            .await
            .unwrap();
        assert_eq!(results[0].id, "d2");
        assert_eq!(results[0].score, 0.0);
    }

    #[tokio::test]
    async fn test_retrieve_empty_index() {
        let retriever = make_retriever(BackendKind::BruteForce);
        assert!(retriever.retrieve("anything", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_metadata_is_returned() {
        let retriever = make_retriever(BackendKind::BruteForce);
        let mut meta = serde_json::Map::new();
        meta.insert("source".to_string(), serde_json::json!("atlas"));
        retriever
            .index_documents(vec![Document::new("m1", "Lyon is in France").with_metadata(meta)])
            .await
            .unwrap();

        let results = retriever.retrieve("Lyon", 1).await.unwrap();
        assert_eq!(results[0].metadata.as_ref().unwrap()["source"], "atlas");
    }

    #[tokio::test]
    async fn test_index_documents_rejects_invalid_doc() {
        let retriever = make_retriever(BackendKind::BruteForce);
        let docs = vec![Document::new("ok", "fine"), Document::new("bad", " ")];
        let err = retriever.index_documents(docs).await.unwrap_err();
        assert!(matches!(err, SemaError::InvalidDocument(_)));
        assert!(retriever.index().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_embedder_dimension_propagates() {
        let index = Arc::new(VectorIndex::new(DIM, BackendKind::BruteForce).unwrap());
        let retriever = Retriever::new(Arc::clone(&index), WideEmbedder);
        let err = retriever.index_documents(paris_docs()).await.unwrap_err();
        assert!(matches!(err, SemaError::DimensionMismatch { .. }));
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_embedder_count_mismatch() {
        let index = Arc::new(VectorIndex::new(DIM, BackendKind::BruteForce).unwrap());
        let retriever = Retriever::new(index, ShortEmbedder);
        let err = retriever.index_documents(paris_docs()).await.unwrap_err();
        assert!(matches!(err, SemaError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn test_index_no_documents() {
        let retriever = make_retriever(BackendKind::BruteForce);
        assert_eq!(retriever.index_documents(Vec::new()).await.unwrap(), 0);
    }
}
