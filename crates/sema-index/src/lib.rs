//! Vector index core: backends, persistence, embedding, retrieval, ingestion.
//!
//! Provides an exact squared-L2 nearest-neighbor index over fixed-dimension
//! vectors with a pluggable storage backend, paired on-disk artifacts, an
//! embedding service trait with a deterministic fallback, the retriever that
//! composes the two, and the file and stream ingestion adapters.

pub mod backend;
pub mod embedding;
pub mod index;
pub mod ingest;
pub mod persist;
pub mod retriever;

pub use backend::{resolve_backend, squared_l2};
pub use embedding::{build_embedder, DynEmbedder, Embedder, HashEmbedder};
pub use index::{SearchHit, VectorIndex};
pub use ingest::{read_documents, IngestReport, StreamIngestor};
pub use persist::ArtifactPaths;
pub use retriever::Retriever;
pub use sema_core::config::BackendKind;
