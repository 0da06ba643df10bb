//! Exact nearest-neighbor vector index with paired document storage.
//!
//! Vectors and documents sit at the same ordinal positions, assigned in
//! insertion order. Search ranks every stored vector by squared L2 distance
//! to the query, breaking ties by ordinal, so results are identical whichever
//! backend holds the rows.

use std::fs;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use sema_core::config::BackendKind;
use sema_core::error::{Result, SemaError};
use sema_core::types::Document;

use crate::backend::{new_store, resolve_backend, VectorStore};
use crate::persist::{self, ArtifactPaths};

/// A single hit returned from a vector search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// The stored document.
    pub document: Document,
    /// Squared L2 distance to the query. Lower is more similar.
    pub distance: f32,
}

#[derive(Debug)]
struct IndexState {
    store: Box<dyn VectorStore>,
    documents: Vec<Document>,
}

/// Vector index over fixed-dimension `f32` vectors.
///
/// `add` and `load` take the write lock; `search` and `save` take the read
/// lock, so one writer excludes all other operations on the instance.
#[derive(Debug)]
pub struct VectorIndex {
    dimension: usize,
    backend: BackendKind,
    state: RwLock<IndexState>,
}

impl VectorIndex {
    /// Create an empty index.
    ///
    /// A requested specialized backend that cannot be used falls back to
    /// brute force; `backend()` reports the strategy actually in effect.
    pub fn new(dimension: usize, requested: BackendKind) -> Result<Self> {
        if dimension == 0 {
            return Err(SemaError::InvalidArgument(
                "index dimension must be greater than 0".to_string(),
            ));
        }
        let backend = resolve_backend(requested, dimension);
        info!(dimension, %backend, "Vector index created");
        Ok(Self {
            dimension,
            backend,
            state: RwLock::new(IndexState {
                store: new_store(backend, dimension),
                documents: Vec::new(),
            }),
        })
    }

    /// Load the index persisted at `path`, or start empty if nothing is there.
    ///
    /// A half-present artifact pair is an error, not an empty index.
    pub fn open_or_create(dimension: usize, requested: BackendKind, path: &Path) -> Result<Self> {
        let index = Self::new(dimension, requested)?;
        if ArtifactPaths::new(path).any_exists() {
            index.load(path)?;
        } else {
            info!(path = %path.display(), "No persisted index found, starting empty");
        }
        Ok(index)
    }

    /// Append vectors with their documents at the next ordinal positions.
    ///
    /// Every vector is validated before anything is written, so a failed call
    /// leaves the index unchanged. Not idempotent: re-adding duplicates.
    pub fn add(&self, vectors: &[Vec<f32>], docs: Vec<Document>) -> Result<()> {
        if vectors.len() != docs.len() {
            return Err(SemaError::dimension_mismatch(
                "vector count vs document count",
                docs.len(),
                vectors.len(),
            ));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(SemaError::dimension_mismatch(
                "added vector",
                self.dimension,
                bad.len(),
            ));
        }
        if vectors.is_empty() {
            return Ok(());
        }

        let mut flat = Vec::with_capacity(vectors.len() * self.dimension);
        for vector in vectors {
            flat.extend_from_slice(vector);
        }

        let mut state = self.write_state()?;
        state.store.append(&flat)?;
        state.documents.extend(docs);
        debug_assert_eq!(state.store.len(), state.documents.len());
        debug!(added = vectors.len(), total = state.documents.len(), "Vectors added");
        Ok(())
    }

    /// Return up to `k` stored documents closest to `query`, closest first.
    ///
    /// Equal distances keep insertion order. An empty index yields no hits.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dimension {
            return Err(SemaError::dimension_mismatch(
                "query vector",
                self.dimension,
                query.len(),
            ));
        }
        if k == 0 {
            return Err(SemaError::InvalidArgument(
                "k must be at least 1".to_string(),
            ));
        }

        let state = self.read_state()?;
        let ranked = rank(state.store.distances(query), k);
        Ok(ranked
            .into_iter()
            .map(|(ordinal, distance)| SearchHit {
                document: state.documents[ordinal].clone(),
                distance,
            })
            .collect())
    }

    /// Persist both artifacts under `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        let paths = ArtifactPaths::new(path);
        let lock = persist::path_lock(path);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let (vector_bytes, document_bytes, count) = {
            let state = self.read_state()?;
            let vector_bytes = persist::encode_vectors(self.dimension, &state.store.as_flat())?;
            let document_bytes = serde_json::to_vec_pretty(&state.documents)?;
            (vector_bytes, document_bytes, state.documents.len())
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        persist::write_all_atomic(&[
            (paths.vectors.as_path(), vector_bytes.as_slice()),
            (paths.documents.as_path(), document_bytes.as_slice()),
        ])?;

        info!(path = %path.display(), count, "Vector index saved");
        Ok(())
    }

    /// Replace the in-memory state with the artifacts persisted under `path`.
    pub fn load(&self, path: &Path) -> Result<()> {
        let paths = ArtifactPaths::new(path);
        let lock = persist::path_lock(path);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        paths.ensure_exist()?;
        let (stored_dimension, flat) = persist::decode_vectors(&fs::read(&paths.vectors)?)?;
        let documents: Vec<Document> = serde_json::from_slice(&fs::read(&paths.documents)?)
            .map_err(|e| SemaError::CorruptIndex(format!("document artifact: {}", e)))?;

        if stored_dimension != self.dimension {
            return Err(SemaError::dimension_mismatch(
                "stored index",
                self.dimension,
                stored_dimension,
            ));
        }
        let vector_count = flat.len() / stored_dimension;
        if vector_count != documents.len() {
            return Err(SemaError::CorruptIndex(format!(
                "{} vectors but {} documents",
                vector_count,
                documents.len()
            )));
        }

        let mut store = new_store(self.backend, self.dimension);
        store.append(&flat)?;

        let mut state = self.write_state()?;
        *state = IndexState { store, documents };
        info!(path = %path.display(), count = vector_count, "Vector index loaded");
        Ok(())
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        let state = self.state.read().unwrap_or_else(|e| {
            warn!("Vector index lock poisoned, reading recovered state");
            e.into_inner()
        });
        state.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The backend in effect after any fallback.
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, IndexState>> {
        self.state
            .read()
            .map_err(|e| SemaError::CorruptIndex(format!("Lock poisoned: {}", e)))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, IndexState>> {
        self.state
            .write()
            .map_err(|e| SemaError::CorruptIndex(format!("Lock poisoned: {}", e)))
    }
}

/// The `k` smallest distances as `(ordinal, distance)`, ascending, ties by ordinal.
fn rank(distances: Vec<f32>, k: usize) -> Vec<(usize, f32)> {
    let by_distance =
        |a: &(usize, f32), b: &(usize, f32)| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0));

    let mut ranked: Vec<(usize, f32)> = distances.into_iter().enumerate().collect();
    if k < ranked.len() {
        ranked.select_nth_unstable_by(k - 1, by_distance);
        ranked.truncate(k);
    }
    ranked.sort_unstable_by(by_distance);
    ranked
}
