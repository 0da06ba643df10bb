//! Storage backends for the vector index.
//!
//! A backend owns the flat vector data and computes distances from a query to
//! every stored row. Ranking, document bookkeeping and persistence live in
//! [`crate::index`], so every backend shares the same ordering, tie-break and
//! dimension checks.

use std::borrow::Cow;
use std::fmt;

use tracing::warn;

use sema_core::config::BackendKind;
use sema_core::error::{Result, SemaError};

mod brute_force;
#[cfg(feature = "specialized")]
mod specialized;

pub use brute_force::BruteForceStore;
#[cfg(feature = "specialized")]
pub use specialized::NdarrayStore;

/// Row storage plus a full distance scan.
pub trait VectorStore: Send + Sync + fmt::Debug {
    /// Which strategy this store implements.
    fn kind(&self) -> BackendKind;

    /// Number of stored vectors.
    fn len(&self) -> usize;

    /// Append `flat.len() / dimension` rows. Callers validate the length.
    fn append(&mut self, flat: &[f32]) -> Result<()>;

    /// Squared L2 distance from `query` to every row, in ordinal order.
    fn distances(&self, query: &[f32]) -> Vec<f32>;

    /// All rows concatenated in ordinal order.
    fn as_flat(&self) -> Cow<'_, [f32]>;
}

/// Squared Euclidean distance.
///
/// Both backends call this per row so their distances are bit-identical.
#[inline]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Check whether the specialized backend can serve a `dimension`-wide index.
pub fn probe_specialized(dimension: usize) -> Result<()> {
    if dimension == 0 {
        return Err(SemaError::BackendUnavailable(
            "specialized backend needs a non-zero dimension".to_string(),
        ));
    }
    if cfg!(feature = "specialized") {
        Ok(())
    } else {
        Err(SemaError::BackendUnavailable(
            "built without the `specialized` feature".to_string(),
        ))
    }
}

/// Pick the backend actually used for a requested strategy.
///
/// An unusable specialized backend degrades to brute force with a warning
/// rather than failing construction.
pub fn resolve_backend(requested: BackendKind, dimension: usize) -> BackendKind {
    select_backend(requested, probe_specialized(dimension))
}

fn select_backend(requested: BackendKind, probe: Result<()>) -> BackendKind {
    match (requested, probe) {
        (BackendKind::BruteForce, _) => BackendKind::BruteForce,
        (BackendKind::Specialized, Ok(())) => BackendKind::Specialized,
        (BackendKind::Specialized, Err(e)) => {
            warn!(error = %e, "Falling back to brute-force vector search");
            BackendKind::BruteForce
        }
    }
}

/// Create an empty store for an already-resolved backend.
pub fn new_store(kind: BackendKind, dimension: usize) -> Box<dyn VectorStore> {
    match kind {
        #[cfg(feature = "specialized")]
        BackendKind::Specialized => Box::new(NdarrayStore::new(dimension)),
        #[cfg(not(feature = "specialized"))]
        BackendKind::Specialized => {
            tracing::info!("Specialized backend not compiled in; using brute force");
            Box::new(BruteForceStore::new(dimension))
        }
        BackendKind::BruteForce => Box::new(BruteForceStore::new(dimension)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_squared_l2() {
        assert_eq!(squared_l2(&[0.0, 0.0], &[3.0, 4.0]), 25.0);
        assert_eq!(squared_l2(&[1.5, -2.0], &[1.5, -2.0]), 0.0);
    }

    #[test]
    fn test_select_backend_honors_brute_force() {
        assert_eq!(
            select_backend(BackendKind::BruteForce, Ok(())),
            BackendKind::BruteForce
        );
    }

    #[test]
    fn test_select_backend_falls_back_when_unavailable() {
        let probe = Err(SemaError::BackendUnavailable("missing".to_string()));
        assert_eq!(
            select_backend(BackendKind::Specialized, probe),
            BackendKind::BruteForce
        );
    }

    #[test]
    fn test_probe_rejects_zero_dimension() {
        assert!(matches!(
            probe_specialized(0),
            Err(SemaError::BackendUnavailable(_))
        ));
    }

    #[cfg(feature = "specialized")]
    #[test]
    fn test_resolve_specialized_when_compiled_in() {
        assert_eq!(
            resolve_backend(BackendKind::Specialized, 8),
            BackendKind::Specialized
        );
        assert_eq!(new_store(BackendKind::Specialized, 8).kind(), BackendKind::Specialized);
    }

    #[cfg(not(feature = "specialized"))]
    #[test]
    fn test_resolve_falls_back_without_feature() {
        assert_eq!(
            resolve_backend(BackendKind::Specialized, 8),
            BackendKind::BruteForce
        );
    }

    #[test]
    fn test_backends_agree_bit_for_bit() {
        let dim = 5;
        let rows: Vec<f32> = (0..40).map(|i| ((i * 37 % 11) as f32) * 0.173 - 0.9).collect();
        let query = [0.1f32, -0.4, 0.33, 0.0, 0.7];

        let mut brute = new_store(BackendKind::BruteForce, dim);
        let mut other = new_store(resolve_backend(BackendKind::Specialized, dim), dim);
        brute.append(&rows).unwrap();
        other.append(&rows).unwrap();

        let a = brute.distances(&query);
        let b = other.distances(&query);
        assert_eq!(a.len(), 8);
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
        assert_eq!(brute.as_flat().as_ref(), other.as_flat().as_ref());
    }
}
