use std::borrow::Cow;

use sema_core::config::BackendKind;
use sema_core::error::Result;

use super::{squared_l2, VectorStore};

/// Linear-scan store over a single contiguous buffer.
///
/// Rows are appended to one `Vec<f32>`, so growth is amortized.
#[derive(Debug, Clone)]
pub struct BruteForceStore {
    dimension: usize,
    data: Vec<f32>,
}

impl BruteForceStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }
}

impl VectorStore for BruteForceStore {
    fn kind(&self) -> BackendKind {
        BackendKind::BruteForce
    }

    fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    fn append(&mut self, flat: &[f32]) -> Result<()> {
        self.data.extend_from_slice(flat);
        Ok(())
    }

    fn distances(&self, query: &[f32]) -> Vec<f32> {
        self.data
            .chunks_exact(self.dimension)
            .map(|row| squared_l2(row, query))
            .collect()
    }

    fn as_flat(&self) -> Cow<'_, [f32]> {
        Cow::Borrowed(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_len() {
        let mut store = BruteForceStore::new(3);
        assert_eq!(store.len(), 0);
        store.append(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(store.len(), 2);
        store.append(&[7.0, 8.0, 9.0]).unwrap();
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_distances_in_ordinal_order() {
        let mut store = BruteForceStore::new(2);
        store.append(&[0.0, 0.0, 1.0, 1.0, 3.0, 0.0]).unwrap();
        assert_eq!(store.distances(&[0.0, 0.0]), vec![0.0, 2.0, 9.0]);
    }
}
