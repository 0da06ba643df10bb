//! ndarray-backed flat index.
//!
//! Rows live in a standard-layout `Array2<f32>` grown with `append` along
//! axis 0, and distance scans run across rows in parallel through ndarray's
//! rayon integration.

use std::borrow::Cow;

use ndarray::{Array2, ArrayView2, Axis, Zip};

use sema_core::config::BackendKind;
use sema_core::error::{Result, SemaError};

use super::{squared_l2, VectorStore};

#[derive(Debug, Clone)]
pub struct NdarrayStore {
    rows: Array2<f32>,
}

impl NdarrayStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            rows: Array2::zeros((0, dimension)),
        }
    }

    fn dimension(&self) -> usize {
        self.rows.ncols()
    }
}

impl VectorStore for NdarrayStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Specialized
    }

    fn len(&self) -> usize {
        self.rows.nrows()
    }

    fn append(&mut self, flat: &[f32]) -> Result<()> {
        let dim = self.dimension();
        let batch = ArrayView2::from_shape((flat.len() / dim, dim), flat)
            .map_err(|e| SemaError::InvalidArgument(format!("ndarray shape: {}", e)))?;
        self.rows
            .append(Axis(0), batch)
            .map_err(|e| SemaError::InvalidArgument(format!("ndarray append: {}", e)))?;
        Ok(())
    }

    fn distances(&self, query: &[f32]) -> Vec<f32> {
        Zip::from(self.rows.rows())
            .par_map_collect(|row| match row.as_slice() {
                Some(row) => squared_l2(row, query),
                None => squared_l2(&row.to_vec(), query),
            })
            .to_vec()
    }

    fn as_flat(&self) -> Cow<'_, [f32]> {
        match self.rows.as_slice() {
            Some(slice) => Cow::Borrowed(slice),
            None => Cow::Owned(self.rows.iter().copied().collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_batches() {
        let mut store = NdarrayStore::new(2);
        store.append(&[1.0, 2.0]).unwrap();
        store.append(&[3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.as_flat().as_ref(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_distances_on_empty_store() {
        let store = NdarrayStore::new(4);
        assert!(store.distances(&[0.0; 4]).is_empty());
    }

    #[test]
    fn test_distances() {
        let mut store = NdarrayStore::new(2);
        store.append(&[0.0, 0.0, 1.0, 1.0, 3.0, 0.0]).unwrap();
        assert_eq!(store.distances(&[0.0, 0.0]), vec![0.0, 2.0, 9.0]);
    }
}
