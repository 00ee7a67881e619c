//! Exact nearest-neighbor index over embedding vectors.
//!
//! [`FlatIndex`] stores vectors in insertion order and answers queries by
//! brute-force squared-L2 distance, the same contract as a flat L2 index in
//! a vector search library: `search(query, k)` returns up to `k` positions,
//! nearest first.

use crate::embedding::l2_squared;

/// A single search hit: position in insertion order and its distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    /// Squared L2 distance to the query.
    pub distance: f32,
}

/// Brute-force L2 index with a fixed dimensionality.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dims: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatIndex {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            vectors: Vec::new(),
        }
    }

    /// Build an index from vectors, taking the dimensionality of the first.
    pub fn from_vectors(vectors: Vec<Vec<f32>>) -> anyhow::Result<Self> {
        let dims = vectors.first().map(|v| v.len()).unwrap_or(0);
        let mut index = Self::new(dims);
        for v in vectors {
            index.add(v)?;
        }
        Ok(index)
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Append a vector. Its position is the current [`len`](Self::len).
    pub fn add(&mut self, vector: Vec<f32>) -> anyhow::Result<()> {
        if vector.len() != self.dims {
            anyhow::bail!(
                "vector has {} dimensions, index expects {}",
                vector.len(),
                self.dims
            );
        }
        self.vectors.push(vector);
        Ok(())
    }

    /// Return the `k` nearest vectors to `query`, nearest first.
    ///
    /// Ties keep insertion order. Asking for more than [`len`](Self::len)
    /// returns every vector.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        let mut hits: Vec<Neighbor> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(index, v)| Neighbor {
                index,
                distance: l2_squared(query, v),
            })
            .collect();
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.index.cmp(&b.index))
        });
        hits.truncate(k);
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> FlatIndex {
        FlatIndex::from_vectors(vec![
            vec![0.0, 0.0],
            vec![10.0, 10.0],
            vec![1.0, 1.0],
            vec![5.0, 5.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_search_orders_by_distance() {
        let hits = index().search(&[0.9, 0.9], 3);
        let order: Vec<usize> = hits.iter().map(|h| h.index).collect();
        assert_eq!(order, vec![2, 0, 3]);
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[test]
    fn test_search_k_larger_than_index() {
        let hits = index().search(&[0.0, 0.0], 10);
        assert_eq!(hits.len(), 4);
    }

    #[test]
    fn test_search_ties_keep_insertion_order() {
        let idx = FlatIndex::from_vectors(vec![vec![1.0], vec![-1.0]]).unwrap();
        let hits = idx.search(&[0.0], 2);
        assert_eq!(hits[0].index, 0);
        assert_eq!(hits[1].index, 1);
    }

    #[test]
    fn test_add_rejects_wrong_dims() {
        let mut idx = FlatIndex::new(3);
        assert!(idx.add(vec![1.0, 2.0]).is_err());
        assert!(idx.is_empty());
    }

    #[test]
    fn test_empty_index() {
        let idx = FlatIndex::from_vectors(vec![]).unwrap();
        assert_eq!(idx.dims(), 0);
        assert!(idx.search(&[1.0], 3).is_empty());
    }
}
