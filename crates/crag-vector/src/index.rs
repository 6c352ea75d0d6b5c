//! Exact nearest-neighbour index over row-major `f32` vectors.

use std::cmp::Ordering;

use crag_core::types::{is_unit_norm, Metric};
use crag_core::{Error, Result};

/// One search hit: the row position in the index and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Immutable flat index. Built once, searched by brute force.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    metric: Metric,
    dim: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Build from vectors that all have `dim` components. Cosine indexes only
    /// accept unit-norm vectors.
    pub fn build(metric: Metric, dim: usize, vectors: &[Vec<f32>]) -> Result<Self> {
        if dim == 0 {
            return Err(Error::InvalidInput("index dimension must be positive".into()));
        }
        let mut data = Vec::with_capacity(vectors.len() * dim);
        for (i, v) in vectors.iter().enumerate() {
            if v.len() != dim {
                return Err(Error::InvalidInput(format!("vector {} has {} values, expected {}", i, v.len(), dim)));
            }
            if metric.requires_unit_norm() && !is_unit_norm(v) {
                return Err(Error::InvalidInput(format!("vector {} is not unit-norm", i)));
            }
            data.extend_from_slice(v);
        }
        Ok(Self { metric, dim, data })
    }

    pub(crate) fn from_raw(metric: Metric, dim: usize, data: Vec<f32>) -> Result<Self> {
        if dim == 0 || data.len() % dim != 0 {
            return Err(Error::Integrity(format!("{} values do not form rows of {}", data.len(), dim)));
        }
        Ok(Self { metric, dim, data })
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dim)?;
        self.data.get(start..start + self.dim)
    }

    pub(crate) fn raw(&self) -> &[f32] {
        &self.data
    }

    /// The `min(k, len)` closest rows, ascending by distance, ties by position.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Err(Error::InvalidInput("k must be positive".into()));
        }
        if query.len() != self.dim {
            return Err(Error::InvalidConfig(format!(
                "query has {} dimensions, index has {}",
                query.len(),
                self.dim
            )));
        }
        if self.metric.requires_unit_norm() && !is_unit_norm(query) {
            return Err(Error::InvalidInput("query vector is not unit-norm".into()));
        }

        let mut hits: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(position, row)| Neighbor { position, distance: self.metric.distance(query, row) })
            .collect();
        let k = k.min(hits.len());
        if k < hits.len() {
            hits.select_nth_unstable_by(k, by_distance);
            hits.truncate(k);
        }
        hits.sort_by(by_distance);
        Ok(hits)
    }
}

fn by_distance(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance.total_cmp(&b.distance).then(a.position.cmp(&b.position))
}
