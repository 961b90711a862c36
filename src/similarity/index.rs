//! Exact nearest-neighbor index over dense vectors (squared L2)

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::{Error, Result};

/// Search hit: position in the index and squared L2 distance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Brute-force L2 index storing vectors contiguously
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatIndex {
    dimensions: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            data: Vec::new(),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        if self.dimensions == 0 {
            0
        } else {
            self.data.len() / self.dimensions
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Append a vector, returning its position
    pub fn add(&mut self, vector: &[f32]) -> Result<usize> {
        if self.dimensions == 0 {
            return Err(Error::Index("cannot add vectors to a zero-dimension index".into()));
        }
        self.check(vector)?;
        let position = self.len();
        self.data.extend_from_slice(vector);
        Ok(position)
    }

    /// Replace the vector at `position`
    pub fn set(&mut self, position: usize, vector: &[f32]) -> Result<()> {
        self.check(vector)?;
        if position >= self.len() {
            return Err(Error::Index(format!(
                "position {} out of bounds ({} vectors)",
                position,
                self.len()
            )));
        }
        let start = position * self.dimensions;
        self.data[start..start + self.dimensions].copy_from_slice(vector);
        Ok(())
    }

    /// Remove the vector at `position`; the last vector moves into its slot
    pub fn swap_remove(&mut self, position: usize) -> Result<()> {
        let len = self.len();
        if position >= len {
            return Err(Error::Index(format!(
                "position {} out of bounds ({} vectors)",
                position, len
            )));
        }
        let last = len - 1;
        if position != last {
            let (head, tail) = self.data.split_at_mut(last * self.dimensions);
            let start = position * self.dimensions;
            head[start..start + self.dimensions].copy_from_slice(&tail[..self.dimensions]);
        }
        self.data.truncate(last * self.dimensions);
        Ok(())
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimensions)?;
        self.data.get(start..start + self.dimensions)
    }

    /// The `k` nearest vectors, closest first; ties keep index order
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.check(query)?;
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimensions)
            .enumerate()
            .map(|(position, v)| Neighbor {
                position,
                distance: squared_l2(query, v),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.position.cmp(&b.position))
        });
        hits.truncate(k);
        Ok(hits)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
