//! Vector similarity primitives and the in-memory index

use crate::utils::error::{GatewayError, Result};
use std::collections::HashMap;

/// Cosine similarity of two equal-length vectors
///
/// Returns 0.0 for mismatched lengths or zero-norm vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Cosine similarity of one query against many stored vectors
///
/// The query norm is computed once; each stored vector costs one dot
/// product and one norm.
pub fn batch_cosine_similarity<'a, I>(query: &[f32], vectors: I) -> Vec<f32>
where
    I: IntoIterator<Item = &'a Vec<f32>>,
{
    let query_norm = query.iter().map(|x| x * x).sum::<f32>().sqrt();
    vectors
        .into_iter()
        .map(|vector| {
            if vector.len() != query.len() || query_norm == 0.0 {
                return 0.0;
            }
            let mut dot = 0.0f32;
            let mut norm = 0.0f32;
            for (x, y) in query.iter().zip(vector.iter()) {
                dot += x * y;
                norm += y * y;
            }
            if norm == 0.0 {
                0.0
            } else {
                dot / (query_norm * norm.sqrt())
            }
        })
        .collect()
}

/// Keep the `k` highest-scoring items by partial selection
///
/// O(n·k) repeated max extraction; no full sort.
pub fn top_k<T: Clone>(scored: &[(T, f32)], k: usize) -> Vec<(T, f32)> {
    let k = k.min(scored.len());
    let mut taken = vec![false; scored.len()];
    let mut result = Vec::with_capacity(k);
    for _ in 0..k {
        let mut best: Option<usize> = None;
        for (i, (_, score)) in scored.iter().enumerate() {
            if taken[i] {
                continue;
            }
            match best {
                Some(j) if scored[j].1 >= *score => {}
                _ => best = Some(i),
            }
        }
        if let Some(i) = best {
            taken[i] = true;
            result.push(scored[i].clone());
        }
    }
    result
}

/// Fixed-dimension vector index over cache entry keys
#[derive(Debug)]
pub struct VectorIndex {
    dimension: usize,
    vectors: HashMap<String, Vec<f32>>,
}

impl VectorIndex {
    /// Create an index for vectors of `dimension`
    pub fn new(dimension: usize) -> Self {
        Self { dimension, vectors: HashMap::new() }
    }

    /// Insert a vector; the length must match the index dimension
    pub fn insert(&mut self, id: String, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(GatewayError::Cache(format!(
                "vector length {} does not match index dimension {}",
                vector.len(),
                self.dimension
            )));
        }
        self.vectors.insert(id, vector);
        Ok(())
    }

    /// Remove a vector
    pub fn remove(&mut self, id: &str) {
        self.vectors.remove(id);
    }

    /// Single nearest neighbor at or above `threshold`
    pub fn nearest(&self, query: &[f32], threshold: f32) -> Option<(String, f32)> {
        let mut best: Option<(String, f32)> = None;
        for (id, vector) in &self.vectors {
            let similarity = cosine_similarity(query, vector);
            if similarity >= threshold {
                match &best {
                    Some((_, score)) if *score >= similarity => {}
                    _ => best = Some((id.clone(), similarity)),
                }
            }
        }
        best
    }

    /// Every id whose similarity to `query` is at or above `threshold`
    pub fn all_above(&self, query: &[f32], threshold: f32) -> Vec<(String, f32)> {
        self.vectors
            .iter()
            .filter_map(|(id, vector)| {
                let similarity = cosine_similarity(query, vector);
                (similarity >= threshold).then(|| (id.clone(), similarity))
            })
            .collect()
    }

    /// The `k` nearest neighbors, best first
    pub fn top_k(&self, query: &[f32], k: usize) -> Vec<(String, f32)> {
        let scored: Vec<(String, f32)> = self
            .vectors
            .iter()
            .map(|(id, vector)| (id.clone(), cosine_similarity(query, vector)))
            .collect();
        top_k(&scored, k)
    }

    /// Number of indexed vectors
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// True when empty
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}
