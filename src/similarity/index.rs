//! In-memory catalog index with category-filtered cosine similarity search.
//!
//! Holds one entry per catalog product and answers "closest products to this
//! query vector within a category". Read-only after construction; a catalog
//! reload builds a replacement index rather than mutating this one.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::similarity::preprocess::normalize_category;

/// One product from the catalog with its precomputed embedding.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    /// Opaque catalog identifier
    pub product_id: String,
    /// Display name
    pub product_name: String,
    /// Purchase link
    pub product_url: String,
    /// Category label as it appears in the catalog
    pub category: String,
    /// Source image location
    pub image_url: String,
    /// Feature vector derived from the product image
    pub embedding: Vec<f32>,
}

/// A ranked match returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarityResult {
    pub product_name: String,
    pub product_url: String,
    pub image_url: String,
    /// Cosine similarity to the query embedding
    pub similarity_score: f32,
}

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Cannot store or search with zero-norm vector")]
    ZeroNormVector,
}

/// The full set of catalog entries plus the expected embedding dimension.
pub struct CatalogIndex {
    entries: Vec<CatalogEntry>,
    dimensions: usize,
}

impl CatalogIndex {
    /// Create a new empty index with the specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self {
            entries: Vec::new(),
            dimensions,
        }
    }

    /// Create an index with pre-allocated capacity.
    pub fn with_capacity(dimensions: usize, capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            dimensions,
        }
    }

    /// Get the expected embedding dimensions.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Get the number of indexed products.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries in catalog order.
    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    /// Append an entry.
    ///
    /// Rejects embeddings with the wrong length or zero norm (a zero vector
    /// has no defined cosine similarity).
    pub fn insert(&mut self, entry: CatalogEntry) -> Result<(), IndexError> {
        if entry.embedding.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: entry.embedding.len(),
            });
        }

        if l2_norm(&entry.embedding) < f32::EPSILON {
            return Err(IndexError::ZeroNormVector);
        }

        self.entries.push(entry);
        Ok(())
    }

    /// Distinct normalized categories with entry counts, sorted by name.
    pub fn categories(&self) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(normalize_category(&entry.category)).or_default() += 1;
        }
        counts.into_iter().collect()
    }

    /// Rank same-category entries against a query embedding.
    ///
    /// The category filter is exact equality after normalization (trim +
    /// lowercase) - no fuzzy matching. An empty candidate set is an expected
    /// outcome and returns an empty list.
    ///
    /// # Returns
    /// At most `top_n` results, sorted by similarity descending. Ties keep
    /// catalog order (the sort is stable).
    pub fn search(
        &self,
        query: &[f32],
        category: &str,
        top_n: usize,
    ) -> Result<Vec<SimilarityResult>, IndexError> {
        if query.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: query.len(),
            });
        }

        let query_norm = l2_norm(query);
        if query_norm < f32::EPSILON {
            return Err(IndexError::ZeroNormVector);
        }

        let wanted = normalize_category(category);
        let mut results: Vec<SimilarityResult> = self
            .entries
            .iter()
            .filter(|entry| normalize_category(&entry.category) == wanted)
            .map(|entry| SimilarityResult {
                product_name: entry.product_name.clone(),
                product_url: entry.product_url.clone(),
                image_url: entry.image_url.clone(),
                similarity_score: cosine_similarity(query, &entry.embedding, query_norm),
            })
            .collect();

        results.sort_by(|a, b| {
            b.similarity_score
                .partial_cmp(&a.similarity_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_n);

        Ok(results)
    }
}

/// Compute L2 norm of a vector.
fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Compute cosine similarity between two vectors.
/// Assumes query_norm is precomputed for efficiency.
fn cosine_similarity(query: &[f32], target: &[f32], query_norm: f32) -> f32 {
    let target_norm = l2_norm(target);
    if target_norm < f32::EPSILON {
        return 0.0;
    }

    let dot_product: f32 = query.iter().zip(target.iter()).map(|(a, b)| a * b).sum();
    dot_product / (query_norm * target_norm)
}
