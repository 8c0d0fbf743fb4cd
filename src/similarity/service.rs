//! Similarity service: the process-wide handle over model and catalog index.
//!
//! Owns the feature extractor and the live [`CatalogIndex`] and exposes the
//! two operations the request layer needs:
//! - `load`: rebuild the index from a catalog source and swap it in
//! - `find_similar_items`: rank catalog products against a query crop
//!
//! Lifecycle is explicit: construct (model loads here), `load` once at
//! startup, serve reads concurrently, drop at shutdown. Until a load
//! succeeds, the service holds a valid empty index and every query returns
//! an empty match list.

use std::sync::{Arc, Mutex, RwLock};

use image::DynamicImage;

use crate::config::MatcherConfig;
use crate::similarity::catalog::{CatalogBuilder, CatalogError, LoadReport};
use crate::similarity::extractor::{EmbeddingError, FeatureExtractor};
use crate::similarity::index::{CatalogIndex, IndexError, SimilarityResult};

/// Errors that can occur during similarity operations.
#[derive(Debug, thiserror::Error)]
pub enum SimilarityError {
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Service for matching furniture crops against the product catalog.
///
/// Readers clone the index Arc and never block each other; a reload builds
/// the replacement index completely before a single atomic swap, so no
/// caller ever observes a half-built catalog.
pub struct SimilarityService {
    config: MatcherConfig,
    extractor: FeatureExtractor,
    builder: CatalogBuilder,
    index: RwLock<Arc<CatalogIndex>>,
    /// Serializes rebuilds; held across the whole build, not just the swap
    rebuild: Mutex<()>,
}

impl SimilarityService {
    /// Create the service and load the embedding model.
    ///
    /// The index starts empty; call [`load`](Self::load) to populate it.
    pub fn new(config: MatcherConfig) -> Result<Self, SimilarityError> {
        let extractor = FeatureExtractor::new(&config.model_path, config.embedding_dims)?;
        let builder = CatalogBuilder::new(&config)?;
        let index = RwLock::new(Arc::new(CatalogIndex::new(config.embedding_dims)));

        Ok(Self {
            config,
            extractor,
            builder,
            index,
            rebuild: Mutex::new(()),
        })
    }

    /// The configured result count for callers that don't pass one.
    pub fn default_top_n(&self) -> usize {
        self.config.default_top_n
    }

    /// Rebuild the index from `source` and make it live.
    ///
    /// Concurrent calls are serialized; the last completed load wins. On
    /// failure the previously live index (possibly empty) stays in place, so
    /// `current()` never yields an invalid state.
    pub fn load(&self, source: &str) -> Result<LoadReport, SimilarityError> {
        let _rebuild = self
            .rebuild
            .lock()
            .map_err(|e| SimilarityError::Internal(format!("rebuild lock poisoned: {}", e)))?;

        log::info!("Loading and processing product catalog from {}", source);
        let (index, report) = self.builder.build(source, &self.extractor)?;

        if report.indexed == 0 {
            log::warn!("Product catalog is empty after processing");
        } else {
            log::info!(
                "Product catalog created with {} items ({} of {} rows skipped)",
                report.indexed,
                report.skipped,
                report.rows
            );
        }

        let mut guard = self
            .index
            .write()
            .map_err(|e| SimilarityError::Internal(format!("index lock poisoned: {}", e)))?;
        *guard = Arc::new(index);

        Ok(report)
    }

    /// Get the live index.
    pub fn current(&self) -> Arc<CatalogIndex> {
        match self.index.read() {
            Ok(guard) => guard.clone(),
            // A poisoned lock still holds a fully built index; reading it
            // is safe
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Find the catalog products most similar to a cropped detection.
    ///
    /// # Arguments
    /// * `image` - The cropped query image (RGB, any size)
    /// * `class_name` - Detected category label; matched against catalog
    ///   categories after trim + lowercase, exact equality only
    /// * `top_n` - Maximum number of matches to return
    ///
    /// # Returns
    /// Matches sorted by similarity descending. Empty when the index holds
    /// no entries for the category - an expected outcome, not an error.
    pub fn find_similar_items(
        &self,
        image: &DynamicImage,
        class_name: &str,
        top_n: usize,
    ) -> Result<Vec<SimilarityResult>, SimilarityError> {
        let index = self.current();
        if index.is_empty() {
            return Ok(Vec::new());
        }

        let query = self.extractor.embed(image)?;
        let results = index.search(&query, class_name, top_n)?;

        if results.is_empty() {
            log::warn!("No items found in catalog for category: '{}'", class_name);
        }

        Ok(results)
    }

    /// Same as [`find_similar_items`](Self::find_similar_items), decoding the
    /// query image from raw bytes first.
    ///
    /// Fails with an image-decode error when the bytes are not a decodable
    /// image; that failure propagates to the caller rather than degrading to
    /// an empty result.
    pub fn find_similar_items_bytes(
        &self,
        image_bytes: &[u8],
        class_name: &str,
        top_n: usize,
    ) -> Result<Vec<SimilarityResult>, SimilarityError> {
        let image = image::load_from_memory(image_bytes)
            .map_err(|e| EmbeddingError::ImageDecode(e.to_string()))?;
        self.find_similar_items(&image, class_name, top_n)
    }
}
