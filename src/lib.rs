//! Core matching library for the decormatch furniture-staging backend.
//!
//! The request-handling layer (upload, generation, detection endpoints) lives
//! elsewhere; this crate owns the part between "here is a cropped detection
//! and its class label" and "here are the closest purchasable products":
//! catalog ingestion, embedding extraction, and category-scoped similarity
//! search.
//!
//! Typical lifecycle:
//!
//! ```no_run
//! use decormatch::config::MatcherConfig;
//! use decormatch::similarity::SimilarityService;
//!
//! # fn main() -> Result<(), decormatch::similarity::SimilarityError> {
//! let service = SimilarityService::new(MatcherConfig::default())?;
//! if let Err(err) = service.load("https://example.com/catalog.csv") {
//!     // degraded but running: queries return empty until a load succeeds
//!     log::error!("catalog load failed: {}", err);
//! }
//!
//! let crop = image::open("crop.png").expect("query image");
//! let matches = service.find_similar_items(&crop, "chair", 3)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod similarity;

#[cfg(test)]
mod tests;
