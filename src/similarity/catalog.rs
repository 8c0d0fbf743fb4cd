//! Catalog loading: CSV rows in, indexed embeddings out.
//!
//! The catalog is a tabular resource (URL or local path) with one product per
//! row. Building an index is one-shot and synchronous: read the rows, fetch
//! every product image on a bounded pool, embed each one, assemble the index.
//! A bad row is logged and skipped; it never aborts the load.

use std::collections::HashMap;
use std::fs;
use std::time::Duration;

use image::DynamicImage;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::MatcherConfig;
use crate::similarity::extractor::FeatureExtractor;
use crate::similarity::index::{CatalogEntry, CatalogIndex};

/// Columns every catalog must carry (matched case-insensitively, trimmed)
pub const REQUIRED_COLUMNS: [&str; 5] = ["id", "name", "purchase_link", "type", "image_link"];

/// Errors that can occur while loading a catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog source unreachable: {0}")]
    Source(String),

    #[error("catalog is missing required columns: {0}")]
    MissingColumns(String),

    #[error("csv error: {0:?}")]
    Csv(#[from] csv::Error),

    #[error("reqwest error: {0:?}")]
    Reqwest(#[from] reqwest::Error),

    #[error("io error: {0:?}")]
    IO(#[from] std::io::Error),

    #[error("unexpected error: {0:?}")]
    Other(#[from] anyhow::Error),
}

/// One parsed catalog row, before its image has been fetched.
#[derive(Debug, Clone)]
pub struct CatalogRow {
    pub id: String,
    pub name: String,
    pub purchase_link: String,
    pub category: String,
    pub image_link: String,
}

/// Outcome of a catalog load.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    /// Rows parsed from the catalog source
    pub rows: usize,
    /// Entries that made it into the index
    pub indexed: usize,
    /// Rows dropped for any reason (fetch, decode, embedding)
    pub skipped: usize,
}

/// Builds a [`CatalogIndex`] from a tabular catalog source.
pub struct CatalogBuilder {
    client: reqwest::blocking::Client,
    fetch_threads: usize,
}

impl CatalogBuilder {
    pub fn new(config: &MatcherConfig) -> Result<Self, CatalogError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            fetch_threads: config.fetch_threads(),
        })
    }

    /// Build a complete index from the catalog at `source`.
    ///
    /// Image fetch + decode runs in parallel on a bounded pool; embedding
    /// extraction serializes through the extractor's session lock. Row order
    /// is preserved so equal-similarity matches keep catalog order later.
    ///
    /// Zero surviving rows is a valid outcome: the returned index is empty
    /// and every search against it comes back empty.
    pub fn build(
        &self,
        source: &str,
        extractor: &FeatureExtractor,
    ) -> Result<(CatalogIndex, LoadReport), CatalogError> {
        let rows = self.read_rows(source)?;
        let total = rows.len();
        log::info!("Catalog has {} rows, fetching product images", total);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.fetch_threads)
            .build()
            .map_err(|e| CatalogError::Other(anyhow::anyhow!("fetch pool: {}", e)))?;

        let fetched: Vec<Option<(CatalogRow, DynamicImage)>> = pool.install(|| {
            rows.into_par_iter()
                .map(|row| match self.fetch_image(&row.image_link) {
                    Ok(image) => Some((row, image)),
                    Err(err) => {
                        log::error!("Error processing image for '{}': {}", row.name, err);
                        None
                    }
                })
                .collect()
        });

        let mut index = CatalogIndex::with_capacity(extractor.dimensions(), total);
        for (row, image) in fetched.into_iter().flatten() {
            let embedding = match extractor.embed(&image) {
                Ok(embedding) => embedding,
                Err(err) => {
                    log::error!("Error embedding image for '{}': {}", row.name, err);
                    continue;
                }
            };

            let name = row.name.clone();
            let entry = CatalogEntry {
                product_id: row.id,
                product_name: row.name,
                product_url: row.purchase_link,
                category: row.category,
                image_url: row.image_link,
                embedding,
            };
            if let Err(err) = index.insert(entry) {
                log::warn!("Rejecting catalog entry '{}': {}", name, err);
            }
        }

        let report = LoadReport {
            rows: total,
            indexed: index.len(),
            skipped: total - index.len(),
        };
        Ok((index, report))
    }

    /// Read and validate the catalog rows without touching product images.
    pub fn read_rows(&self, source: &str) -> Result<Vec<CatalogRow>, CatalogError> {
        let bytes = self.fetch_source(source)?;
        parse_rows(&bytes)
    }

    fn fetch_source(&self, source: &str) -> Result<Vec<u8>, CatalogError> {
        if is_url(source) {
            let response = self.client.get(source).send()?;
            if !response.status().is_success() {
                return Err(CatalogError::Source(format!(
                    "{}: HTTP {}",
                    source,
                    response.status()
                )));
            }
            Ok(response.bytes()?.to_vec())
        } else {
            Ok(fs::read(source)?)
        }
    }

    /// Fetch and decode one product image (http(s) url or local path).
    fn fetch_image(&self, link: &str) -> anyhow::Result<DynamicImage> {
        let bytes = if is_url(link) {
            let response = self.client.get(link).send()?;
            if !response.status().is_success() {
                anyhow::bail!("HTTP {}", response.status());
            }
            response.bytes()?.to_vec()
        } else {
            fs::read(link)?
        };

        Ok(image::load_from_memory(&bytes)?)
    }
}

fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Parse catalog CSV bytes into rows, skipping incomplete ones.
fn parse_rows(bytes: &[u8]) -> Result<Vec<CatalogRow>, CatalogError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = reader.headers()?.clone();
    let mut columns: HashMap<String, usize> = HashMap::new();
    for (i, header) in headers.iter().enumerate() {
        columns.entry(header.trim().to_lowercase()).or_insert(i);
    }

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !columns.contains_key(**c))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(CatalogError::MissingColumns(missing.join(", ")));
    }

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        // Line number in the source file, counting the header
        let line = i + 2;

        let record = match record {
            Ok(record) => record,
            Err(err) => {
                log::warn!("Skipping malformed catalog row at line {}: {}", line, err);
                continue;
            }
        };

        let field = |name: &str| -> String {
            record
                .get(columns[name])
                .unwrap_or_default()
                .trim()
                .to_string()
        };

        let row = CatalogRow {
            id: field("id"),
            name: field("name"),
            purchase_link: field("purchase_link"),
            category: field("type"),
            image_link: field("image_link"),
        };

        if row.id.is_empty()
            || row.name.is_empty()
            || row.purchase_link.is_empty()
            || row.category.is_empty()
            || row.image_link.is_empty()
        {
            log::warn!("Skipping incomplete catalog row at line {}", line);
            continue;
        }

        rows.push(row);
    }

    Ok(rows)
}
