//! Integration tests for the catalog-to-match pipeline.
//!
//! Most of these need the exported backbone on disk and are marked
//! #[ignore]. Run with: cargo test -- --ignored
//! Set DECORMATCH_MODEL to point at the ONNX file if it isn't at the
//! default models/ path.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::MatcherConfig;
use crate::similarity::test_support::model_path;
use crate::similarity::SimilarityService;

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_dir() -> PathBuf {
    let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    let path = std::env::temp_dir().join(format!(
        "decormatch-integration-{}-{}",
        std::process::id(),
        counter
    ));
    fs::create_dir_all(&path).unwrap();
    path
}

fn test_config() -> MatcherConfig {
    MatcherConfig {
        model_path: model_path(),
        ..MatcherConfig::default()
    }
}

/// Write a PNG with a simple two-tone pattern so products are visually
/// distinguishable to the backbone.
fn write_test_image(path: &Path, primary: [u8; 3], secondary: [u8; 3]) {
    let img = image::RgbImage::from_fn(64, 64, |x, y| {
        if (x / 8 + y / 8) % 2 == 0 {
            image::Rgb(primary)
        } else {
            image::Rgb(secondary)
        }
    });
    img.save(path).unwrap();
}

fn write_catalog(dir: &Path, rows: &[(&str, &str, &str, &str)]) -> PathBuf {
    let mut csv = String::from("id,name,purchase_link,type,image_link\n");
    for (id, name, category, image) in rows {
        csv.push_str(&format!(
            "{},{},https://shop.example/{},{},{}\n",
            id, name, id, category, image
        ));
    }

    let path = dir.join("catalog.csv");
    fs::write(&path, csv).unwrap();
    path
}

/// Full flow: load a catalog of generated images, query with one of them.
/// The same source image must come back as the top match with score ~ 1.0.
#[test]
#[ignore = "requires model file (set DECORMATCH_MODEL)"]
fn test_load_and_match_identical_image() {
    let dir = test_dir();

    let sofa = dir.join("sofa.png");
    let chair = dir.join("chair.png");
    write_test_image(&sofa, [200, 40, 40], [240, 240, 240]);
    write_test_image(&chair, [40, 40, 200], [10, 10, 10]);

    let catalog = write_catalog(
        &dir,
        &[
            ("1", "Red Sofa", "sofa", sofa.to_str().unwrap()),
            ("2", "Blue Chair", "chair", chair.to_str().unwrap()),
        ],
    );

    let service = SimilarityService::new(test_config()).unwrap();
    let report = service.load(catalog.to_str().unwrap()).unwrap();
    assert_eq!(report.indexed, 2);

    let query = fs::read(&chair).unwrap();
    let results = service
        .find_similar_items_bytes(&query, "chair", 1)
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].product_name, "Blue Chair");
    assert!(
        results[0].similarity_score > 0.999,
        "identical image should score ~1.0, got {}",
        results[0].similarity_score
    );

    let _ = fs::remove_dir_all(&dir);
}

/// One unreachable image out of five must cost exactly one entry.
#[test]
#[ignore = "requires model file (set DECORMATCH_MODEL)"]
fn test_row_failure_isolation() {
    let dir = test_dir();

    let mut links = Vec::new();
    for i in 0..5 {
        let path = dir.join(format!("item-{}.png", i));
        write_test_image(&path, [(i * 40) as u8, 120, 80], [255, 255, 255]);
        links.push(path.to_str().unwrap().to_string());
    }
    // Row 3 points at an image that doesn't exist
    links[2] = dir.join("missing.png").to_str().unwrap().to_string();

    let mut csv = String::from("id,name,purchase_link,type,image_link\n");
    for (i, link) in links.iter().enumerate() {
        csv.push_str(&format!(
            "{},Lamp {},https://shop.example/{},lamp,{}\n",
            i + 1,
            i + 1,
            i + 1,
            link
        ));
    }
    let catalog = dir.join("catalog.csv");
    fs::write(&catalog, csv).unwrap();

    let service = SimilarityService::new(test_config()).unwrap();
    let report = service.load(catalog.to_str().unwrap()).unwrap();

    assert_eq!(report.rows, 5);
    assert_eq!(report.indexed, 4);
    assert_eq!(report.skipped, 1);

    let _ = fs::remove_dir_all(&dir);
}

/// A category absent from the catalog yields an empty list, not an error.
#[test]
#[ignore = "requires model file (set DECORMATCH_MODEL)"]
fn test_unmatched_category_returns_empty() {
    let dir = test_dir();

    let sofa = dir.join("sofa.png");
    write_test_image(&sofa, [180, 90, 30], [250, 250, 250]);
    let catalog = write_catalog(&dir, &[("1", "Sofa", "sofa", sofa.to_str().unwrap())]);

    let service = SimilarityService::new(test_config()).unwrap();
    service.load(catalog.to_str().unwrap()).unwrap();

    let query = fs::read(&sofa).unwrap();
    let results = service
        .find_similar_items_bytes(&query, "wardrobe", 5)
        .unwrap();
    assert!(results.is_empty());

    let _ = fs::remove_dir_all(&dir);
}

/// Catalog categories are matched case- and whitespace-insensitively.
#[test]
#[ignore = "requires model file (set DECORMATCH_MODEL)"]
fn test_category_normalization_end_to_end() {
    let dir = test_dir();

    let sofa = dir.join("sofa.png");
    write_test_image(&sofa, [90, 180, 30], [20, 20, 20]);
    let catalog = write_catalog(&dir, &[("1", "Sofa", " Sofa ", sofa.to_str().unwrap())]);

    let service = SimilarityService::new(test_config()).unwrap();
    service.load(catalog.to_str().unwrap()).unwrap();

    let query = fs::read(&sofa).unwrap();
    let results = service.find_similar_items_bytes(&query, "sofa", 1).unwrap();
    assert_eq!(results.len(), 1);

    let _ = fs::remove_dir_all(&dir);
}

/// Queries against a never-loaded service return empty, never panic.
#[test]
#[ignore = "requires model file (set DECORMATCH_MODEL)"]
fn test_query_before_load_is_empty() {
    let dir = test_dir();

    let crop = dir.join("crop.png");
    write_test_image(&crop, [10, 200, 150], [0, 0, 0]);

    let service = SimilarityService::new(test_config()).unwrap();
    let query = fs::read(&crop).unwrap();
    let results = service.find_similar_items_bytes(&query, "chair", 3).unwrap();
    assert!(results.is_empty());

    let _ = fs::remove_dir_all(&dir);
}

/// Undecodable query bytes are an error, not an empty result.
#[test]
#[ignore = "requires model file (set DECORMATCH_MODEL)"]
fn test_undecodable_query_is_an_error() {
    let dir = test_dir();

    let sofa = dir.join("sofa.png");
    write_test_image(&sofa, [120, 60, 60], [255, 255, 255]);
    let catalog = write_catalog(&dir, &[("1", "Sofa", "sofa", sofa.to_str().unwrap())]);

    let service = SimilarityService::new(test_config()).unwrap();
    service.load(catalog.to_str().unwrap()).unwrap();

    let result = service.find_similar_items_bytes(b"not an image", "sofa", 1);
    assert!(result.is_err());

    let _ = fs::remove_dir_all(&dir);
}

/// A second load fully replaces the first index.
#[test]
#[ignore = "requires model file (set DECORMATCH_MODEL)"]
fn test_reload_replaces_index() {
    let dir = test_dir();

    let sofa = dir.join("sofa.png");
    let chair = dir.join("chair.png");
    write_test_image(&sofa, [200, 40, 40], [240, 240, 240]);
    write_test_image(&chair, [40, 40, 200], [10, 10, 10]);

    let first = write_catalog(&dir, &[("1", "Sofa", "sofa", sofa.to_str().unwrap())]);
    let service = SimilarityService::new(test_config()).unwrap();
    service.load(first.to_str().unwrap()).unwrap();
    assert_eq!(service.current().len(), 1);

    let second = write_catalog(
        &dir,
        &[
            ("1", "Sofa", "sofa", sofa.to_str().unwrap()),
            ("2", "Chair", "chair", chair.to_str().unwrap()),
        ],
    );
    service.load(second.to_str().unwrap()).unwrap();
    assert_eq!(service.current().len(), 2);

    let _ = fs::remove_dir_all(&dir);
}
