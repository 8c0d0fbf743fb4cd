//! Image preprocessing for embedding extraction.
//!
//! Prepares an RGB image for the feature extractor:
//! 1. Resize shortest side to 256, preserving aspect ratio
//! 2. Center-crop to 224x224
//! 3. Scale pixel values to [0, 1]
//! 4. Normalize per channel with ImageNet mean/std
//!
//! Catalog images and query crops go through the exact same path; similarity
//! scores are only comparable when both sides are preprocessed identically.
//!
//! Also home to category label normalization, which must match between
//! catalog rows and query labels.

use image::{imageops::FilterType, DynamicImage, GenericImageView};

/// Shortest-side target before cropping
pub const RESIZE_TARGET: u32 = 256;

/// Square crop fed to the model
pub const CROP_SIZE: u32 = 224;

/// Per-channel mean of the backbone's training distribution (RGB)
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Per-channel std of the backbone's training distribution (RGB)
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Detector labels that name catalog categories differently
const CATEGORY_ALIASES: &[(&str, &str)] = &[
    ("couch", "sofa"),
    ("dining table", "table"),
    ("coffee table", "table"),
    ("potted plant", "plant"),
];

/// Convert an image into an NCHW `[1, 3, 224, 224]` tensor buffer.
///
/// Works for any input of at least 1x1 pixels; smaller images are upscaled
/// by the shortest-side resize before cropping.
pub fn image_to_tensor(image: &DynamicImage) -> (Vec<usize>, Vec<f32>) {
    let (w, h) = image.dimensions();

    // Shortest side to RESIZE_TARGET, other side scaled proportionally
    let scale = RESIZE_TARGET as f32 / w.min(h).max(1) as f32;
    let new_w = ((w as f32) * scale).round().max(1.0) as u32;
    let new_h = ((h as f32) * scale).round().max(1.0) as u32;
    let resized = image
        .resize_exact(new_w, new_h, FilterType::Triangle)
        .to_rgb8();

    let x0 = new_w.saturating_sub(CROP_SIZE) / 2;
    let y0 = new_h.saturating_sub(CROP_SIZE) / 2;

    let size = CROP_SIZE as usize;
    let mut data = vec![0.0f32; 3 * size * size];
    for y in 0..size {
        for x in 0..size {
            let px = resized.get_pixel(x0 + x as u32, y0 + y as u32);
            let idx = y * size + x;
            for c in 0..3 {
                data[c * size * size + idx] =
                    (px[c] as f32 / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
            }
        }
    }

    (vec![1, 3, size, size], data)
}

/// Normalize a category label for comparison: trim and lowercase.
pub fn normalize_category(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Map a detector class name onto the catalog's category vocabulary.
///
/// Detectors label a sofa "couch" and a table "dining table"; the catalog
/// uses its own vocabulary. Unknown labels pass through normalized.
pub fn canonical_category(label: &str) -> String {
    let normalized = normalize_category(label);
    CATEGORY_ALIASES
        .iter()
        .find(|(from, _)| *from == normalized)
        .map(|(_, to)| (*to).to_string())
        .unwrap_or(normalized)
}
