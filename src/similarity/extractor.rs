//! ONNX feature extractor for product images and query crops.
//!
//! Wraps a pretrained convolutional backbone (ResNet-50 with the classifier
//! head removed, exported to ONNX) behind a process-wide handle:
//! - Session loaded once at construction, resident for the process lifetime
//! - Inference-only: same input bytes always produce the same vector
//! - Batch size 1; input/output tensor names are read from the graph

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::DynamicImage;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;

use crate::similarity::preprocess;

/// Error type for embedding extraction
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitFailed(String),

    #[error("Image decode failed: {0}")]
    ImageDecode(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Embedding has {got} values, expected {expected}")]
    Dimensions { expected: usize, got: usize },
}

/// Feature extractor over an ONNX backbone.
/// Uses a Mutex because ort's run() requires &mut self; concurrent callers
/// serialize on the session.
pub struct FeatureExtractor {
    session: Mutex<Session>,
    model_path: PathBuf,
    dimensions: usize,
}

impl FeatureExtractor {
    /// Load the backbone from an ONNX file.
    ///
    /// # Arguments
    /// * `model_path` - Path to the exported feature-extraction graph
    /// * `dimensions` - Expected output vector length (2048 for ResNet-50)
    pub fn new(model_path: &Path, dimensions: usize) -> Result<Self, EmbeddingError> {
        log::info!("Loading feature extractor from {}", model_path.display());

        let session = Session::builder()
            .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?
            .with_intra_threads(4)
            .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| {
                EmbeddingError::InitFailed(format!(
                    "Failed to load model from {}: {}",
                    model_path.display(),
                    e
                ))
            })?;

        log::info!("Feature extractor loaded ({} dims)", dimensions);

        Ok(Self {
            session: Mutex::new(session),
            model_path: model_path.to_path_buf(),
            dimensions,
        })
    }

    /// Get the model file this extractor was loaded from.
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Get the embedding vector length.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Run a forward pass and return the feature vector for one image.
    pub fn embed(&self, image: &DynamicImage) -> Result<Vec<f32>, EmbeddingError> {
        let pixels = preprocess::image_to_tensor(image);
        let input = Tensor::from_array(pixels)
            .map_err(|e| EmbeddingError::Inference(format!("input tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| EmbeddingError::Inference(format!("session lock poisoned: {}", e)))?;

        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .ok_or_else(|| EmbeddingError::Inference("model has no inputs".to_string()))?;
        let output_name = session
            .outputs()
            .first()
            .map(|o| o.name().to_string())
            .ok_or_else(|| EmbeddingError::Inference("model has no outputs".to_string()))?;

        let outputs = session
            .run(ort::inputs![input_name => input])
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;

        let output = outputs
            .get(&output_name)
            .ok_or_else(|| EmbeddingError::Inference(format!("no output '{}'", output_name)))?;

        let (_shape, values) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;

        // [1, d] and [1, d, 1, 1] both flatten to d values
        let embedding = values.to_vec();
        if embedding.len() != self.dimensions {
            return Err(EmbeddingError::Dimensions {
                expected: self.dimensions,
                got: embedding.len(),
            });
        }
        if embedding.iter().any(|v| !v.is_finite()) {
            return Err(EmbeddingError::Inference(
                "embedding contains non-finite values".to_string(),
            ));
        }

        Ok(embedding)
    }
}
