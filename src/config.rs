use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default location of the exported feature-extraction backbone
const DEFAULT_MODEL_PATH: &str = "models/resnet50-features.onnx";
/// Output vector length of the default backbone
const DEFAULT_EMBEDDING_DIMS: usize = 2048;
/// Per-image fetch timeout during catalog loads
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
/// Matches returned when the caller doesn't ask for a count
const DEFAULT_TOP_N: usize = 1;

/// Configuration for the similarity matcher
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Path to the ONNX feature-extraction model
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Embedding vector length produced by the model
    #[serde(default = "default_embedding_dims")]
    pub embedding_dims: usize,

    /// Timeout for each catalog image fetch, in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Parallelism for catalog image fetches: "auto" or a positive integer
    #[serde(default = "default_fetch_parallelism")]
    pub fetch_parallelism: String,

    /// Default number of matches per query
    #[serde(default = "default_top_n")]
    pub default_top_n: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            embedding_dims: DEFAULT_EMBEDDING_DIMS,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            fetch_parallelism: "auto".to_string(),
            default_top_n: DEFAULT_TOP_N,
        }
    }
}

impl MatcherConfig {
    /// Resolve the fetch parallelism knob to a thread count.
    pub fn fetch_threads(&self) -> usize {
        match self.fetch_parallelism.as_str() {
            "auto" => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            n => n.parse().unwrap_or(1),
        }
    }
}

fn default_model_path() -> PathBuf {
    PathBuf::from(DEFAULT_MODEL_PATH)
}

fn default_embedding_dims() -> usize {
    DEFAULT_EMBEDDING_DIMS
}

fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

fn default_fetch_parallelism() -> String {
    "auto".to_string()
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub matcher: MatcherConfig,
}

impl Config {
    fn validate(&self) {
        let matcher = &self.matcher;

        if matcher.embedding_dims == 0 {
            panic!("matcher.embedding_dims must be greater than 0");
        }

        if matcher.fetch_timeout_secs == 0 {
            panic!("matcher.fetch_timeout_secs must be greater than 0");
        }

        if matcher.default_top_n == 0 {
            panic!("matcher.default_top_n must be greater than 0");
        }

        // validate fetch_parallelism: "auto" or positive integer
        if matcher.fetch_parallelism != "auto" {
            match matcher.fetch_parallelism.parse::<u32>() {
                Ok(0) => panic!(
                    "matcher.fetch_parallelism must be 'auto' or a positive integer, got '0'"
                ),
                Err(_) => panic!(
                    "matcher.fetch_parallelism must be 'auto' or a positive integer, got '{}'",
                    matcher.fetch_parallelism
                ),
                Ok(_) => {}
            }
        }
    }

    /// Load configuration from a YAML file, falling back to defaults when the
    /// file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        let config: Self = if path.exists() {
            let raw = std::fs::read_to_string(path).expect("config file is not readable");
            serde_yml::from_str(&raw).expect("config is malformed")
        } else {
            Self::default()
        };

        config.validate();
        config
    }
}
