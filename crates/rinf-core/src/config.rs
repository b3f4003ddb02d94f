//! Configuration structures for a classification job.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::batcher::BatchConfig;
use crate::error::PipelineError;
use crate::model::{ModelParams, ModelSpec};
use crate::pipeline::FailurePolicy;
use crate::preprocess::{ImagePreprocessor, IMAGENET_MEAN, IMAGENET_STD};

/// Main configuration for rinf.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RinfConfig {
    /// Batching and worker settings.
    pub inference: InferenceConfig,

    /// Image preprocessing settings.
    pub preprocess: PreprocessConfig,

    /// Model selection.
    pub model: ModelConfig,

    /// Input handling and failure policy.
    pub pipeline: PipelineConfig,
}

/// Batching and worker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Maximum samples per inference call.
    pub max_batch_size: usize,

    /// Flush a partial batch after this many milliseconds (null disables).
    pub max_wait_ms: Option<u64>,

    /// Number of parallel workers, each with its own model copy.
    pub workers: usize,

    /// Bounded queue length in front of each worker.
    pub queue_capacity: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 8,
            max_wait_ms: Some(50),
            workers: 4,
            queue_capacity: 64,
        }
    }
}

/// Image preprocessing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Side of the square resize target.
    pub image_size: u32,

    /// Per-channel mean subtracted after scaling to [0, 1].
    pub mean: [f32; 3],

    /// Per-channel standard deviation divided by.
    pub std: [f32; 3],
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            image_size: 224,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }
}

/// Model selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Registered architecture identifier.
    pub architecture: String,

    /// Number of output classes.
    pub num_classes: usize,

    /// Intra-op threads per model instance.
    pub intra_threads: usize,

    /// Architecture-specific constructor parameters.
    pub params: serde_json::Map<String, serde_json::Value>,

    /// Weight locator used when none is given on the command line.
    pub state_dict_path: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            architecture: "mobilenet_v2".to_string(),
            num_classes: 1000,
            intra_threads: 4,
            params: serde_json::Map::new(),
            state_dict_path: None,
        }
    }
}

/// Input handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Leading lines of the input listing to ignore.
    pub skip_header_lines: usize,

    /// What to do with a record that fails to load or preprocess.
    pub failure_policy: FailurePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            skip_header_lines: 1,
            failure_policy: FailurePolicy::FailFast,
        }
    }
}

impl RinfConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }

    /// Reject values that cannot produce a working job.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let bad = |msg: &str| Err(PipelineError::Config(msg.to_string()));

        if self.inference.max_batch_size == 0 {
            return bad("inference.max_batch_size must be at least 1");
        }
        if self.inference.workers == 0 {
            return bad("inference.workers must be at least 1");
        }
        if self.inference.queue_capacity == 0 {
            return bad("inference.queue_capacity must be at least 1");
        }
        if self.preprocess.image_size == 0 {
            return bad("preprocess.image_size must be at least 1");
        }
        if self.preprocess.std.iter().any(|s| *s == 0.0 || !s.is_finite()) {
            return bad("preprocess.std must be finite and non-zero");
        }
        if self.model.num_classes == 0 {
            return bad("model.num_classes must be at least 1");
        }
        if self.model.architecture.trim().is_empty() {
            return bad("model.architecture must not be empty");
        }
        Ok(())
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            max_batch_size: self.inference.max_batch_size,
            max_wait: self.inference.max_wait_ms.map(Duration::from_millis),
        }
    }

    pub fn preprocessor(&self) -> ImagePreprocessor {
        ImagePreprocessor::new()
            .with_target_size(self.preprocess.image_size)
            .with_normalization(self.preprocess.mean, self.preprocess.std)
    }

    /// Model spec for the given weights locator.
    pub fn model_spec(&self, weights: impl Into<String>) -> ModelSpec {
        ModelSpec::new(self.model.architecture.clone(), weights).with_params(ModelParams {
            num_classes: self.model.num_classes,
            image_size: self.preprocess.image_size,
            intra_threads: self.model.intra_threads,
            extra: self.model.params.clone(),
        })
    }
}
