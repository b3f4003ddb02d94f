//! Model specification, architecture registry and the per-worker handle.

mod handle;
mod pooled_linear;
mod registry;

pub use handle::ModelHandle;
pub use pooled_linear::{PooledLinear, PooledLinearWeights};
pub use registry::{ModelConstructor, ModelRegistry};

use serde::{Deserialize, Serialize};

/// Constructor parameters handed to the architecture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParams {
    /// Width of the output score vector.
    pub num_classes: usize,

    /// Side of the square input the model expects.
    pub image_size: u32,

    /// Intra-op threads for runtimes that have a thread pool.
    pub intra_threads: usize,

    /// Architecture-specific extras.
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            num_classes: 1000,
            image_size: 224,
            intra_threads: 4,
            extra: serde_json::Map::new(),
        }
    }
}

/// Everything needed to build a model: which architecture, which weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Registry identifier, e.g. `mobilenet_v2` or `pooled_linear`.
    pub architecture: String,

    /// Locator of the weight blob.
    pub weights: String,

    pub params: ModelParams,
}

impl ModelSpec {
    pub fn new(architecture: impl Into<String>, weights: impl Into<String>) -> Self {
        Self {
            architecture: architecture.into(),
            weights: weights.into(),
            params: ModelParams::default(),
        }
    }

    pub fn with_params(mut self, params: ModelParams) -> Self {
        self.params = params;
        self
    }
}
