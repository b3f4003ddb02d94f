//! Core library for batched image classification.
//!
//! This crate provides:
//! - Keyed records that carry a key through every stage
//! - Record loading through object stores and ImageNet-style preprocessing
//! - A model registry and lazily loaded, load-once model handles
//! - The batched `RunInference` stage and argmax postprocessing
//! - An in-process pipeline runner with parallel workers

pub mod batcher;
pub mod config;
pub mod error;
pub mod loader;
pub mod model;
pub mod pipeline;
pub mod postprocess;
pub mod preprocess;
pub mod record;
pub mod sink;
pub mod stage;
pub mod storage;

pub use batcher::{BatchConfig, Batcher};
pub use config::RinfConfig;
pub use error::{PipelineError, Result};
pub use loader::RecordLoader;
pub use model::{ModelHandle, ModelParams, ModelRegistry, ModelSpec};
pub use pipeline::{CancelToken, FailurePolicy, JobReport, JobSpec, Pipeline};
pub use preprocess::ImagePreprocessor;
pub use record::{Batch, Keyed, Prediction, Sample};
pub use sink::ResultSink;
pub use stage::RunInference;
pub use storage::{LocalStore, ObjectStore};

/// Re-export inference types.
pub use rinf_inference::{InferenceBackend, InputTensor, OutputTensor};

#[cfg(feature = "native")]
pub use rinf_inference::OrtBackend;

#[cfg(feature = "tract")]
pub use rinf_inference::TractBackend;
