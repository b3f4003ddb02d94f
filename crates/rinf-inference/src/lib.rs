//! Inference backend abstraction for rinf.
//!
//! A backend takes a stacked input tensor and returns the model outputs.
//! Two ONNX runtimes are available behind features:
//! - `native`: `ort` with the XNNPACK execution provider
//! - `tract`: pure-Rust `tract`, compiled for single-sample plans

mod backend;
mod error;
mod tensor;

pub use backend::InferenceBackend;
pub use error::BackendError;
pub use tensor::{InputTensor, OutputTensor, TensorType};

#[cfg(feature = "native")]
pub use backend::ort::OrtBackend;

#[cfg(feature = "tract")]
pub use backend::tract::TractBackend;

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;
