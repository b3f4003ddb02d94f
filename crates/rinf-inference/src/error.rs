//! Error types for the backend layer.

use thiserror::Error;

/// Errors raised by an inference backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The weight blob could not be turned into a runnable model.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Failed to create an inference session.
    #[error("failed to create session: {0}")]
    SessionCreate(String),

    /// Input tensor has the wrong shape or type for the model.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The forward pass itself failed.
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    /// Output tensor extraction failed.
    #[error("failed to extract output: {0}")]
    OutputExtraction(String),
}
