//! Error types for the rinf-core library.

use thiserror::Error;

/// Main error type for a classification job.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The worker's model could not be loaded. Fatal for that worker.
    #[error("model load error: {0}")]
    ModelLoad(#[from] ModelLoadError),

    /// A record could not be read or decoded.
    #[error("record load error: {0}")]
    RecordLoad(#[from] RecordLoadError),

    /// A decoded image could not be turned into a sample.
    #[error("preprocessing error: {0}")]
    Preprocess(#[from] PreprocessError),

    /// A whole batch failed during inference.
    #[error("inference error: {0}")]
    Inference(#[from] InferenceError),

    /// A prediction could not be reduced to a class index.
    #[error("post-processing error: {0}")]
    Postprocess(#[from] PostprocessError),

    /// Writing results failed.
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// The input listing could not be read.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The job was cancelled before it finished.
    #[error("job cancelled")]
    Cancelled,

    /// A worker thread panicked.
    #[error("worker {0} panicked")]
    WorkerPanic(usize),
}

/// Errors related to acquiring the model handle.
#[derive(Error, Debug)]
pub enum ModelLoadError {
    /// No constructor is registered under this identifier.
    #[error("unknown architecture '{0}'")]
    UnknownArchitecture(String),

    /// The weight blob could not be read.
    #[error("failed to read weights from {locator}: {source}")]
    WeightSource {
        locator: String,
        #[source]
        source: StorageError,
    },

    /// The weights do not fit the requested architecture.
    #[error("{architecture} cannot be built from the given weights: {reason}")]
    Incompatible { architecture: String, reason: String },

    /// An earlier load attempt on this handle failed.
    #[error("model failed to load earlier: {0}")]
    PreviouslyFailed(String),

    /// The handle was closed.
    #[error("model handle is closed")]
    Closed,

    /// A thread panicked while holding the handle lock.
    #[error("model handle lock poisoned")]
    Poisoned,
}

/// Errors related to reading and decoding a single record.
#[derive(Error, Debug)]
pub enum RecordLoadError {
    /// The bytes could not be read.
    #[error("failed to read {key}: {source}")]
    Read {
        key: String,
        #[source]
        source: StorageError,
    },

    /// The bytes are not a decodable image.
    #[error("failed to decode {key}: {reason}")]
    Decode { key: String, reason: String },
}

/// Errors related to preprocessing a decoded image.
#[derive(Error, Debug)]
pub enum PreprocessError {
    /// The image has a zero dimension.
    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// The produced tensor does not have the canonical shape.
    #[error("expected sample shape {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
}

/// A failed inference call. Always reported for the whole batch.
#[derive(Error, Debug)]
#[error("batch of {batch_size} (first key {first_key}) failed: {reason}")]
pub struct InferenceError {
    pub batch_size: usize,
    pub first_key: String,
    pub reason: String,
}

/// Errors related to reducing a prediction to a label.
#[derive(Error, Debug)]
pub enum PostprocessError {
    /// The score vector is empty or contains no comparable values.
    #[error("malformed prediction for {key}: {reason}")]
    MalformedPrediction { key: String, reason: String },
}

/// Errors related to writing results.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The output could not be created.
    #[error("failed to open output {locator}: {source}")]
    Open {
        locator: String,
        #[source]
        source: StorageError,
    },

    /// Writing a line failed.
    #[error("failed to write output: {0}")]
    Write(#[from] std::io::Error),
}

/// Errors related to the object store.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Nothing exists at the locator.
    #[error("not found: {0}")]
    NotFound(String),

    /// I/O error while accessing a locator.
    #[error("I/O error on {locator}: {source}")]
    Io {
        locator: String,
        #[source]
        source: std::io::Error,
    },

    /// A remote store returned an error.
    #[error("remote error on {locator}: {reason}")]
    Remote { locator: String, reason: String },

    /// The store cannot perform this operation on this locator.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Result type for the rinf-core library.
pub type Result<T> = std::result::Result<T, PipelineError>;
