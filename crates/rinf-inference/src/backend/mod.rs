//! Inference backend implementations.

#[cfg(feature = "native")]
pub mod ort;

#[cfg(feature = "tract")]
pub mod tract;

use crate::{BackendError, InputTensor, OutputTensor, Result};

/// A loaded model that can run forward passes.
///
/// Implementations must be usable from several threads at once through a
/// shared reference; a backend is never mutated after construction from
/// the caller's point of view.
pub trait InferenceBackend: Send + Sync {
    /// Run inference with the given named inputs.
    ///
    /// # Arguments
    /// * `inputs` - Named input tensors
    ///
    /// # Returns
    /// Named output tensors from the model
    fn run(&self, inputs: &[(&str, InputTensor)]) -> Result<Vec<(String, OutputTensor)>>;

    /// Get the input names expected by the model.
    fn input_names(&self) -> &[String];

    /// Get the output names produced by the model.
    fn output_names(&self) -> &[String];

    /// Feed one tensor to the first model input and return the first output.
    fn run_single(&self, input: InputTensor) -> Result<OutputTensor> {
        let name = self
            .input_names()
            .first()
            .cloned()
            .unwrap_or_else(|| "input".to_string());

        self.run(&[(name.as_str(), input)])?
            .into_iter()
            .next()
            .map(|(_, tensor)| tensor)
            .ok_or_else(|| BackendError::OutputExtraction("model produced no outputs".to_string()))
    }
}
