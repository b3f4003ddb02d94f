//! ONNX Runtime (ort) backend for native platforms with XNNPACK.

use std::sync::Mutex;

use ndarray::{ArrayD, IxDyn};
use ort::ep::XNNPACK;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tracing::debug;

use crate::error::BackendError;
use crate::tensor::{InputTensor, OutputTensor};
use crate::{InferenceBackend, Result};

/// Backend using ONNX Runtime for native inference.
pub struct OrtBackend {
    session: Mutex<Session>,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl OrtBackend {
    /// Load a model from an in-memory ONNX blob.
    pub fn from_bytes(bytes: &[u8], intra_threads: usize) -> Result<Self> {
        debug!(
            "Loading ONNX model from {} bytes ({} intra-op threads)",
            bytes.len(),
            intra_threads
        );

        let session = Session::builder()
            .map_err(|e| BackendError::SessionCreate(e.to_string()))?
            .with_execution_providers([XNNPACK::default().build()])
            .map_err(|e| BackendError::SessionCreate(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| BackendError::SessionCreate(e.to_string()))?
            .with_intra_threads(intra_threads.max(1))
            .map_err(|e| BackendError::SessionCreate(e.to_string()))?
            .commit_from_memory(bytes)
            .map_err(|e| BackendError::ModelLoad(e.to_string()))?;

        let input_names: Vec<String> = session
            .inputs()
            .iter()
            .map(|i| i.name().to_string())
            .collect();

        let output_names: Vec<String> = session
            .outputs()
            .iter()
            .map(|o| o.name().to_string())
            .collect();

        if input_names.is_empty() || output_names.is_empty() {
            return Err(BackendError::ModelLoad(
                "model declares no inputs or no outputs".to_string(),
            ));
        }

        debug!("Model inputs: {:?}", input_names);
        debug!("Model outputs: {:?}", output_names);

        Ok(Self {
            session: Mutex::new(session),
            input_names,
            output_names,
        })
    }

    fn convert_input(tensor: &InputTensor) -> Result<ort::session::SessionInputValue<'static>> {
        let arr = tensor.as_f32();
        let shape: Vec<i64> = arr.shape().iter().map(|&s| s as i64).collect();
        let data: Vec<f32> = arr.iter().cloned().collect();
        Tensor::from_array((shape, data))
            .map(Into::into)
            .map_err(|e| BackendError::InvalidInput(e.to_string()))
    }
}

impl InferenceBackend for OrtBackend {
    fn run(&self, inputs: &[(&str, InputTensor)]) -> Result<Vec<(String, OutputTensor)>> {
        let ort_inputs: Vec<(&str, ort::session::SessionInputValue<'static>)> = inputs
            .iter()
            .map(|(name, tensor)| Ok((*name, Self::convert_input(tensor)?)))
            .collect::<Result<Vec<_>>>()?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| BackendError::InferenceFailed(format!("Failed to lock session: {}", e)))?;

        let outputs = session
            .run(ort_inputs)
            .map_err(|e| BackendError::InferenceFailed(e.to_string()))?;

        let mut results = Vec::with_capacity(outputs.len());

        for (name, value) in outputs.iter() {
            let tensor = if let Ok((shape, data)) = value.try_extract_tensor::<f32>() {
                OutputTensor::Float32(to_array(shape, data)?)
            } else if let Ok((shape, data)) = value.try_extract_tensor::<f64>() {
                OutputTensor::Float64(to_array(shape, data)?)
            } else if let Ok((shape, data)) = value.try_extract_tensor::<i64>() {
                OutputTensor::Int64(to_array(shape, data)?)
            } else {
                return Err(BackendError::OutputExtraction(format!(
                    "unsupported output type for '{}'",
                    name
                )));
            };

            results.push((name.to_string(), tensor));
        }

        Ok(results)
    }

    fn input_names(&self) -> &[String] {
        &self.input_names
    }

    fn output_names(&self) -> &[String] {
        &self.output_names
    }
}

fn to_array<T: Clone>(shape: &[i64], data: &[T]) -> Result<ArrayD<T>> {
    let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
    ArrayD::from_shape_vec(IxDyn(&dims), data.to_vec())
        .map_err(|e| BackendError::OutputExtraction(e.to_string()))
}
