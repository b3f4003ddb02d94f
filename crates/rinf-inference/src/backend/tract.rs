//! Tract backend for pure-Rust ONNX inference.
//!
//! Tract wants concrete input facts, so the plan is compiled for a single
//! sample. Batched inputs are run one row at a time and the output rows are
//! concatenated back in input order.

use ndarray::{concatenate, ArrayD, Axis};
use tract_onnx::prelude::*;
use tracing::{debug, trace};

use crate::error::BackendError;
use crate::tensor::{InputTensor, OutputTensor};
use crate::{InferenceBackend, Result};

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Backend using Tract for ONNX inference without native libraries.
pub struct TractBackend {
    model: Plan,
    sample_shape: Vec<usize>,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl TractBackend {
    /// Load a model from bytes for `channels x height x width` samples.
    pub fn from_bytes(bytes: &[u8], sample_shape: &[usize]) -> Result<Self> {
        debug!("Loading ONNX model with Tract from {} bytes", bytes.len());

        let mut input_shape = vec![1usize];
        input_shape.extend_from_slice(sample_shape);

        let mut model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(bytes))
            .map_err(|e| BackendError::ModelLoad(format!("Failed to load model: {}", e)))?;

        model
            .set_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), &input_shape))
            .map_err(|e| BackendError::ModelLoad(format!("Failed to set input shape: {}", e)))?;

        let model = model
            .into_typed()
            .map_err(|e| BackendError::ModelLoad(format!("Failed to type model: {}", e)))?
            .into_optimized()
            .map_err(|e| BackendError::ModelLoad(format!("Failed to optimize: {}", e)))?
            .into_runnable()
            .map_err(|e| BackendError::SessionCreate(e.to_string()))?;

        Ok(Self {
            model,
            sample_shape: sample_shape.to_vec(),
            input_names: vec!["input".to_string()],
            output_names: vec!["output".to_string()],
        })
    }

    fn run_row(&self, row: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let shape: TVec<usize> = row.shape().iter().cloned().collect();
        let data: Vec<f32> = row.iter().cloned().collect();
        let input = tract_ndarray::ArrayD::from_shape_vec(
            tract_ndarray::IxDyn(shape.as_slice()),
            data,
        )
        .map_err(|e| BackendError::InvalidInput(e.to_string()))?;

        let outputs = self
            .model
            .run(tvec!(input.into_tvalue()))
            .map_err(|e| BackendError::InferenceFailed(e.to_string()))?;

        let output = outputs
            .first()
            .ok_or_else(|| BackendError::OutputExtraction("model produced no outputs".to_string()))?;

        let view = output
            .to_array_view::<f32>()
            .map_err(|e| BackendError::OutputExtraction(e.to_string()))?;
        let out_shape: Vec<usize> = view.shape().to_vec();
        let out_data: Vec<f32> = view.iter().cloned().collect();

        ArrayD::from_shape_vec(ndarray::IxDyn(&out_shape), out_data)
            .map_err(|e| BackendError::OutputExtraction(e.to_string()))
    }
}

impl InferenceBackend for TractBackend {
    fn run(&self, inputs: &[(&str, InputTensor)]) -> Result<Vec<(String, OutputTensor)>> {
        let (_, tensor) = inputs
            .first()
            .ok_or_else(|| BackendError::InvalidInput("no input tensor given".to_string()))?;
        let batch = tensor.as_f32();

        if batch.ndim() != self.sample_shape.len() + 1 || batch.shape()[1..] != self.sample_shape[..] {
            return Err(BackendError::InvalidInput(format!(
                "expected [N, {:?}] input, got {:?}",
                self.sample_shape,
                batch.shape()
            )));
        }

        let mut rows = Vec::with_capacity(batch.len_of(Axis(0)));
        for i in 0..batch.len_of(Axis(0)) {
            let row = batch.slice_axis(Axis(0), (i..=i).into()).to_owned();
            rows.push(self.run_row(row)?);
        }
        trace!("Tract ran {} single-sample passes", rows.len());

        let views: Vec<_> = rows.iter().map(|r| r.view()).collect();
        let stacked = concatenate(Axis(0), &views)
            .map_err(|e| BackendError::OutputExtraction(e.to_string()))?;

        Ok(vec![(self.output_names[0].clone(), OutputTensor::Float32(stacked))])
    }

    fn input_names(&self) -> &[String] {
        &self.input_names
    }

    fn output_names(&self) -> &[String] {
        &self.output_names
    }
}
