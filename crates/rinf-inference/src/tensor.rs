//! Tensor types for backend input/output.

use ndarray::{Array2, ArrayD, Ix2, IxDyn};

use crate::{BackendError, Result};

/// Element types a backend can hand back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorType {
    Float32,
    Float64,
    Int64,
}

/// Input tensor for inference.
///
/// Image classifiers only consume `f32` NCHW input, so that is the one
/// variant carried here.
#[derive(Debug, Clone)]
pub enum InputTensor {
    Float32(ArrayD<f32>),
}

impl InputTensor {
    /// Get the shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        match self {
            InputTensor::Float32(arr) => arr.shape(),
        }
    }

    /// Get the data type of the tensor.
    pub fn dtype(&self) -> TensorType {
        match self {
            InputTensor::Float32(_) => TensorType::Float32,
        }
    }

    /// Leading (batch) dimension, or 0 for a scalar.
    pub fn batch_len(&self) -> usize {
        self.shape().first().copied().unwrap_or(0)
    }

    /// Create a Float32 tensor from raw data and shape.
    pub fn from_f32(data: Vec<f32>, shape: &[usize]) -> Result<Self> {
        let arr = ArrayD::from_shape_vec(IxDyn(shape), data)
            .map_err(|e| BackendError::InvalidInput(e.to_string()))?;
        Ok(InputTensor::Float32(arr))
    }

    /// Borrow the inner `f32` array.
    pub fn as_f32(&self) -> &ArrayD<f32> {
        match self {
            InputTensor::Float32(arr) => arr,
        }
    }
}

/// Output tensor from inference.
#[derive(Debug, Clone)]
pub enum OutputTensor {
    Float32(ArrayD<f32>),
    Float64(ArrayD<f64>),
    Int64(ArrayD<i64>),
}

impl OutputTensor {
    /// Get the shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        match self {
            OutputTensor::Float32(arr) => arr.shape(),
            OutputTensor::Float64(arr) => arr.shape(),
            OutputTensor::Int64(arr) => arr.shape(),
        }
    }

    /// Get the data type of the tensor.
    pub fn dtype(&self) -> TensorType {
        match self {
            OutputTensor::Float32(_) => TensorType::Float32,
            OutputTensor::Float64(_) => TensorType::Float64,
            OutputTensor::Int64(_) => TensorType::Int64,
        }
    }

    /// Try to get the inner Float32 array.
    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            OutputTensor::Float32(arr) => Some(arr),
            _ => None,
        }
    }

    /// Convert a `[batch, classes]` score tensor into an `f32` matrix.
    ///
    /// `f64` scores are narrowed; integer outputs are rejected since they
    /// are not per-class scores.
    pub fn into_scores(self) -> Result<Array2<f32>> {
        let scores = match self {
            OutputTensor::Float32(arr) => arr,
            OutputTensor::Float64(arr) => arr.mapv(|v| v as f32),
            OutputTensor::Int64(arr) => {
                return Err(BackendError::OutputExtraction(format!(
                    "expected float scores, got int64 tensor of shape {:?}",
                    arr.shape()
                )));
            }
        };

        let shape = scores.shape().to_vec();
        scores.into_dimensionality::<Ix2>().map_err(|_| {
            BackendError::OutputExtraction(format!(
                "expected [batch, classes] scores, got shape {:?}",
                shape
            ))
        })
    }
}
