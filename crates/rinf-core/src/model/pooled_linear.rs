//! A pure-Rust baseline classifier: channel mean pooling + linear layer.
//!
//! Each sample is reduced to its three per-channel means, multiplied by a
//! `[classes, 3]` weight matrix, shifted by a bias and softmaxed. Rows are
//! computed independently so a sample scores the same in any batch.

use ndarray::{s, Array2, ArrayView4, Ix4};
use serde::{Deserialize, Serialize};
use tracing::debug;

use rinf_inference::{BackendError, InferenceBackend, InputTensor, OutputTensor};

const CHANNELS: usize = 3;

/// On-disk weights: JSON `{"weight": [[f32; 3]; C], "bias": [f32; C]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PooledLinearWeights {
    pub weight: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
}

/// Loaded pooled-linear model.
pub struct PooledLinear {
    weight: Array2<f32>,
    bias: Vec<f32>,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl PooledLinear {
    /// Parse a JSON state dict and check it against `num_classes`.
    pub fn from_state_dict(bytes: &[u8], num_classes: usize) -> Result<Self, BackendError> {
        let weights: PooledLinearWeights = serde_json::from_slice(bytes)
            .map_err(|e| BackendError::ModelLoad(format!("invalid state dict: {}", e)))?;
        Self::from_weights(weights, num_classes)
    }

    pub fn from_weights(
        weights: PooledLinearWeights,
        num_classes: usize,
    ) -> Result<Self, BackendError> {
        if weights.weight.len() != num_classes || weights.bias.len() != num_classes {
            return Err(BackendError::ModelLoad(format!(
                "expected {} classes, state dict has {} weight rows and {} biases",
                num_classes,
                weights.weight.len(),
                weights.bias.len()
            )));
        }

        if let Some(row) = weights.weight.iter().position(|r| r.len() != CHANNELS) {
            return Err(BackendError::ModelLoad(format!(
                "weight row {} has {} columns, expected {}",
                row,
                weights.weight[row].len(),
                CHANNELS
            )));
        }

        let flat: Vec<f32> = weights.weight.into_iter().flatten().collect();
        let weight = Array2::from_shape_vec((num_classes, CHANNELS), flat)
            .map_err(|e| BackendError::ModelLoad(e.to_string()))?;

        debug!("Built pooled-linear model with {} classes", num_classes);

        Ok(Self {
            weight,
            bias: weights.bias,
            input_names: vec!["input".to_string()],
            output_names: vec!["scores".to_string()],
        })
    }

    fn forward(&self, batch: ArrayView4<'_, f32>) -> Array2<f32> {
        let (n, _, h, w) = batch.dim();
        let area = (h * w).max(1) as f32;
        let classes = self.bias.len();
        let mut scores = Array2::<f32>::zeros((n, classes));

        for i in 0..n {
            let mut pooled = [0f32; CHANNELS];
            for (c, p) in pooled.iter_mut().enumerate() {
                *p = batch.slice(s![i, c, .., ..]).iter().sum::<f32>() / area;
            }

            let mut row = scores.row_mut(i);
            for k in 0..classes {
                let mut logit = self.bias[k];
                for (c, p) in pooled.iter().enumerate() {
                    logit += self.weight[[k, c]] * p;
                }
                row[k] = logit;
            }

            // softmax
            let max = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
            row.mapv_inplace(|v| (v - max).exp());
            let sum: f32 = row.sum();
            if sum > 0.0 {
                row.mapv_inplace(|v| v / sum);
            }
        }

        scores
    }
}

impl InferenceBackend for PooledLinear {
    fn run(
        &self,
        inputs: &[(&str, InputTensor)],
    ) -> Result<Vec<(String, OutputTensor)>, BackendError> {
        let (_, tensor) = inputs
            .first()
            .ok_or_else(|| BackendError::InvalidInput("no input tensor given".to_string()))?;

        let batch = tensor
            .as_f32()
            .view()
            .into_dimensionality::<Ix4>()
            .map_err(|_| {
                BackendError::InvalidInput(format!(
                    "expected [N, 3, H, W] input, got {:?}",
                    tensor.shape()
                ))
            })?;

        if batch.dim().1 != CHANNELS {
            return Err(BackendError::InvalidInput(format!(
                "expected {} channels, got {}",
                CHANNELS,
                batch.dim().1
            )));
        }

        let scores = self.forward(batch);
        Ok(vec![(
            self.output_names[0].clone(),
            OutputTensor::Float32(scores.into_dyn()),
        )])
    }

    fn input_names(&self) -> &[String] {
        &self.input_names
    }

    fn output_names(&self) -> &[String] {
        &self.output_names
    }
}
