//! Keyed records and the sample/batch/prediction payloads they carry.

use ndarray::{stack, Array1, Array3, Array4, ArrayView3, Axis};
use serde::{Deserialize, Serialize};

/// A payload paired with the key of the input it came from.
///
/// The key is the resolved image locator and is never rewritten between
/// stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyed<V> {
    pub key: String,
    pub value: V,
}

impl<V> Keyed<V> {
    pub fn new(key: impl Into<String>, value: V) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    /// Transform the payload, keeping the key.
    pub fn map<W>(self, f: impl FnOnce(V) -> W) -> Keyed<W> {
        Keyed {
            key: self.key,
            value: f(self.value),
        }
    }

    /// Fallible variant of [`Keyed::map`].
    pub fn try_map<W, E>(self, f: impl FnOnce(V) -> Result<W, E>) -> Result<Keyed<W>, E> {
        Ok(Keyed {
            value: f(self.value)?,
            key: self.key,
        })
    }
}

/// A preprocessed image: `[channels, height, width]` floats.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample(Array3<f32>);

impl Sample {
    pub fn new(data: Array3<f32>) -> Self {
        Self(data)
    }

    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    pub fn view(&self) -> ArrayView3<'_, f32> {
        self.0.view()
    }

    pub fn into_inner(self) -> Array3<f32> {
        self.0
    }
}

/// A non-empty group of samples with their keys, index-aligned.
#[derive(Debug, Clone)]
pub struct Batch {
    keys: Vec<String>,
    samples: Vec<Sample>,
}

impl Batch {
    /// Build a batch. Returns `None` for an empty record list.
    pub fn new(records: Vec<Keyed<Sample>>) -> Option<Self> {
        if records.is_empty() {
            return None;
        }

        let (keys, samples) = records.into_iter().map(|r| (r.key, r.value)).unzip();
        Some(Self { keys, samples })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn into_keys(self) -> Vec<String> {
        self.keys
    }

    /// Stack the samples into one `[N, C, H, W]` tensor.
    ///
    /// Fails if the samples do not all share the first sample's shape.
    pub fn stack(&self) -> Result<Array4<f32>, String> {
        let expected = self.samples[0].shape();
        if let Some((i, odd)) = self
            .samples
            .iter()
            .enumerate()
            .find(|(_, s)| s.shape() != expected)
        {
            return Err(format!(
                "sample {} ({}) has shape {:?}, expected {:?}",
                i,
                self.keys[i],
                odd.shape(),
                expected
            ));
        }

        let views: Vec<_> = self.samples.iter().map(Sample::view).collect();
        stack(Axis(0), &views).map_err(|e| e.to_string())
    }
}

/// Per-sample model output: one score per class.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub scores: Array1<f32>,
}

impl Prediction {
    pub fn new(scores: Array1<f32>) -> Self {
        Self { scores }
    }
}
