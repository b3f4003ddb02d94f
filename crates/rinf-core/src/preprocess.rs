//! Image preprocessing for classification.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use ndarray::Array3;
use tracing::trace;

use crate::error::PreprocessError;
use crate::record::Sample;

/// ImageNet channel means, as expected by torchvision-trained classifiers.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet channel standard deviations.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Turns decoded images into fixed-shape normalized `[3, size, size]` samples.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    /// Output height and width.
    target_size: u32,
    mean: [f32; 3],
    std: [f32; 3],
}

impl ImagePreprocessor {
    /// Create a preprocessor producing 224x224 ImageNet-normalized samples.
    pub fn new() -> Self {
        Self {
            target_size: 224,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }

    /// Set the output resolution.
    pub fn with_target_size(mut self, size: u32) -> Self {
        self.target_size = size;
        self
    }

    /// Set per-channel normalization constants.
    pub fn with_normalization(mut self, mean: [f32; 3], std: [f32; 3]) -> Self {
        self.mean = mean;
        self.std = std;
        self
    }

    /// Shape of every sample this preprocessor produces.
    pub fn sample_shape(&self) -> [usize; 3] {
        let size = self.target_size as usize;
        [3, size, size]
    }

    /// Resize, convert to RGB, scale to `[0, 1]` and normalize.
    pub fn preprocess(&self, image: &DynamicImage) -> Result<Sample, PreprocessError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(PreprocessError::InvalidDimensions { width, height });
        }

        // Bilinear, matching the Resize transform classifiers are trained with.
        let size = self.target_size;
        let rgb = image.resize_exact(size, size, FilterType::Triangle).to_rgb8();
        trace!("Resized {}x{} -> {}x{}", width, height, size, size);

        let tensor = Array3::from_shape_fn(
            (3, size as usize, size as usize),
            |(c, y, x)| {
                let value = rgb.get_pixel(x as u32, y as u32)[c] as f32 / 255.0;
                (value - self.mean[c]) / self.std[c]
            },
        );

        let expected = self.sample_shape();
        if tensor.shape() != expected {
            return Err(PreprocessError::ShapeMismatch {
                expected: expected.to_vec(),
                actual: tensor.shape().to_vec(),
            });
        }

        Ok(Sample::new(tensor))
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new()
    }
}
