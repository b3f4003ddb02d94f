//! Record loading: locator -> decoded RGB image.

use std::sync::Arc;

use image::DynamicImage;
use tracing::trace;

use crate::error::RecordLoadError;
use crate::record::Keyed;
use crate::storage::{resolve_locator, ObjectStore};

/// Reads image bytes through an object store and decodes them.
#[derive(Clone)]
pub struct RecordLoader {
    store: Arc<dyn ObjectStore>,
    images_dir: Option<String>,
}

impl RecordLoader {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            images_dir: None,
        }
    }

    /// Prefix applied to relative locators.
    pub fn with_images_dir(mut self, dir: Option<String>) -> Self {
        self.images_dir = dir;
        self
    }

    /// Load one record. The returned key is the resolved locator.
    pub fn load(&self, name: &str) -> Result<Keyed<DynamicImage>, RecordLoadError> {
        let key = resolve_locator(self.images_dir.as_deref(), name);

        let bytes = self
            .store
            .read(&key)
            .map_err(|source| RecordLoadError::Read {
                key: key.clone(),
                source,
            })?;

        let image = image::load_from_memory(&bytes).map_err(|e| RecordLoadError::Decode {
            key: key.clone(),
            reason: e.to_string(),
        })?;
        trace!("Decoded {} ({}x{})", key, image.width(), image.height());

        Ok(Keyed::new(key, DynamicImage::ImageRgb8(image.to_rgb8())))
    }
}
