//! Architecture registry: identifier -> constructor.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rinf_inference::{BackendError, InferenceBackend};

use super::pooled_linear::PooledLinear;
use super::ModelParams;
use crate::error::ModelLoadError;

/// Builds a backend from constructor parameters and the raw weight blob.
pub type ModelConstructor = Arc<
    dyn Fn(&ModelParams, &[u8]) -> Result<Box<dyn InferenceBackend>, BackendError> + Send + Sync,
>;

/// Table of known architectures.
///
/// Lookups happen once, when a pipeline or handle is built; an unknown
/// identifier fails there rather than on first inference.
#[derive(Clone)]
pub struct ModelRegistry {
    constructors: BTreeMap<String, ModelConstructor>,
}

impl ModelRegistry {
    /// A registry with no architectures.
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// A registry with every architecture compiled into this build.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();

        registry.register("pooled_linear", |params, bytes| {
            let model = PooledLinear::from_state_dict(bytes, params.num_classes)?;
            Ok(Box::new(model) as Box<dyn InferenceBackend>)
        });

        #[cfg(feature = "native")]
        for name in ["onnx", "mobilenet_v2"] {
            registry.register(name, |params, bytes| {
                ensure_onnx(bytes)?;
                let backend = rinf_inference::OrtBackend::from_bytes(bytes, params.intra_threads)?;
                Ok(Box::new(backend) as Box<dyn InferenceBackend>)
            });
        }

        #[cfg(feature = "tract")]
        registry.register("onnx_tract", |params, bytes| {
            ensure_onnx(bytes)?;
            let size = params.image_size as usize;
            let backend = rinf_inference::TractBackend::from_bytes(bytes, &[3, size, size])?;
            Ok(Box::new(backend) as Box<dyn InferenceBackend>)
        });

        registry
    }

    /// Register (or replace) an architecture.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(&ModelParams, &[u8]) -> Result<Box<dyn InferenceBackend>, BackendError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors.insert(name.into(), Arc::new(constructor));
        self
    }

    /// Look up the constructor for an architecture.
    pub fn resolve(&self, name: &str) -> Result<ModelConstructor, ModelLoadError> {
        self.constructors
            .get(name)
            .cloned()
            .ok_or_else(|| ModelLoadError::UnknownArchitecture(name.to_string()))
    }

    /// Registered identifiers, sorted.
    pub fn architectures(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("architectures", &self.architectures())
            .finish()
    }
}

/// Reject PyTorch checkpoints before handing bytes to an ONNX runtime.
///
/// `torch.save` writes a zip archive (or a bare pickle in the legacy format);
/// those weights have to be exported to ONNX first.
#[cfg(any(feature = "native", feature = "tract"))]
fn ensure_onnx(bytes: &[u8]) -> Result<(), BackendError> {
    let pytorch = bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(&[0x80, 0x02]);
    if pytorch {
        return Err(BackendError::ModelLoad(
            "weights look like a PyTorch checkpoint; export the model to ONNX".to_string(),
        ));
    }
    Ok(())
}
