//! Per-worker model handle with a single guarded load.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tracing::{debug, info};

use rinf_inference::InferenceBackend;

use super::{ModelConstructor, ModelRegistry, ModelSpec};
use crate::error::ModelLoadError;
use crate::storage::ObjectStore;

enum HandleState {
    Unloaded,
    Loaded(Arc<dyn InferenceBackend>),
    Failed(String),
    Closed,
}

/// A lazily loaded, read-only model owned by one worker.
///
/// The first call to [`ModelHandle::get`] (or [`ModelHandle::open`]) reads
/// the weights and builds the backend while holding the state lock, so
/// concurrent first callers wait for that single load. Afterwards callers
/// get a cloned `Arc` and run inference without any lock held. A failed
/// load is remembered and never retried.
pub struct ModelHandle {
    spec: ModelSpec,
    constructor: ModelConstructor,
    store: Arc<dyn ObjectStore>,
    state: Mutex<HandleState>,
    loads: AtomicUsize,
}

impl ModelHandle {
    /// Create an unloaded handle from an already-resolved constructor.
    pub fn new(spec: ModelSpec, constructor: ModelConstructor, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            spec,
            constructor,
            store,
            state: Mutex::new(HandleState::Unloaded),
            loads: AtomicUsize::new(0),
        }
    }

    /// Resolve the spec's architecture in `registry` and create an unloaded handle.
    pub fn from_registry(
        spec: ModelSpec,
        registry: &ModelRegistry,
        store: Arc<dyn ObjectStore>,
    ) -> Result<Self, ModelLoadError> {
        let constructor = registry.resolve(&spec.architecture)?;
        Ok(Self::new(spec, constructor, store))
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    /// Load the model now instead of on first use.
    pub fn open(&self) -> Result<(), ModelLoadError> {
        self.get().map(|_| ())
    }

    /// The loaded backend, loading it on first call.
    pub fn get(&self) -> Result<Arc<dyn InferenceBackend>, ModelLoadError> {
        let mut state = self.lock()?;

        match &*state {
            HandleState::Loaded(backend) => return Ok(Arc::clone(backend)),
            HandleState::Failed(reason) => {
                return Err(ModelLoadError::PreviouslyFailed(reason.clone()));
            }
            HandleState::Closed => return Err(ModelLoadError::Closed),
            HandleState::Unloaded => {}
        }

        self.loads.fetch_add(1, Ordering::SeqCst);
        match self.load() {
            Ok(backend) => {
                *state = HandleState::Loaded(Arc::clone(&backend));
                Ok(backend)
            }
            Err(e) => {
                *state = HandleState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Release the backend. Batches already holding it finish normally.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if matches!(*state, HandleState::Loaded(_)) {
            debug!("Releasing {} model", self.spec.architecture);
        }
        *state = HandleState::Closed;
    }

    pub fn is_loaded(&self) -> bool {
        self.lock()
            .map(|state| matches!(*state, HandleState::Loaded(_)))
            .unwrap_or(false)
    }

    /// Number of times the load path has run (0 or 1).
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HandleState>, ModelLoadError> {
        self.state.lock().map_err(|_| ModelLoadError::Poisoned)
    }

    fn load(&self) -> Result<Arc<dyn InferenceBackend>, ModelLoadError> {
        let start = Instant::now();
        let spec = &self.spec;

        let bytes = self
            .store
            .read(&spec.weights)
            .map_err(|source| ModelLoadError::WeightSource {
                locator: spec.weights.clone(),
                source,
            })?;
        debug!("Read {} bytes of weights from {}", bytes.len(), spec.weights);

        let backend = (self.constructor)(&spec.params, &bytes).map_err(|e| {
            ModelLoadError::Incompatible {
                architecture: spec.architecture.clone(),
                reason: e.to_string(),
            }
        })?;

        info!(
            "Loaded {} model from {} in {}ms",
            spec.architecture,
            spec.weights,
            start.elapsed().as_millis()
        );

        Ok(Arc::from(backend))
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("spec", &self.spec)
            .field("loads", &self.load_count())
            .finish()
    }
}

impl Drop for ModelHandle {
    fn drop(&mut self) {
        self.close();
    }
}
