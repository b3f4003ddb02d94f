//! The batched inference stage.

use std::time::Instant;

use tracing::{debug, trace};

use rinf_inference::{InferenceBackend, InputTensor};

use crate::batcher::{BatchConfig, Batcher};
use crate::error::{InferenceError, PipelineError};
use crate::model::ModelHandle;
use crate::record::{Batch, Keyed, Prediction, Sample};

/// Batches keyed samples, runs them through the worker's model and pairs
/// every output row with the key at the same batch position.
///
/// The only state kept between batches is the model handle (and the
/// samples still waiting in the batcher).
#[derive(Debug)]
pub struct RunInference {
    handle: ModelHandle,
    batcher: Batcher,
}

impl RunInference {
    pub fn new(handle: ModelHandle, config: BatchConfig) -> Self {
        Self {
            handle,
            batcher: Batcher::new(config),
        }
    }

    pub fn handle(&self) -> &ModelHandle {
        &self.handle
    }

    /// Load the model eagerly.
    pub fn open(&self) -> Result<(), PipelineError> {
        Ok(self.handle.open()?)
    }

    /// Release the model. Pending samples are discarded.
    pub fn close(&mut self) {
        if !self.batcher.is_empty() {
            debug!("Discarding {} pending samples on close", self.batcher.len());
            let _ = self.batcher.flush();
        }
        self.handle.close();
    }

    /// Queue a sample; runs a batch if the size or time trigger fires.
    pub fn push(
        &mut self,
        record: Keyed<Sample>,
        now: Instant,
    ) -> Result<Option<Vec<Keyed<Prediction>>>, PipelineError> {
        match self.batcher.push(record, now) {
            Some(batch) => self.run_batch(batch).map(Some),
            None => Ok(None),
        }
    }

    /// Runs the pending batch if the time trigger has fired.
    pub fn poll(&mut self, now: Instant) -> Result<Option<Vec<Keyed<Prediction>>>, PipelineError> {
        match self.batcher.poll(now) {
            Some(batch) => self.run_batch(batch).map(Some),
            None => Ok(None),
        }
    }

    /// Runs whatever is pending.
    pub fn finish(&mut self) -> Result<Option<Vec<Keyed<Prediction>>>, PipelineError> {
        match self.batcher.flush() {
            Some(batch) => self.run_batch(batch).map(Some),
            None => Ok(None),
        }
    }

    /// See [`Batcher::is_due`].
    pub fn is_due(&self, now: Instant) -> bool {
        self.batcher.is_due(now)
    }

    /// See [`Batcher::time_until_due`].
    pub fn time_until_due(&self, now: Instant) -> Option<std::time::Duration> {
        self.batcher.time_until_due(now)
    }

    /// Run every record through the stage, in bulk.
    pub fn run_all<I>(&mut self, records: I) -> Result<Vec<Keyed<Prediction>>, PipelineError>
    where
        I: IntoIterator<Item = Keyed<Sample>>,
    {
        let mut out = Vec::new();
        for record in records {
            if let Some(predictions) = self.push(record, Instant::now())? {
                out.extend(predictions);
            }
        }
        if let Some(predictions) = self.finish()? {
            out.extend(predictions);
        }
        Ok(out)
    }

    /// One inference call for one batch.
    ///
    /// Any failure fails the whole batch; nothing is emitted for it.
    pub fn run_batch(&self, batch: Batch) -> Result<Vec<Keyed<Prediction>>, PipelineError> {
        let backend = self.handle.get()?;
        let num_classes = self.handle.spec().params.num_classes;

        let size = batch.len();
        let fail = |reason: String| InferenceError {
            batch_size: size,
            first_key: batch.keys()[0].clone(),
            reason,
        };

        let stacked = batch.stack().map_err(fail)?;
        trace!("Running batch of shape {:?}", stacked.shape());

        let scores = backend
            .run_single(InputTensor::Float32(stacked.into_dyn()))
            .and_then(|output| output.into_scores())
            .map_err(|e| fail(e.to_string()))?;

        if scores.nrows() != size {
            return Err(fail(format!(
                "model returned {} rows for {} samples",
                scores.nrows(),
                size
            ))
            .into());
        }
        if scores.ncols() != num_classes {
            return Err(fail(format!(
                "model returned {} scores per sample, expected {}",
                scores.ncols(),
                num_classes
            ))
            .into());
        }

        debug!("Ran batch of {} samples", size);

        Ok(batch
            .into_keys()
            .into_iter()
            .zip(scores.outer_iter())
            .map(|(key, row)| Keyed::new(key, Prediction::new(row.to_owned())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelParams, ModelRegistry, ModelSpec, PooledLinear};
    use crate::storage::LocalStore;
    use ndarray::{Array1, Array3};
    use pretty_assertions::assert_eq;
    use rinf_inference::{BackendError, OutputTensor};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const WEIGHTS: &str =
        r#"{"weight": [[1, 0, 0], [0, 1, 0], [0, 0, 1]], "bias": [0, 0, 0]}"#;

    struct Fixture {
        _dir: tempfile::TempDir,
        loads: Arc<AtomicUsize>,
        registry: ModelRegistry,
        spec: ModelSpec,
    }

    /// Always answers with one row too few.
    struct ShortBackend(Vec<String>);

    impl InferenceBackend for ShortBackend {
        fn run(
            &self,
            inputs: &[(&str, InputTensor)],
        ) -> Result<Vec<(String, OutputTensor)>, BackendError> {
            let n = inputs[0].1.batch_len().saturating_sub(1);
            Ok(vec![(
                "out".to_string(),
                OutputTensor::Float32(ndarray::ArrayD::zeros(ndarray::IxDyn(&[n, 3]))),
            )])
        }

        fn input_names(&self) -> &[String] {
            &self.0
        }

        fn output_names(&self) -> &[String] {
            &self.0
        }
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.json");
        std::fs::write(&path, WEIGHTS).unwrap();

        let loads = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&loads);
        let mut registry = ModelRegistry::empty();
        registry.register("counted_linear", move |params: &ModelParams, bytes: &[u8]| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(PooledLinear::from_state_dict(bytes, params.num_classes)?)
                as Box<dyn InferenceBackend>)
        });
        registry.register("short", |_: &ModelParams, _: &[u8]| {
            Ok(Box::new(ShortBackend(vec!["x".to_string()])) as Box<dyn InferenceBackend>)
        });

        let spec = ModelSpec::new("counted_linear", path.to_string_lossy()).with_params(
            ModelParams {
                num_classes: 3,
                image_size: 4,
                ..ModelParams::default()
            },
        );

        Fixture {
            _dir: dir,
            loads,
            registry,
            spec,
        }
    }

    fn stage(fx: &Fixture, spec: ModelSpec, config: BatchConfig) -> RunInference {
        let handle =
            ModelHandle::from_registry(spec, &fx.registry, Arc::new(LocalStore::new())).unwrap();
        RunInference::new(handle, config)
    }

    /// A sample whose channel means are distinct per index.
    fn sample(i: usize) -> Sample {
        Sample::new(Array3::from_shape_fn((3, 4, 4), |(c, y, x)| {
            ((i * 7 + c * 3 + y + x) % 11) as f32 / 11.0
        }))
    }

    fn records(n: usize) -> Vec<Keyed<Sample>> {
        (0..n).map(|i| Keyed::new(format!("img{}.jpg", i), sample(i))).collect()
    }

    #[test]
    fn test_keys_stay_aligned() {
        let fx = fixture();
        let stage = stage(&fx, fx.spec.clone(), BatchConfig::fixed(5));

        let batch = Batch::new(records(5)).unwrap();
        let predictions = stage.run_batch(batch).unwrap();

        let keys: Vec<_> = predictions.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["img0.jpg", "img1.jpg", "img2.jpg", "img3.jpg", "img4.jpg"]);

        // Each row must be the one computed for that key's sample alone.
        for (i, p) in predictions.iter().enumerate() {
            let single = stage
                .run_batch(Batch::new(vec![Keyed::new("solo", sample(i))]).unwrap())
                .unwrap();
            assert_eq!(p.value, single[0].value);
        }
    }

    #[test]
    fn test_batch_size_invariance() {
        let fx = fixture();
        let expected: Vec<Keyed<Prediction>> = stage(&fx, fx.spec.clone(), BatchConfig::fixed(1))
            .run_all(records(7))
            .unwrap();

        for size in 2..=7 {
            let got = stage(&fx, fx.spec.clone(), BatchConfig::fixed(size))
                .run_all(records(7))
                .unwrap();
            assert_eq!(got.len(), expected.len());
            for (a, b) in got.iter().zip(expected.iter()) {
                assert_eq!(a.key, b.key);
                let diff: Array1<f32> = &a.value.scores - &b.value.scores;
                assert!(diff.iter().all(|d| d.abs() < 1e-6), "batch size {}", size);
            }
        }
    }

    #[test]
    fn test_model_loads_once_across_batches() {
        let fx = fixture();
        let mut stage = stage(&fx, fx.spec.clone(), BatchConfig::fixed(2));

        let predictions = stage.run_all(records(5)).unwrap();

        assert_eq!(predictions.len(), 5);
        assert_eq!(fx.loads.load(Ordering::SeqCst), 1);
        assert_eq!(stage.handle().load_count(), 1);
    }

    #[test]
    fn test_mixed_shapes_fail_whole_batch() {
        let fx = fixture();
        let stage = stage(&fx, fx.spec.clone(), BatchConfig::fixed(2));

        let batch = Batch::new(vec![
            Keyed::new("ok.jpg", sample(0)),
            Keyed::new("odd.jpg", Sample::new(Array3::zeros((3, 5, 5)))),
        ])
        .unwrap();

        match stage.run_batch(batch) {
            Err(PipelineError::Inference(e)) => {
                assert_eq!(e.batch_size, 2);
                assert_eq!(e.first_key, "ok.jpg");
            }
            other => panic!("expected inference error, got {:?}", other),
        }
    }

    #[test]
    fn test_short_output_fails_batch() {
        let fx = fixture();
        let spec = ModelSpec {
            architecture: "short".to_string(),
            ..fx.spec.clone()
        };
        let stage = stage(&fx, spec, BatchConfig::fixed(3));

        let result = stage.run_batch(Batch::new(records(3)).unwrap());
        assert!(matches!(result, Err(PipelineError::Inference(_))));
    }

    #[test]
    fn test_wrong_class_count_fails_batch() {
        let fx = fixture();
        let mut spec = fx.spec.clone();
        spec.params.num_classes = 4;
        // Weights still have three rows, so the load itself fails.
        let stage = stage(&fx, spec, BatchConfig::fixed(1));

        let result = stage.run_batch(Batch::new(records(1)).unwrap());
        assert!(matches!(result, Err(PipelineError::ModelLoad(_))));
    }

    #[test]
    fn test_close_discards_pending() {
        let fx = fixture();
        let mut stage = stage(&fx, fx.spec.clone(), BatchConfig::fixed(10));

        assert!(stage.push(records(1).remove(0), Instant::now()).unwrap().is_none());
        stage.close();

        assert!(stage.finish().unwrap().is_none());
        assert!(matches!(
            stage.run_batch(Batch::new(records(1)).unwrap()),
            Err(PipelineError::ModelLoad(_))
        ));
    }
}
