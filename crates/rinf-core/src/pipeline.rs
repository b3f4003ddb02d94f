//! In-process pipeline runner.
//!
//! Reads the locator listing, fans locators out round-robin to worker
//! threads, and collects classified records into a single sink. Each worker
//! loads, decodes and preprocesses its own records and owns its own
//! [`RunInference`] stage, so every worker has a private model copy.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::batcher::BatchConfig;
use crate::config::RinfConfig;
use crate::error::{PipelineError, Result};
use crate::loader::RecordLoader;
use crate::model::{ModelConstructor, ModelHandle, ModelRegistry, ModelSpec};
use crate::postprocess::classify;
use crate::preprocess::ImagePreprocessor;
use crate::record::{Keyed, Prediction, Sample};
use crate::sink::ResultSink;
use crate::stage::RunInference;
use crate::storage::{resolve_locator, ObjectStore};

/// What happens when a single record fails to load or preprocess.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// The first failing record fails the job.
    #[default]
    FailFast,
    /// Failing records are logged, reported and left out of the output.
    SkipRecord,
}

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The inputs and outputs of one job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSpec {
    /// Locator of the listing: a header, then one image locator per line.
    pub input: String,

    /// Where to write `<locator>,<class>` lines. Nothing is written if unset.
    pub output: Option<String>,

    /// Prefix for relative image locators.
    pub images_dir: Option<String>,

    pub model: ModelSpec,
}

/// Summary of a finished job.
#[derive(Debug, Default)]
pub struct JobReport {
    /// Locators read from the listing (after the header).
    pub records_read: usize,

    /// Records that made it to the sink.
    pub predictions: usize,

    /// Inference calls made across all workers.
    pub batches: usize,

    /// Records left out under [`FailurePolicy::SkipRecord`], with the reason.
    pub skipped: Vec<Keyed<String>>,

    pub elapsed: Duration,
}

/// Split a listing into locators, dropping header and blank lines.
pub fn read_locators(text: &str, skip_header_lines: usize) -> Vec<String> {
    text.lines()
        .skip(skip_header_lines)
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

enum WorkerEvent {
    Batch(Vec<Keyed<usize>>),
    Skipped(Keyed<String>),
}

/// A configured classification job.
pub struct Pipeline {
    job: JobSpec,
    constructor: ModelConstructor,
    store: Arc<dyn ObjectStore>,
    loader: RecordLoader,
    preprocessor: ImagePreprocessor,
    batch: BatchConfig,
    workers: usize,
    queue_capacity: usize,
    skip_header_lines: usize,
    policy: FailurePolicy,
    cancel: CancelToken,
}

impl Pipeline {
    /// Validate the configuration and resolve the model architecture.
    pub fn new(
        job: JobSpec,
        config: &RinfConfig,
        registry: &ModelRegistry,
        store: Arc<dyn ObjectStore>,
    ) -> Result<Self> {
        config.validate()?;
        let constructor = registry.resolve(&job.model.architecture)?;

        let loader = RecordLoader::new(Arc::clone(&store)).with_images_dir(job.images_dir.clone());

        Ok(Self {
            constructor,
            loader,
            preprocessor: config.preprocessor(),
            batch: config.batch_config(),
            workers: config.inference.workers,
            queue_capacity: config.inference.queue_capacity,
            skip_header_lines: config.pipeline.skip_header_lines,
            policy: config.pipeline.failure_policy,
            cancel: CancelToken::new(),
            store,
            job,
        })
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn job(&self) -> &JobSpec {
        &self.job
    }

    /// Run the job to completion.
    pub fn run(&self) -> Result<JobReport> {
        let start = Instant::now();
        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let listing = self.store.read(&self.job.input)?;
        let locators = read_locators(&String::from_utf8_lossy(&listing), self.skip_header_lines);
        info!("Read {} locators from {}", locators.len(), self.job.input);

        let mut sink = self
            .job
            .output
            .as_deref()
            .map(|locator| ResultSink::open(self.store.as_ref(), locator))
            .transpose()?;

        let mut report = JobReport {
            records_read: locators.len(),
            ..JobReport::default()
        };

        let workers = self.workers.min(locators.len()).max(1);
        let abort = CancelToken::new();
        let (event_tx, event_rx) = mpsc::channel();

        let outcome = thread::scope(|scope| -> Result<()> {
            let abort = &abort;
            let mut queues = Vec::with_capacity(workers);
            let mut handles = Vec::with_capacity(workers);

            for id in 0..workers {
                let (tx, rx) = mpsc::sync_channel::<String>(self.queue_capacity);
                let events = event_tx.clone();
                queues.push(tx);
                handles.push(scope.spawn(move || self.worker(id, rx, events, abort)));
            }
            drop(event_tx);

            let cancel = &self.cancel;
            scope.spawn(move || {
                for (i, locator) in locators.into_iter().enumerate() {
                    if cancel.is_cancelled() || abort.is_cancelled() {
                        break;
                    }
                    // A closed queue means that worker has stopped.
                    if queues[i % queues.len()].send(locator).is_err() {
                        break;
                    }
                }
            });

            let mut sink_error = None;
            for event in event_rx {
                match event {
                    WorkerEvent::Batch(records) => {
                        report.batches += 1;
                        report.predictions += records.len();
                        let Some(sink) = sink.as_mut().filter(|_| sink_error.is_none()) else {
                            continue;
                        };
                        if let Err(e) = records.iter().try_for_each(|r| sink.write(r)) {
                            abort.cancel();
                            sink_error = Some(e);
                        }
                    }
                    WorkerEvent::Skipped(record) => report.skipped.push(record),
                }
            }

            let mut failure: Option<PipelineError> = None;
            for (id, handle) in handles.into_iter().enumerate() {
                let result = handle
                    .join()
                    .unwrap_or_else(|_| Err(PipelineError::WorkerPanic(id)));
                if let Err(e) = result {
                    failure = match failure {
                        // Prefer the root cause over the cancellations it triggered.
                        None | Some(PipelineError::Cancelled) => Some(e),
                        kept => kept,
                    };
                }
            }

            if let Some(e) = sink_error {
                return Err(e.into());
            }
            failure.map_or(Ok(()), Err)
        });

        // Lines from batches emitted before a failure are kept.
        let flushed = sink.map(ResultSink::finish).transpose();
        outcome?;
        flushed?;

        report.elapsed = start.elapsed();
        info!(
            "Classified {} of {} records in {} batches ({} skipped) in {}ms",
            report.predictions,
            report.records_read,
            report.batches,
            report.skipped.len(),
            report.elapsed.as_millis()
        );

        Ok(report)
    }

    fn worker(
        &self,
        id: usize,
        queue: Receiver<String>,
        events: Sender<WorkerEvent>,
        abort: &CancelToken,
    ) -> Result<()> {
        let handle = ModelHandle::new(
            self.job.model.clone(),
            Arc::clone(&self.constructor),
            Arc::clone(&self.store),
        );
        let mut stage = RunInference::new(handle, self.batch.clone());

        let result = self.drive(id, &mut stage, &queue, &events, abort);
        stage.close();

        if let Err(e) = &result {
            if !matches!(e, PipelineError::Cancelled) {
                error!("Worker {} failed: {}", id, e);
            }
            abort.cancel();
        }
        result
    }

    fn drive(
        &self,
        id: usize,
        stage: &mut RunInference,
        queue: &Receiver<String>,
        events: &Sender<WorkerEvent>,
        abort: &CancelToken,
    ) -> Result<()> {
        stage.open()?;
        debug!("Worker {} ready", id);

        loop {
            if self.cancel.is_cancelled() || abort.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            // An overdue batch runs before the next record is taken.
            let now = Instant::now();
            if stage.is_due(now) {
                let ran = stage.poll(now)?;
                self.emit(ran, events, abort)?;
                continue;
            }

            let next = match stage.time_until_due(Instant::now()) {
                Some(wait) => queue.recv_timeout(wait),
                None => queue.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            let ran = match next {
                Ok(name) => match self.prepare(&name) {
                    Ok(record) => stage.push(record, Instant::now())?,
                    Err(e) => {
                        self.on_record_error(&name, e, events)?;
                        None
                    }
                },
                Err(RecvTimeoutError::Timeout) => stage.poll(Instant::now())?,
                Err(RecvTimeoutError::Disconnected) => {
                    let ran = stage.finish()?;
                    self.emit(ran, events, abort)?;
                    debug!("Worker {} drained its queue", id);
                    return Ok(());
                }
            };

            self.emit(ran, events, abort)?;
        }
    }

    /// Stages 2 and 3: load the record, then preprocess it.
    fn prepare(&self, name: &str) -> Result<Keyed<Sample>> {
        let record = self.loader.load(name)?;
        Ok(record.try_map(|image| self.preprocessor.preprocess(&image))?)
    }

    fn on_record_error(
        &self,
        name: &str,
        err: PipelineError,
        events: &Sender<WorkerEvent>,
    ) -> Result<()> {
        match self.policy {
            FailurePolicy::FailFast => Err(err),
            FailurePolicy::SkipRecord => {
                let key = resolve_locator(self.job.images_dir.as_deref(), name);
                warn!("Skipping {}: {}", key, err);
                // The receiver only goes away once every worker is done.
                let _ = events.send(WorkerEvent::Skipped(Keyed::new(key, err.to_string())));
                Ok(())
            }
        }
    }

    fn emit(
        &self,
        ran: Option<Vec<Keyed<Prediction>>>,
        events: &Sender<WorkerEvent>,
        abort: &CancelToken,
    ) -> Result<()> {
        let Some(predictions) = ran else {
            return Ok(());
        };

        if self.cancel.is_cancelled() || abort.is_cancelled() {
            debug!("Dropping finished batch of {} after cancellation", predictions.len());
            return Err(PipelineError::Cancelled);
        }

        let classified = predictions
            .into_iter()
            .map(classify)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        events
            .send(WorkerEvent::Batch(classified))
            .map_err(|_| PipelineError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::model::{ModelParams, PooledLinear};
    use crate::storage::LocalStore;
    use image::{Rgb, RgbImage};
    use rinf_inference::{BackendError, InferenceBackend, InputTensor, OutputTensor};
    use std::sync::atomic::AtomicUsize;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    const WEIGHTS: &str =
        r#"{"weight": [[1, 0, 0], [0, 1, 0], [0, 0, 1]], "bias": [0, 0, 0]}"#;

    struct Fixture {
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("weights.json"), WEIGHTS).unwrap();
            std::fs::create_dir(dir.path().join("images")).unwrap();
            Self { dir }
        }

        fn path(&self, name: &str) -> String {
            self.dir.path().join(name).to_string_lossy().into_owned()
        }

        fn image(&self, name: &str, color: [u8; 3]) {
            RgbImage::from_pixel(224, 224, Rgb(color))
                .save(self.dir.path().join("images").join(name))
                .unwrap();
        }

        fn listing(&self, names: &[&str]) -> String {
            let mut text = String::from("image_name\n");
            for name in names {
                text.push_str(name);
                text.push('\n');
            }
            std::fs::write(self.dir.path().join("input.txt"), text).unwrap();
            self.path("input.txt")
        }

        fn job(&self, input: String) -> JobSpec {
            JobSpec {
                input,
                output: Some(self.path("out/predictions.txt")),
                images_dir: Some(self.path("images")),
                model: self.config(FailurePolicy::FailFast).model_spec(self.path("weights.json")),
            }
        }

        fn config(&self, policy: FailurePolicy) -> RinfConfig {
            let mut config = RinfConfig::default();
            config.model.architecture = "pooled_linear".to_string();
            config.model.num_classes = 3;
            config.inference.workers = 2;
            config.inference.max_batch_size = 2;
            config.pipeline.failure_policy = policy;
            config
        }

        fn run(&self, job: JobSpec, policy: FailurePolicy) -> Result<JobReport> {
            Pipeline::new(
                job,
                &self.config(policy),
                &ModelRegistry::default(),
                Arc::new(LocalStore::new()),
            )?
            .run()
        }

        fn output_lines(&self) -> Vec<String> {
            let text = std::fs::read_to_string(self.path("out/predictions.txt")).unwrap();
            let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
            lines.sort();
            lines
        }
    }

    /// Local store whose image reads take a fixed time.
    struct SlowStore {
        inner: LocalStore,
        delay: Duration,
    }

    impl ObjectStore for SlowStore {
        fn read(&self, locator: &str) -> std::result::Result<Vec<u8>, StorageError> {
            if locator.ends_with(".png") {
                thread::sleep(self.delay);
            }
            self.inner.read(locator)
        }

        fn create(
            &self,
            locator: &str,
        ) -> std::result::Result<Box<dyn std::io::Write + Send>, StorageError> {
            self.inner.create(locator)
        }
    }

    fn slow_store(millis: u64) -> Arc<dyn ObjectStore> {
        Arc::new(SlowStore {
            inner: LocalStore::new(),
            delay: Duration::from_millis(millis),
        })
    }

    /// Pooled-linear model that cancels the job during its second batch.
    struct CancelOnSecondRun {
        inner: PooledLinear,
        runs: AtomicUsize,
        token: CancelToken,
    }

    impl InferenceBackend for CancelOnSecondRun {
        fn run(
            &self,
            inputs: &[(&str, InputTensor)],
        ) -> std::result::Result<Vec<(String, OutputTensor)>, BackendError> {
            let outputs = self.inner.run(inputs)?;
            if self.runs.fetch_add(1, Ordering::SeqCst) == 1 {
                self.token.cancel();
            }
            Ok(outputs)
        }

        fn input_names(&self) -> &[String] {
            self.inner.input_names()
        }

        fn output_names(&self) -> &[String] {
            self.inner.output_names()
        }
    }

    fn numbered_images(fx: &Fixture, count: usize) -> Vec<String> {
        (0..count)
            .map(|i| {
                let name = format!("img{:02}.png", i);
                fx.image(&name, [(i * 11) as u8, 255 - (i * 11) as u8, 40]);
                name
            })
            .collect()
    }

    fn image_key(fx: &Fixture, name: &str) -> String {
        Path::new(&fx.path("images")).join(name).to_string_lossy().into_owned()
    }

    #[test]
    fn test_read_locators() {
        let text = "header\r\na.jpg\r\n\n  \nsub/b.jpg\n";
        assert_eq!(read_locators(text, 1), vec!["a.jpg", "sub/b.jpg"]);
        assert_eq!(read_locators(text, 0), vec!["header", "a.jpg", "sub/b.jpg"]);
        assert!(read_locators("", 1).is_empty());
    }

    #[test]
    fn test_two_images_end_to_end() {
        let fx = Fixture::new();
        fx.image("a.png", [255, 0, 0]);
        fx.image("b.png", [0, 255, 0]);
        let input = fx.listing(&["a.png", "b.png"]);

        let report = fx.run(fx.job(input.clone()), FailurePolicy::FailFast).unwrap();
        assert_eq!(report.records_read, 2);
        assert_eq!(report.predictions, 2);

        let first = fx.output_lines();
        assert_eq!(
            first,
            vec![
                format!("{},0", image_key(&fx, "a.png")),
                format!("{},1", image_key(&fx, "b.png")),
            ]
        );

        fx.run(fx.job(input), FailurePolicy::FailFast).unwrap();
        assert_eq!(fx.output_lines(), first);
    }

    #[test]
    fn test_header_only_input() {
        let fx = Fixture::new();
        let input = fx.listing(&[]);

        let report = fx.run(fx.job(input), FailurePolicy::FailFast).unwrap();
        assert_eq!(report.predictions, 0);
        assert_eq!(report.batches, 0);
        assert_eq!(
            std::fs::read_to_string(fx.path("out/predictions.txt")).unwrap(),
            ""
        );
    }

    #[test]
    fn test_corrupt_record_is_isolated_when_skipping() {
        let fx = Fixture::new();
        fx.image("a.png", [255, 0, 0]);
        fx.image("b.png", [0, 0, 255]);
        std::fs::write(fx.dir.path().join("images/junk.jpg"), b"definitely not a jpeg").unwrap();
        let input = fx.listing(&["a.png", "junk.jpg", "b.png"]);

        let report = fx.run(fx.job(input), FailurePolicy::SkipRecord).unwrap();

        assert_eq!(report.records_read, 3);
        assert_eq!(report.predictions, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].key, image_key(&fx, "junk.jpg"));
        assert_eq!(
            fx.output_lines(),
            vec![
                format!("{},0", image_key(&fx, "a.png")),
                format!("{},2", image_key(&fx, "b.png")),
            ]
        );
    }

    #[test]
    fn test_corrupt_record_fails_job_by_default() {
        let fx = Fixture::new();
        fx.image("a.png", [255, 0, 0]);
        std::fs::write(fx.dir.path().join("images/junk.jpg"), b"nope").unwrap();
        let input = fx.listing(&["a.png", "junk.jpg"]);

        let err = fx.run(fx.job(input), FailurePolicy::FailFast).unwrap_err();
        assert!(matches!(err, PipelineError::RecordLoad(_)), "{:?}", err);
    }

    #[test]
    fn test_many_records_across_workers() {
        let fx = Fixture::new();
        let names = numbered_images(&fx, 23);
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let input = fx.listing(&refs);

        let report = fx.run(fx.job(input), FailurePolicy::FailFast).unwrap();
        assert_eq!(report.predictions, 23);
        assert!(report.batches >= 12);

        let lines = fx.output_lines();
        assert_eq!(lines.len(), 23);
        for (line, name) in lines.iter().zip(names.iter()) {
            assert!(line.starts_with(&format!("{},", image_key(&fx, name))), "{}", line);
        }
    }

    #[test]
    fn test_time_trigger_fires_while_records_keep_arriving() {
        let fx = Fixture::new();
        let names = numbered_images(&fx, 8);
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let input = fx.listing(&refs);

        let mut config = fx.config(FailurePolicy::FailFast);
        config.inference.workers = 1;
        config.inference.max_batch_size = 8;
        config.inference.max_wait_ms = Some(10);

        let report = Pipeline::new(fx.job(input), &config, &ModelRegistry::default(), slow_store(30))
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(report.predictions, 8);
        assert!(
            report.batches > 1,
            "10ms time trigger never fired over {:?}",
            report.elapsed
        );
        assert_eq!(fx.output_lines().len(), 8);
    }

    #[test]
    fn test_batch_finished_after_cancel_is_dropped() {
        let fx = Fixture::new();
        let names = numbered_images(&fx, 6);
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let input = fx.listing(&refs);

        let mut config = fx.config(FailurePolicy::FailFast);
        config.inference.workers = 1;
        config.inference.max_wait_ms = None;

        let token = CancelToken::new();
        let model_token = token.clone();
        let mut registry = ModelRegistry::empty();
        registry.register("cancel_on_second_run", move |params: &ModelParams, bytes: &[u8]| {
            Ok(Box::new(CancelOnSecondRun {
                inner: PooledLinear::from_state_dict(bytes, params.num_classes)?,
                runs: AtomicUsize::new(0),
                token: model_token.clone(),
            }) as Box<dyn InferenceBackend>)
        });

        let mut job = fx.job(input);
        job.model.architecture = "cancel_on_second_run".to_string();

        let result = Pipeline::new(job, &config, &registry, Arc::new(LocalStore::new()))
            .unwrap()
            .with_cancel_token(token)
            .run();

        assert!(matches!(result, Err(PipelineError::Cancelled)), "{:?}", result);
        // Only the first batch finished before the cancel.
        let lines = fx.output_lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with(&format!("{},", image_key(&fx, "img00.png"))));
        assert!(lines[1].starts_with(&format!("{},", image_key(&fx, "img01.png"))));
    }

    #[test]
    fn test_cancel_mid_run_keeps_only_whole_batches() {
        let fx = Fixture::new();
        let names = numbered_images(&fx, 20);
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let input = fx.listing(&refs);

        let mut config = fx.config(FailurePolicy::FailFast);
        config.inference.workers = 1;
        config.inference.max_wait_ms = None;

        let pipeline = Pipeline::new(fx.job(input), &config, &ModelRegistry::default(), slow_store(30))
            .unwrap();
        let token = pipeline.cancel_token();

        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(150));
            token.cancel();
        });
        let result = pipeline.run();
        canceller.join().unwrap();

        assert!(matches!(result, Err(PipelineError::Cancelled)), "{:?}", result);
        let lines = fx.output_lines();
        assert!(lines.len() < 20, "{} lines", lines.len());
        assert_eq!(lines.len() % 2, 0, "partial batch written: {:?}", lines);
        for (line, name) in lines.iter().zip(names.iter()) {
            assert!(line.starts_with(&format!("{},", image_key(&fx, name))), "{}", line);
        }
    }

    #[test]
    fn test_missing_weights_fails_job() {
        let fx = Fixture::new();
        fx.image("a.png", [255, 0, 0]);
        let input = fx.listing(&["a.png"]);

        let mut job = fx.job(input);
        job.model.weights = fx.path("nope.json");

        let err = fx.run(job, FailurePolicy::SkipRecord).unwrap_err();
        assert!(matches!(err, PipelineError::ModelLoad(_)), "{:?}", err);
    }

    #[test]
    fn test_unknown_architecture_fails_at_construction() {
        let fx = Fixture::new();
        let mut job = fx.job(fx.listing(&[]));
        job.model.architecture = "vit_giant".to_string();

        let result = Pipeline::new(
            job,
            &fx.config(FailurePolicy::FailFast),
            &ModelRegistry::default(),
            Arc::new(LocalStore::new()),
        );
        assert!(matches!(result, Err(PipelineError::ModelLoad(_))));
    }

    #[test]
    fn test_cancelled_job_emits_nothing() {
        let fx = Fixture::new();
        fx.image("a.png", [255, 0, 0]);
        let input = fx.listing(&["a.png"]);

        let token = CancelToken::new();
        token.cancel();
        let pipeline = Pipeline::new(
            fx.job(input),
            &fx.config(FailurePolicy::FailFast),
            &ModelRegistry::default(),
            Arc::new(LocalStore::new()),
        )
        .unwrap()
        .with_cancel_token(token);

        assert!(matches!(pipeline.run(), Err(PipelineError::Cancelled)));
        assert!(!Path::new(&fx.path("out/predictions.txt")).exists());
    }

    #[test]
    fn test_no_output_locator_writes_nothing() {
        let fx = Fixture::new();
        fx.image("a.png", [255, 0, 0]);
        let mut job = fx.job(fx.listing(&["a.png"]));
        job.output = None;

        let report = fx.run(job, FailurePolicy::FailFast).unwrap();
        assert_eq!(report.predictions, 1);
        assert!(!Path::new(&fx.path("out")).exists());
    }
}
