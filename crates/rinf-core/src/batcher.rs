//! Batch assembly with a size trigger and an optional time trigger.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::record::{Batch, Keyed, Sample};

/// Batching knobs.
///
/// Larger batches amortize per-call overhead but make early records wait
/// longer and raise peak memory per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Emit a batch as soon as this many samples are pending.
    pub max_batch_size: usize,

    /// Emit a partial batch once its oldest sample has waited this long.
    /// `None` disables the time trigger.
    pub max_wait: Option<Duration>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 8,
            max_wait: Some(Duration::from_millis(50)),
        }
    }
}

impl BatchConfig {
    /// Fixed-size batches, no time trigger.
    pub fn fixed(max_batch_size: usize) -> Self {
        Self {
            max_batch_size,
            max_wait: None,
        }
    }
}

/// Accumulates keyed samples into batches.
///
/// Time is passed in by the caller so the batcher itself never blocks.
#[derive(Debug)]
pub struct Batcher {
    config: BatchConfig,
    pending: Vec<Keyed<Sample>>,
    oldest: Option<Instant>,
}

impl Batcher {
    pub fn new(mut config: BatchConfig) -> Self {
        config.max_batch_size = config.max_batch_size.max(1);
        Self {
            pending: Vec::with_capacity(config.max_batch_size),
            config,
            oldest: None,
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Add a sample; returns the pending batch when either trigger fires.
    pub fn push(&mut self, record: Keyed<Sample>, now: Instant) -> Option<Batch> {
        if self.pending.is_empty() {
            self.oldest = Some(now);
        }
        self.pending.push(record);

        let full = self.pending.len() >= self.config.max_batch_size;
        if full || self.is_due(now) {
            self.take()
        } else {
            None
        }
    }

    /// Whether the time trigger has fired for the pending batch.
    pub fn is_due(&self, now: Instant) -> bool {
        self.time_until_due(now).is_some_and(|wait| wait.is_zero())
    }

    /// Returns the pending batch if the time trigger has fired.
    pub fn poll(&mut self, now: Instant) -> Option<Batch> {
        if self.is_due(now) {
            self.take()
        } else {
            None
        }
    }

    /// How long until the pending batch is due, if anything is pending and
    /// the time trigger is enabled.
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        let max_wait = self.config.max_wait?;
        let oldest = self.oldest.filter(|_| !self.pending.is_empty())?;
        Some((oldest + max_wait).saturating_duration_since(now))
    }

    /// Emit whatever is pending, regardless of triggers.
    pub fn flush(&mut self) -> Option<Batch> {
        self.take()
    }

    fn take(&mut self) -> Option<Batch> {
        self.oldest = None;
        let records = std::mem::replace(
            &mut self.pending,
            Vec::with_capacity(self.config.max_batch_size),
        );
        Batch::new(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use pretty_assertions::assert_eq;

    fn record(key: &str) -> Keyed<Sample> {
        Keyed::new(key, Sample::new(Array3::zeros((3, 2, 2))))
    }

    #[test]
    fn test_size_trigger() {
        let mut batcher = Batcher::new(BatchConfig::fixed(3));
        let now = Instant::now();

        assert!(batcher.push(record("a"), now).is_none());
        assert!(batcher.push(record("b"), now).is_none());
        let batch = batcher.push(record("c"), now).unwrap();

        assert_eq!(batch.keys(), &["a", "b", "c"]);
        assert!(batcher.is_empty());
        assert!(batcher.flush().is_none());
    }

    #[test]
    fn test_time_trigger() {
        let mut batcher = Batcher::new(BatchConfig {
            max_batch_size: 10,
            max_wait: Some(Duration::from_millis(100)),
        });
        let t0 = Instant::now();

        assert_eq!(batcher.time_until_due(t0), None);
        batcher.push(record("a"), t0);
        batcher.push(record("b"), t0 + Duration::from_millis(60));

        // Deadline runs from the oldest pending sample.
        assert_eq!(
            batcher.time_until_due(t0 + Duration::from_millis(60)),
            Some(Duration::from_millis(40))
        );
        assert!(batcher.poll(t0 + Duration::from_millis(99)).is_none());

        let batch = batcher.poll(t0 + Duration::from_millis(100)).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batcher.time_until_due(t0 + Duration::from_millis(200)), None);
    }

    #[test]
    fn test_overdue_batch_is_emitted_on_push() {
        let mut batcher = Batcher::new(BatchConfig {
            max_batch_size: 10,
            max_wait: Some(Duration::from_millis(100)),
        });
        let t0 = Instant::now();

        assert!(batcher.push(record("a"), t0).is_none());
        assert!(!batcher.is_due(t0 + Duration::from_millis(99)));

        // The deadline passed while "b" was being prepared.
        let batch = batcher.push(record("b"), t0 + Duration::from_millis(150)).unwrap();
        assert_eq!(batch.keys(), &["a", "b"]);
        assert!(batcher.is_empty());
    }

    #[test]
    fn test_no_time_trigger_waits_for_flush() {
        let mut batcher = Batcher::new(BatchConfig::fixed(4));
        let t0 = Instant::now();
        batcher.push(record("a"), t0);

        assert_eq!(batcher.time_until_due(t0), None);
        assert!(batcher.poll(t0 + Duration::from_secs(3600)).is_none());
        assert_eq!(batcher.flush().unwrap().keys(), &["a"]);
    }

    #[test]
    fn test_zero_batch_size_is_clamped() {
        let mut batcher = Batcher::new(BatchConfig::fixed(0));
        assert_eq!(batcher.config().max_batch_size, 1);
        assert!(batcher.push(record("a"), Instant::now()).is_some());
    }
}
