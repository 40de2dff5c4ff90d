//! One resumable collection: resume lookup, sampling, checkpoints and the
//! final snapshot.

use std::path::PathBuf;

use char_graph_core::{RunRecord, Totals, TrieAggregator};
use chrono::Local;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::error::{CollectorError, CollectorResult};
use crate::fingerprint::{Fingerprint, RunKey};
use crate::persistence::{
    NormalizationConfig, RunStore, Snapshot, SnapshotConfig, SnapshotKind, SnapshotMeta,
};
use crate::runner::{RunObserver, SamplingRunner};
use crate::sampler::{RequestParams, Sampler};

const CHECKPOINT_DIVISOR: usize = 5;

/// Checkpoint cadence used when none is configured: a fifth of the samples
/// still needed, at least one.
pub fn default_checkpoint_interval(needed: usize) -> usize {
    (needed / CHECKPOINT_DIVISOR).max(1)
}

/// What a finished [`CollectionSession::run`] did.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionOutcome {
    pub fingerprint: Fingerprint,
    /// Snapshot holding the complete result.
    pub path: PathBuf,
    /// Ok records carried over from a previous snapshot.
    pub reused: usize,
    /// Attempts issued in this session.
    pub sampled: usize,
    /// Ok and error counts over the records in `path`.
    pub totals: Totals,
    pub checkpoints_written: usize,
    /// The previous snapshot already had enough samples; nothing was written.
    pub up_to_date: bool,
}

/// Collects `n` samples for one [`RunKey`], resuming from the latest matching
/// snapshot in the store.
#[derive(Debug, Clone)]
pub struct CollectionSession {
    key: RunKey,
    n: usize,
    concurrency: usize,
    checkpoint_interval: Option<usize>,
    store: RunStore,
}

impl CollectionSession {
    pub fn new(key: RunKey, n: usize, store: RunStore) -> Self {
        Self {
            key,
            n,
            concurrency: 1,
            checkpoint_interval: None,
            store,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Completions between checkpoints; `None` picks
    /// [`default_checkpoint_interval`] once the outstanding count is known.
    pub fn with_checkpoint_interval(mut self, interval: Option<usize>) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    pub fn key(&self) -> &RunKey {
        &self.key
    }

    pub fn store(&self) -> &RunStore {
        &self.store
    }

    /// Request parameters derived from the run key.
    pub fn request_params(&self) -> RequestParams {
        RequestParams::new(self.key.temperature, self.key.max_tokens).with_debug(self.key.debug)
    }

    fn snapshot_config(&self) -> SnapshotConfig {
        SnapshotConfig {
            model: self.key.model.clone(),
            prompt: self.key.prompt.clone(),
            n: self.n,
            concurrency: self.concurrency,
            request: self.request_params().to_request_config(),
            normalization: NormalizationConfig::default(),
        }
    }

    fn validate(&self) -> CollectorResult<()> {
        if self.n == 0 {
            return Err(CollectorError::invalid_config("n must be at least 1"));
        }
        if self.concurrency == 0 || self.concurrency > Semaphore::MAX_PERMITS {
            return Err(CollectorError::invalid_config(format!(
                "concurrency must be between 1 and {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.checkpoint_interval == Some(0) {
            return Err(CollectorError::invalid_config(
                "checkpoint interval must be at least 1",
            ));
        }
        Ok(())
    }

    /// Ok records of the latest snapshot for `fingerprint`, with its path.
    ///
    /// An unreadable snapshot is logged and treated as absent.
    fn resume(
        &self,
        fingerprint: &Fingerprint,
    ) -> CollectorResult<Option<(PathBuf, Vec<RunRecord>)>> {
        let Some(path) = self.store.find_latest(fingerprint)? else {
            info!(fingerprint = %fingerprint, "No previous snapshot, starting fresh");
            return Ok(None);
        };

        match self.store.load(&path) {
            Ok(snapshot) => {
                let reused: Vec<RunRecord> = snapshot.ok_runs().cloned().collect();
                info!(
                    path = %path.display(),
                    reused = reused.len(),
                    discarded = snapshot.runs.len() - reused.len(),
                    "Resuming from snapshot"
                );
                Ok(Some((path, reused)))
            }
            Err(e) => {
                warn!(path = %path.display(), "Could not resume from snapshot: {e}");
                Ok(None)
            }
        }
    }

    /// Run the collection to completion with `sampler`.
    pub async fn run<S>(&self, sampler: &S) -> CollectorResult<CollectionOutcome>
    where
        S: Sampler + ?Sized,
    {
        self.validate()?;

        let fingerprint = self.key.fingerprint()?;
        let resumed = self.resume(&fingerprint)?;
        let (previous, reused) = match resumed {
            Some((path, records)) => (Some(path), records),
            None => (None, Vec::new()),
        };

        let needed = self.n.saturating_sub(reused.len());
        if needed == 0 {
            if let Some(path) = previous {
                info!(path = %path.display(), reused = reused.len(), "Snapshot already complete");
                return Ok(CollectionOutcome {
                    fingerprint,
                    path,
                    totals: Totals::from_records(&reused),
                    reused: reused.len(),
                    sampled: 0,
                    checkpoints_written: 0,
                    up_to_date: true,
                });
            }
        }

        let interval = self
            .checkpoint_interval
            .unwrap_or_else(|| default_checkpoint_interval(needed));
        debug!(
            fingerprint = %fingerprint,
            reused = reused.len(),
            needed = needed,
            checkpoint_interval = interval,
            "collection_plan"
        );

        let mut aggregator = TrieAggregator::new();
        aggregator.load_from_runs(&reused);

        let config = self.snapshot_config();
        let mut writer = CheckpointWriter {
            aggregator,
            reused: &reused,
            store: &self.store,
            config: &config,
            fingerprint: &fingerprint,
            written: 0,
        };

        let runner = SamplingRunner::new(
            self.key.model.clone(),
            self.key.prompt.clone(),
            self.request_params(),
            needed,
        )
        .with_concurrency(self.concurrency)
        .with_checkpoint_interval(interval);
        let fresh = runner.run(sampler, &mut writer).await;

        let checkpoints_written = writer.written;
        let aggregator = writer.aggregator;

        let reused_count = reused.len();
        let records: Vec<RunRecord> = reused.into_iter().chain(fresh).collect();
        let totals = Totals::from_records(&records);

        let meta = SnapshotMeta::at(Local::now(), SnapshotKind::Run);
        let snapshot = Snapshot::assemble(meta, config, records, &aggregator);
        let path = self.store.save(&snapshot, SnapshotKind::Run, &fingerprint)?;

        info!(
            path = %path.display(),
            ok = totals.ok,
            error = totals.error,
            "Collection complete"
        );

        Ok(CollectionOutcome {
            fingerprint,
            path,
            reused: reused_count,
            sampled: needed,
            totals,
            checkpoints_written,
            up_to_date: false,
        })
    }
}

/// Feeds successful texts into the trie and persists checkpoints.
struct CheckpointWriter<'a> {
    aggregator: TrieAggregator,
    reused: &'a [RunRecord],
    store: &'a RunStore,
    config: &'a SnapshotConfig,
    fingerprint: &'a Fingerprint,
    written: usize,
}

impl RunObserver for CheckpointWriter<'_> {
    fn on_result(&mut self, text: &str, _record: &RunRecord) {
        self.aggregator.add_text(text);
    }

    fn on_checkpoint(&mut self, completed: &[RunRecord]) {
        let records = self.reused.iter().chain(completed).cloned();
        let meta = SnapshotMeta::at(Local::now(), SnapshotKind::Checkpoint);
        let snapshot = Snapshot::assemble(meta, self.config.clone(), records, &self.aggregator);

        match self
            .store
            .save(&snapshot, SnapshotKind::Checkpoint, self.fingerprint)
        {
            Ok(_) => self.written += 1,
            Err(e) => warn!(completed = completed.len(), "Checkpoint write failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_checkpoint_interval() {
        assert_eq!(default_checkpoint_interval(0), 1);
        assert_eq!(default_checkpoint_interval(4), 1);
        assert_eq!(default_checkpoint_interval(10), 2);
        assert_eq!(default_checkpoint_interval(1000), 200);
    }

    #[test]
    fn test_request_params_follow_key() {
        let key = RunKey::new("m", "p", 0.3, 12, true);
        let params = CollectionSession::new(key, 5, RunStore::default()).request_params();
        assert_eq!(params.temperature, 0.3);
        assert_eq!(params.max_tokens, 12);
        assert!(params.wants_logprobs());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let key = RunKey::new("m", "p", 1.0, 10, false);
        let session = CollectionSession::new(key.clone(), 0, RunStore::default());
        assert!(session.validate().is_err());

        let session = CollectionSession::new(key.clone(), 3, RunStore::default())
            .with_concurrency(0);
        assert!(session.validate().is_err());

        let session = CollectionSession::new(key.clone(), 3, RunStore::default())
            .with_concurrency(Semaphore::MAX_PERMITS + 1);
        assert!(matches!(
            session.validate(),
            Err(CollectorError::InvalidConfig { .. })
        ));

        let session = CollectionSession::new(key, 3, RunStore::default())
            .with_checkpoint_interval(Some(0));
        assert!(session.validate().is_err());
    }
}
