//! Bounded-concurrency sampling runner.
//!
//! All attempts are driven from the caller's task: the in-flight futures sit
//! in a `FuturesUnordered` and a run-scoped semaphore caps how many of them
//! may be talking to the sampler at once. Observer hooks are called between
//! polls, so they never run concurrently with each other.

use char_graph_core::{ErrorInfo, RunRecord};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::sampler::{RequestParams, SampleRequest, Sampler};

/// Checkpoint cadence used when none is configured.
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 100;

/// Hooks invoked by [`SamplingRunner::run`] as attempts complete.
pub trait RunObserver {
    /// Called once per successful attempt, before the next completion is
    /// processed.
    fn on_result(&mut self, _text: &str, _record: &RunRecord) {}

    /// Called after every `checkpoint_interval` completions with everything
    /// completed so far, in completion order.
    fn on_checkpoint(&mut self, _completed: &[RunRecord]) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

/// Issues `n` independent sampling attempts for one prompt.
#[derive(Debug, Clone)]
pub struct SamplingRunner {
    model: String,
    prompt: String,
    params: RequestParams,
    n: usize,
    concurrency: usize,
    checkpoint_interval: usize,
}

impl SamplingRunner {
    pub fn new(
        model: impl Into<String>,
        prompt: impl Into<String>,
        params: RequestParams,
        n: usize,
    ) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            params,
            n,
            concurrency: 1,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
        }
    }

    /// Maximum attempts in flight at once, between 1 and
    /// [`Semaphore::MAX_PERMITS`].
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, Semaphore::MAX_PERMITS);
        self
    }

    /// Completions between two checkpoint callbacks.
    pub fn with_checkpoint_interval(mut self, interval: usize) -> Self {
        self.checkpoint_interval = interval.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn checkpoint_interval(&self) -> usize {
        self.checkpoint_interval
    }

    /// Run every attempt to completion and return one record per attempt id,
    /// sorted by id. Failed attempts become error records; they are not
    /// retried here.
    pub async fn run<S, O>(&self, sampler: &S, observer: &mut O) -> Vec<RunRecord>
    where
        S: Sampler + ?Sized,
        O: RunObserver + ?Sized,
    {
        debug!(
            n = self.n,
            concurrency = self.concurrency,
            checkpoint_interval = self.checkpoint_interval,
            "sampling_run_start"
        );

        let gate = Semaphore::new(self.concurrency);
        let mut in_flight: FuturesUnordered<_> = (0..self.n)
            .map(|attempt| self.attempt(sampler, &gate, attempt))
            .collect();

        let mut completed = Vec::with_capacity(self.n);
        while let Some(record) = in_flight.next().await {
            if record.is_ok() {
                observer.on_result(&record.text, &record);
            }
            completed.push(record);

            debug!(completed = completed.len(), total = self.n, "sample_complete");

            if completed.len() % self.checkpoint_interval == 0 {
                observer.on_checkpoint(&completed);
            }
        }

        completed.sort_by_key(|record| record.id);

        let failed = completed.iter().filter(|r| !r.is_ok()).count();
        debug!(total = completed.len(), failed = failed, "sampling_run_complete");

        completed
    }

    async fn attempt<S>(&self, sampler: &S, gate: &Semaphore, attempt: usize) -> RunRecord
    where
        S: Sampler + ?Sized,
    {
        // The permit is released on drop, whatever the outcome.
        let _permit = match gate.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                return RunRecord::failed(
                    attempt,
                    ErrorInfo::new("cancelled", "concurrency gate closed"),
                )
            }
        };

        let request = SampleRequest {
            attempt,
            model: &self.model,
            prompt: &self.prompt,
            params: &self.params,
        };

        match sampler.sample(request).await {
            Ok(sample) => RunRecord::ok(attempt, sample.text, sample.usage, sample.logprobs),
            Err(err) => {
                warn!(attempt = attempt, kind = err.kind(), "Sample failed: {err}");
                RunRecord::failed(attempt, ErrorInfo::from(&err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SamplingError;
    use crate::sampler::Sample;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Succeeds with `"sample-{id}"` unless the id is listed in `failing`.
    /// Later attempts finish first, so completion order is reversed.
    struct ScriptedSampler {
        n: usize,
        failing: Vec<usize>,
        active: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl ScriptedSampler {
        fn new(n: usize, failing: &[usize]) -> Self {
            Self {
                n,
                failing: failing.to_vec(),
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Sampler for ScriptedSampler {
        async fn sample(&self, request: SampleRequest<'_>) -> Result<Sample, SamplingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let delay = (self.n - request.attempt) as u64;
            tokio::time::sleep(Duration::from_millis(delay * 2)).await;

            self.active.fetch_sub(1, Ordering::SeqCst);
            if self.failing.contains(&request.attempt) {
                Err(SamplingError::RateLimited {
                    message: format!("attempt {}", request.attempt),
                })
            } else {
                Ok(Sample::text(format!("sample-{}", request.attempt)))
            }
        }
    }

    #[derive(Default)]
    struct Recorder {
        texts: Vec<String>,
        checkpoints: Vec<Vec<usize>>,
    }

    impl RunObserver for Recorder {
        fn on_result(&mut self, text: &str, _record: &RunRecord) {
            self.texts.push(text.to_string());
        }

        fn on_checkpoint(&mut self, completed: &[RunRecord]) {
            self.checkpoints
                .push(completed.iter().map(|r| r.id).collect());
        }
    }

    fn runner(n: usize) -> SamplingRunner {
        SamplingRunner::new("test-model", "prompt", RequestParams::new(1.0, 16), n)
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_failures_yield_every_record_sorted() {
        let sampler = ScriptedSampler::new(5, &[1, 3]);
        let mut recorder = Recorder::default();

        let records = runner(5)
            .with_concurrency(2)
            .run(&sampler, &mut recorder)
            .await;

        let ids: Vec<usize> = records.iter().map(|r| r.id).collect();
        let ok: Vec<bool> = records.iter().map(|r| r.is_ok()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert_eq!(ok, vec![true, false, true, false, true]);
        assert_eq!(records[1].error.as_ref().unwrap().kind, "rate_limited");
        assert_eq!(records[2].text, "sample-2");
        assert_eq!(recorder.texts.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_never_exceeds_gate() {
        let sampler = ScriptedSampler::new(8, &[]);
        runner(8)
            .with_concurrency(2)
            .run(&sampler, &mut NoopObserver)
            .await;

        assert_eq!(sampler.peak.load(Ordering::SeqCst), 2);
        assert_eq!(sampler.calls.load(Ordering::SeqCst), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_checkpoints_follow_completion_count() {
        let sampler = ScriptedSampler::new(10, &[4]);
        let mut recorder = Recorder::default();

        runner(10)
            .with_concurrency(10)
            .with_checkpoint_interval(2)
            .run(&sampler, &mut recorder)
            .await;

        let sizes: Vec<usize> = recorder.checkpoints.iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![2, 4, 6, 8, 10]);
        // All in flight at once, so the slowest (lowest id) finishes last.
        assert_eq!(recorder.checkpoints[0], vec![9, 8]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_samples_never_calls_sampler() {
        let sampler = ScriptedSampler::new(0, &[]);
        let mut recorder = Recorder::default();

        let records = runner(0).run(&sampler, &mut recorder).await;

        assert!(records.is_empty());
        assert!(recorder.checkpoints.is_empty());
        assert_eq!(sampler.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_builder_clamps_to_one() {
        let runner = runner(3).with_concurrency(0).with_checkpoint_interval(0);
        assert_eq!(runner.concurrency(), 1);
        assert_eq!(runner.checkpoint_interval(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_concurrency_is_capped() {
        let runner = runner(3).with_concurrency(usize::MAX);
        assert_eq!(runner.concurrency(), Semaphore::MAX_PERMITS);

        let sampler = ScriptedSampler::new(3, &[]);
        let records = runner.run(&sampler, &mut NoopObserver).await;
        assert_eq!(records.len(), 3);
    }
}
