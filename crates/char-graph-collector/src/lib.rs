//! Resumable, bounded-concurrency sampling of a generative text model.
//!
//! A [`CollectionSession`] fingerprints its [`RunKey`], resumes from the
//! latest matching snapshot in a [`RunStore`], drives a [`SamplingRunner`]
//! for whatever is still missing and persists checkpoints along the way.
//!
//! The model itself is reached through the [`Sampler`] trait. With the `llm`
//! feature enabled, `OpenAiSampler` talks to any OpenAI-compatible
//! `/chat/completions` endpoint.
//!
//! ```text
//! RunKey ──fingerprint──► RunStore::find_latest ──► reuse ok records
//!                                                     │
//!        SamplingRunner ◄──── needed = n - reused ◄───┘
//!          │ on_result ──► TrieAggregator
//!          │ on_checkpoint ──► checkpoint-*.json
//!          ▼
//!        run-*.json
//! ```

mod collection;
mod error;
mod fingerprint;
mod persistence;
mod runner;
mod sampler;

#[cfg(feature = "llm")]
mod openai;

pub use collection::{default_checkpoint_interval, CollectionOutcome, CollectionSession};
pub use error::{CollectorError, CollectorResult, SamplingError};
pub use fingerprint::{Fingerprint, RunKey};
pub use persistence::{
    read_snapshot, write_snapshot, NormalizationConfig, RequestConfig, RunStore, Snapshot,
    SnapshotConfig, SnapshotKind, SnapshotMeta, SnapshotName, StatsData, DEFAULT_OUTPUT_DIR,
    TIMESTAMP_FORMAT,
};
pub use runner::{NoopObserver, RunObserver, SamplingRunner, DEFAULT_CHECKPOINT_INTERVAL};
pub use sampler::{RequestParams, Sample, SampleRequest, Sampler, DEBUG_TOP_LOGPROBS};

#[cfg(feature = "llm")]
pub use openai::{OpenAiSampler, API_KEY_ENV, API_URL_ENV, DEFAULT_API_URL};
