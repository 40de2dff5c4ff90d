//! The "perform one sample" capability consumed by the runner.

use async_trait::async_trait;
use char_graph_core::{LogprobContent, Usage};
use serde::{Deserialize, Serialize};

use crate::error::SamplingError;
use crate::persistence::RequestConfig;

/// Number of alternatives requested per token in debug mode.
pub const DEBUG_TOP_LOGPROBS: u8 = 5;

/// Fixed generation parameters shared by every attempt of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestParams {
    pub temperature: f64,
    pub max_tokens: u32,
    /// Ask the service not to retain the exchange.
    #[serde(default)]
    pub store: bool,
    /// Per-token log-probabilities with this many alternatives.
    #[serde(default)]
    pub top_logprobs: Option<u8>,
}

impl RequestParams {
    pub fn new(temperature: f64, max_tokens: u32) -> Self {
        Self {
            temperature,
            max_tokens,
            store: false,
            top_logprobs: None,
        }
    }

    /// Request log-probability detail when `debug` is set.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.top_logprobs = debug.then_some(DEBUG_TOP_LOGPROBS);
        self
    }

    pub fn wants_logprobs(&self) -> bool {
        self.top_logprobs.is_some()
    }

    /// Snapshot representation of these parameters.
    pub fn to_request_config(&self) -> RequestConfig {
        RequestConfig {
            max_output_tokens: self.max_tokens,
            temperature: Some(self.temperature),
            top_p: None,
            seed: None,
            store: self.store,
        }
    }
}

/// One sampling call.
#[derive(Debug, Clone, Copy)]
pub struct SampleRequest<'a> {
    /// Sequential attempt id within the current run.
    pub attempt: usize,
    pub model: &'a str,
    pub prompt: &'a str,
    pub params: &'a RequestParams,
}

/// What a successful sampling call returns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    pub text: String,
    pub usage: Option<Usage>,
    pub logprobs: Option<Vec<LogprobContent>>,
}

impl Sample {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Asynchronously produce one generated text.
///
/// Retry and backoff, if any, belong to the implementation; the runner
/// records whatever the final outcome is.
#[async_trait]
pub trait Sampler: Send + Sync {
    async fn sample(&self, request: SampleRequest<'_>) -> Result<Sample, SamplingError>;
}

#[async_trait]
impl<S: Sampler + ?Sized> Sampler for std::sync::Arc<S> {
    async fn sample(&self, request: SampleRequest<'_>) -> Result<Sample, SamplingError> {
        (**self).sample(request).await
    }
}
