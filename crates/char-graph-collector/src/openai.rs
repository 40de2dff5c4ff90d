//! Sampler backed by an OpenAI-compatible `/chat/completions` endpoint.
//!
//! Works with any service speaking that protocol (OpenAI, Ollama, vLLM, ...).
//! Rate-limit, server-side and transport failures are retried with
//! exponential backoff before the failure is handed back to the runner.

use std::time::Duration;

use async_trait::async_trait;
use char_graph_core::{LogprobContent, Usage};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{CollectorError, CollectorResult, SamplingError};
use crate::sampler::{Sample, SampleRequest, Sampler};

/// Endpoint used when `OPENAI_API_URL` is not set.
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable overriding the endpoint.
pub const API_URL_ENV: &str = "OPENAI_API_URL";

const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    #[serde(default)]
    logprobs: Option<ChoiceLogprobs>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceLogprobs {
    #[serde(default)]
    content: Option<Vec<LogprobContent>>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: Option<u64>,
    #[serde(default)]
    completion_tokens: Option<u64>,
}

/// HTTP sampler for OpenAI-compatible chat completion APIs.
#[derive(Debug, Clone)]
pub struct OpenAiSampler {
    client: Client,
    api_url: String,
    api_key: String,
    max_retries: u32,
    backoff: Duration,
}

impl OpenAiSampler {
    /// Build a sampler. An empty API key is a configuration error.
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> CollectorResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(CollectorError::MissingCredential {
                name: API_KEY_ENV.to_string(),
            });
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| CollectorError::invalid_config(format!("http client: {e}")))?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_BACKOFF,
        })
    }

    /// Extra attempts for transient failures.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Delay before the first retry; doubles on each further retry.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_url.trim_end_matches('/'))
    }

    fn headers(&self) -> Result<HeaderMap, SamplingError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| SamplingError::Other(format!("invalid api key header: {e}")))?;
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }

    fn request_body(request: &SampleRequest<'_>) -> Value {
        let params = request.params;
        let mut body = json!({
            "model": request.model,
            "messages": [{"role": "user", "content": request.prompt}],
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
            "store": params.store,
        });
        if let Some(top) = params.top_logprobs {
            body["logprobs"] = json!(true);
            body["top_logprobs"] = json!(top);
        }
        body
    }

    async fn call_once(&self, request: &SampleRequest<'_>) -> Result<Sample, SamplingError> {
        let response = self
            .client
            .post(self.endpoint())
            .headers(self.headers()?)
            .json(&Self::request_body(request))
            .send()
            .await
            .map_err(|e| SamplingError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                SamplingError::RateLimited { message }
            } else {
                SamplingError::Api {
                    status: status.as_u16(),
                    message,
                }
            });
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| SamplingError::MalformedResponse(e.to_string()))?;
        sample_from_completion(completion)
    }
}

fn sample_from_completion(completion: ChatCompletionResponse) -> Result<Sample, SamplingError> {
    let usage = completion.usage.map(|u| Usage {
        input_tokens: u.prompt_tokens,
        output_tokens: u.completion_tokens,
    });
    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| SamplingError::MalformedResponse("response missing choices".into()))?;

    Ok(Sample {
        text: choice.message.content.unwrap_or_default(),
        usage,
        logprobs: choice.logprobs.and_then(|lp| lp.content),
    })
}

#[async_trait]
impl Sampler for OpenAiSampler {
    async fn sample(&self, request: SampleRequest<'_>) -> Result<Sample, SamplingError> {
        let mut retry = 0;
        loop {
            match self.call_once(&request).await {
                Ok(sample) => {
                    debug!(
                        attempt = request.attempt,
                        chars = sample.text.len(),
                        "llm response received"
                    );
                    return Ok(sample);
                }
                Err(err) if err.is_transient() && retry < self.max_retries => {
                    let delay = self.backoff * 2u32.saturating_pow(retry);
                    warn!(
                        attempt = request.attempt,
                        retry = retry + 1,
                        delay_ms = delay.as_millis() as u64,
                        "transient llm failure: {err}"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
