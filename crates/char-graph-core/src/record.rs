//! Per-sample result records exchanged with the sampling layer and persisted
//! in snapshots.

use serde::{Deserialize, Serialize};

/// Outcome of a single sampling attempt.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// The sampler returned a text.
    #[default]
    Ok,
    /// The sampler failed; see [`RunRecord::error`].
    Error,
}

/// Classified failure attached to an error record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error class, e.g. `rate_limited` or `transport`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Human readable description.
    pub message: String,
    /// HTTP status reported by the service, when there was one.
    #[serde(default)]
    pub http_status: Option<u16>,
}

impl ErrorInfo {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            http_status: None,
        }
    }

    pub fn with_http_status(mut self, status: Option<u16>) -> Self {
        self.http_status = status;
        self
    }
}

/// Token accounting reported by the generation service.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

/// One alternative token with its log-probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogprobDetail {
    pub token: String,
    pub logprob: f64,
    #[serde(default)]
    pub bytes: Option<Vec<u8>>,
}

/// Log-probability detail for one generated token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogprobContent {
    pub token: String,
    pub logprob: f64,
    #[serde(default)]
    pub bytes: Option<Vec<u8>>,
    #[serde(default)]
    pub top_logprobs: Option<Vec<LogprobDetail>>,
}

/// Marker filled in by downstream classifiers; carried through untouched.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviationInfo {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub is_deviation: Option<bool>,
    #[serde(default)]
    pub matched_expected: Option<String>,
}

/// Result of one sampling attempt.
///
/// Only `status` and `text` matter to the aggregation engine; every other
/// field passes through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: usize,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub raw_text: Option<String>,
    #[serde(default)]
    pub status: RunStatus,
    #[serde(default)]
    pub error: Option<ErrorInfo>,
    #[serde(default)]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub deviation: Option<DeviationInfo>,
    #[serde(default)]
    pub logprobs: Option<Vec<LogprobContent>>,
}

impl RunRecord {
    /// Record for a successful attempt.
    pub fn ok(
        id: usize,
        text: impl Into<String>,
        usage: Option<Usage>,
        logprobs: Option<Vec<LogprobContent>>,
    ) -> Self {
        Self {
            id,
            text: text.into(),
            raw_text: None,
            status: RunStatus::Ok,
            error: None,
            usage,
            deviation: None,
            logprobs,
        }
    }

    /// Record for a failed attempt. The text is left empty.
    pub fn failed(id: usize, error: ErrorInfo) -> Self {
        Self {
            id,
            text: String::new(),
            raw_text: None,
            status: RunStatus::Error,
            error: Some(error),
            usage: None,
            deviation: None,
            logprobs: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == RunStatus::Ok
    }
}

/// Aggregate counts over a record list.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Totals {
    pub ok: usize,
    pub error: usize,
    /// Unicode scalar values across every record's text.
    pub total_chars: usize,
}

impl Totals {
    pub fn from_records(records: &[RunRecord]) -> Self {
        let ok = records.iter().filter(|r| r.is_ok()).count();
        Self {
            ok,
            error: records.len() - ok,
            total_chars: records.iter().map(|r| r.text.chars().count()).sum(),
        }
    }
}
