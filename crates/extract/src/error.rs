use std::time::Duration;
use thiserror::Error;

/// Failures reported by a language model backend.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("quota exceeded (retry after {retry_after:?})")]
    QuotaExceeded { retry_after: Option<Duration> },

    #[error("LLM request failed: {0}")]
    Request(String),

    #[error("LLM returned an empty response")]
    EmptyResponse,
}

/// Limits a [`RequestGate`](crate::gate::RequestGate) cannot enforce.
#[derive(Debug, Error, PartialEq)]
pub enum GateError {
    #[error("request rate must be a positive finite number of requests per second, got {0}")]
    InvalidRate(f64),

    #[error("burst must allow at least one request")]
    ZeroBurst,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    /// The reply never decoded into a payload. `raw` keeps the original text.
    #[error("malformed LLM response: {reason}")]
    MalformedResponse { reason: String, raw: String },

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("quota still exhausted after {attempts} retries")]
    QuotaExhausted { attempts: usize },

    #[error("every part of the split at depth {depth} failed")]
    AllPartsFailed {
        depth: usize,
        #[source]
        source: Box<ExtractError>,
    },
}

impl ExtractError {
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedResponse { .. })
    }
}
