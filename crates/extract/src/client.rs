use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{ExtractError, LlmError};
use crate::gate::RequestGate;
use crate::llm::{GenerationConfig, LanguageModel};
use crate::parser;
use crate::prompt;
use crate::schema::StructuredPayload;
use crate::session::ContextMode;

/// Anything that can turn a piece of text into a payload.
#[async_trait]
pub trait Extract: Send + Sync {
    async fn extract(&self, text: &str) -> Result<StructuredPayload, ExtractError>;
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total tries per extraction, the first prompt included
    pub max_attempts: usize,
    /// Pause after a quota error that did not say how long to wait
    pub quota_delay: Duration,
    /// `None` retries quota errors forever
    pub max_quota_retries: Option<usize>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            quota_delay: Duration::from_secs(8),
            max_quota_retries: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NarrativeOptions {
    pub language: String,
    pub temperature: f32,
}

impl Default for NarrativeOptions {
    fn default() -> Self {
        Self {
            language: "English".to_string(),
            temperature: 0.2,
        }
    }
}

pub const NARRATIVE_UNAVAILABLE: &str = "Narrative unavailable: hierarchy or schema missing.";

pub struct ExtractionClient {
    model: Arc<dyn LanguageModel>,
    gate: Arc<RequestGate>,
    context: ContextMode,
    retry: RetryPolicy,
    generation: GenerationConfig,
}

impl ExtractionClient {
    pub fn new(model: Arc<dyn LanguageModel>, gate: Arc<RequestGate>, context: ContextMode) -> Self {
        Self {
            model,
            gate,
            context,
            retry: RetryPolicy::default(),
            generation: GenerationConfig::deterministic(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    pub fn context(&self) -> &ContextMode {
        &self.context
    }

    /// Send one prompt through the gate, sleeping through quota errors.
    async fn send(&self, prompt: &str, config: &GenerationConfig) -> Result<String, ExtractError> {
        let mut quota_hits = 0;
        loop {
            self.gate.acquire().await;
            let history = self.context.history().await;

            match self.model.send(&history, prompt, config).await {
                Ok(reply) => {
                    self.context.record(prompt, &reply).await;
                    return Ok(reply);
                }
                Err(LlmError::QuotaExceeded { retry_after }) => {
                    quota_hits += 1;
                    if self.retry.max_quota_retries.is_some_and(|max| quota_hits > max) {
                        return Err(ExtractError::QuotaExhausted { attempts: quota_hits });
                    }
                    let delay = retry_after.unwrap_or(self.retry.quota_delay);
                    warn!(
                        retry_in_ms = delay.as_millis() as u64,
                        quota_hits,
                        "LLM quota exhausted, waiting"
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Extract a payload from `text`, re-prompting after replies that fail to parse.
    pub async fn extract_payload(&self, text: &str) -> Result<StructuredPayload, ExtractError> {
        let base_prompt = prompt::build_extraction_prompt(text);
        let attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let request = if attempt == 1 {
                base_prompt.clone()
            } else {
                prompt::build_corrective_prompt(&base_prompt)
            };

            let reply = self.send(&request, &self.generation).await?;
            match parser::parse(&reply) {
                Ok(payload) => {
                    debug!(
                        attempt,
                        nodes = payload.nodes.len(),
                        statements = payload.statements.len(),
                        "extraction parsed"
                    );
                    return Ok(payload);
                }
                Err(err) if attempt < attempts => {
                    warn!(attempt, max_attempts = attempts, error = %err, "invalid reply, re-prompting");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Prose summary of a graph from its outline and schema.
    pub async fn narrative(
        &self,
        hierarchy: &[Value],
        schema: &[Value],
        options: &NarrativeOptions,
    ) -> Result<String, ExtractError> {
        if hierarchy.is_empty() || schema.is_empty() {
            return Ok(NARRATIVE_UNAVAILABLE.to_string());
        }

        let hierarchy = serde_json::to_string(hierarchy).unwrap_or_default();
        let schema = serde_json::to_string(schema).unwrap_or_default();
        let request = prompt::build_narrative_prompt(&hierarchy, &schema, &options.language);

        info!(language = %options.language, "generating narrative");
        let config = GenerationConfig::with_temperature(options.temperature);
        let reply = self.send(&request, &config).await?;
        Ok(reply.trim().to_string())
    }
}

#[async_trait]
impl Extract for ExtractionClient {
    async fn extract(&self, text: &str) -> Result<StructuredPayload, ExtractError> {
        self.extract_payload(text).await
    }
}
