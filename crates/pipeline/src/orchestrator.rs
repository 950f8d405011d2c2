use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use extract::{
    ContextMode, ExtractError, ExtractionClient, FallbackCoordinator, LanguageModel, RequestGate,
    StructuredPayload,
};
use graph::{GraphLoader, GraphStore, LoadOutcome};
use ingest::Chunk;

use crate::config::AppConfig;
use crate::metrics::{MetricsSnapshot, RunMetrics, TimedOperation};

/// What one run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub source: String,
    pub chunks: usize,
    /// Indices of chunks that yielded nothing, ascending
    pub failed_chunks: Vec<usize>,
    /// Sanitized statements in the order they were loaded
    pub statements: Vec<String>,
    /// `None` when the store step did not run
    pub load: Option<LoadOutcome>,
    /// True when no statements survived extraction and sanitizing
    pub graph_skipped: bool,
    pub narrative: Option<String>,
    pub metrics: MetricsSnapshot,
}

/// Drives a document from text to graph.
///
/// Chunks are extracted concurrently by up to `max_workers` tasks. All of
/// them share one [`RequestGate`] (and, in shared mode, one chat session).
/// Results are merged in completion order. A chunk that fails even after
/// fallback splitting is logged and left out; the run still loads whatever
/// the other chunks produced.
pub struct Pipeline {
    config: AppConfig,
    coordinator: FallbackCoordinator<ExtractionClient>,
    loader: Option<GraphLoader>,
    metrics: Arc<RunMetrics>,
}

impl Pipeline {
    /// Without a store the run stops after sanitizing (dry run).
    pub fn new(
        config: AppConfig,
        model: Arc<dyn LanguageModel>,
        store: Option<Arc<dyn GraphStore>>,
    ) -> Result<Self> {
        let gate = RequestGate::new(config.concurrency.requests_per_sec, config.concurrency.burst)
            .context("Invalid LLM rate limit")?;
        let gate = Arc::new(gate);
        let context = if config.llm.shared_session {
            ContextMode::shared()
        } else {
            ContextMode::Independent
        };
        let client = ExtractionClient::new(model, gate, context).with_retry(config.retry_policy());
        let coordinator = FallbackCoordinator::new(client, config.fallback_config());
        let loader = store.map(|store| GraphLoader::with_config(store, config.loader_config()));

        Ok(Self {
            config,
            coordinator,
            loader,
            metrics: RunMetrics::new(),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// Read, chunk, extract and load one document file.
    pub async fn run_file(&self, path: &Path) -> Result<RunReport> {
        let paragraphs = ingest::extract_text(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        info!(path = %path.display(), paragraphs = paragraphs.len(), "Document text extracted");

        Ok(self
            .run_paragraphs(&path.to_string_lossy(), &paragraphs)
            .await)
    }

    pub async fn run_paragraphs(&self, source: &str, paragraphs: &[String]) -> RunReport {
        let chunks = ingest::ingest_paragraphs(
            source,
            paragraphs,
            self.config.chunking.document_tokens,
        );
        info!(chunks = chunks.len(), "Document split into chunk(s)");
        self.run_chunks(source, &chunks).await
    }

    pub async fn run_chunks(&self, source: &str, chunks: &[Chunk]) -> RunReport {
        self.metrics.record_chunks(chunks.len());

        let workers = self.config.concurrency.max_workers.max(1);
        let results: Vec<(usize, Result<StructuredPayload, ExtractError>)> = stream::iter(chunks)
            .map(|chunk| self.extract_chunk(chunk))
            .buffer_unordered(workers)
            .collect()
            .await;
        self.metrics.record_splits(self.coordinator.splits());

        let mut payloads = Vec::with_capacity(results.len());
        let mut failed_chunks = Vec::new();
        for (index, result) in results {
            match result {
                Ok(payload) => payloads.push(payload),
                Err(_) => failed_chunks.push(index),
            }
        }
        failed_chunks.sort_unstable();

        let narrative_input = payloads
            .iter()
            .find(|p| !p.hierarchy.is_empty() && !p.schema.is_empty())
            .map(|p| (p.hierarchy.clone(), p.schema.clone()))
            .unwrap_or_default();

        let merged = StructuredPayload::merge(payloads);
        let statements = graph::sanitize(&merged.statements);
        self.metrics
            .record_statements(merged.statements.len(), statements.len());
        info!(
            generated = merged.statements.len(),
            sanitized = statements.len(),
            "Statements prepared"
        );

        let graph_skipped = statements.is_empty();
        let load = match (&self.loader, graph_skipped) {
            (_, true) => {
                warn!("No statements extracted, graph step skipped");
                None
            }
            (Some(loader), false) => {
                let timer = TimedOperation::start();
                let outcome = loader.load(&statements).await;
                self.metrics.record_load(&outcome, timer.elapsed());
                info!(
                    executed = outcome.statements_executed,
                    failed_batches = outcome.batches_failed,
                    "Graph load finished"
                );
                Some(outcome)
            }
            (None, false) => {
                info!(statements = statements.len(), "Dry run, store not touched");
                None
            }
        };

        let narrative = if self.config.narrative.enabled {
            self.narrative(&narrative_input.0, &narrative_input.1).await
        } else {
            None
        };

        RunReport {
            source: source.to_string(),
            chunks: chunks.len(),
            failed_chunks,
            statements,
            load,
            graph_skipped,
            narrative,
            metrics: self.metrics.snapshot(),
        }
    }

    async fn extract_chunk(&self, chunk: &Chunk) -> (usize, Result<StructuredPayload, ExtractError>) {
        let timer = TimedOperation::start();
        debug!(
            chunk = chunk.index,
            chunk_id = %chunk.chunk_id,
            words = chunk.word_count(),
            "Extracting chunk"
        );

        let result = self.coordinator.extract_with_fallback(&chunk.text).await;
        self.metrics.record_chunk(result.is_ok(), timer.elapsed());

        match &result {
            Ok(payload) => info!(
                chunk = chunk.index,
                chunk_id = %chunk.chunk_id,
                statements = payload.statements.len(),
                "Chunk extracted"
            ),
            Err(e) => warn!(
                chunk = chunk.index,
                chunk_id = %chunk.chunk_id,
                error = %e,
                "Chunk skipped"
            ),
        }
        (chunk.index, result)
    }

    async fn narrative(&self, hierarchy: &[Value], schema: &[Value]) -> Option<String> {
        let options = self.config.narrative_options();
        match self
            .coordinator
            .extractor()
            .narrative(hierarchy, schema, &options)
            .await
        {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(error = %e, "Narrative generation failed");
                None
            }
        }
    }
}
