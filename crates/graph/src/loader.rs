use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::store::GraphStore;

pub const DEFAULT_BATCH_SIZE: usize = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoaderConfig {
    pub batch_size: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Counts from one load run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadOutcome {
    pub batches_committed: usize,
    pub batches_failed: usize,
    pub statements_executed: usize,
    pub statements_abandoned: usize,
}

/// Writes sanitized statements in fixed-size transactional batches.
///
/// A failing batch is rolled back and logged; loading continues with the
/// next batch, so earlier and later batches are unaffected.
pub struct GraphLoader {
    store: Arc<dyn GraphStore>,
    config: LoaderConfig,
}

impl GraphLoader {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self::with_config(store, LoaderConfig::default())
    }

    pub fn with_config(store: Arc<dyn GraphStore>, config: LoaderConfig) -> Self {
        Self {
            store,
            config: LoaderConfig {
                batch_size: config.batch_size.max(1),
            },
        }
    }

    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    pub async fn load(&self, statements: &[String]) -> LoadOutcome {
        let mut outcome = LoadOutcome::default();
        let total_batches = statements.len().div_ceil(self.config.batch_size);

        for (batch_no, batch) in statements.chunks(self.config.batch_size).enumerate() {
            let first = batch_no * self.config.batch_size;
            match self.store.execute_batch(batch).await {
                Ok(()) => {
                    outcome.batches_committed += 1;
                    outcome.statements_executed += batch.len();
                    info!(
                        batch = batch_no + 1,
                        total_batches,
                        statements = batch.len(),
                        "Batch committed"
                    );
                }
                Err(e) => {
                    outcome.batches_failed += 1;
                    outcome.statements_abandoned += batch.len();
                    warn!(
                        batch = batch_no + 1,
                        first_statement = first,
                        last_statement = first + batch.len() - 1,
                        error = %e,
                        "Batch failed and was skipped"
                    );
                }
            }
        }

        outcome
    }
}
