//! Cypher repair, batched loading and reporting against a graph store.

pub mod error;
pub mod loader;
pub mod report;
pub mod sanitizer;
pub mod store;

pub use error::StoreError;
pub use loader::{GraphLoader, LoadOutcome, LoaderConfig, DEFAULT_BATCH_SIZE};
pub use report::GraphReport;
pub use sanitizer::{sanitize, sanitize_statement};
pub use store::{GraphStore, Neo4jConfig, Neo4jStore};
