pub mod chunk;
pub mod chunker;
pub mod cleaner;
pub mod error;
pub mod reader;

pub use chunk::Chunk;
pub use chunker::{Chunker, ChunkerConfig, bisect, estimate_tokens, split};
pub use cleaner::clean_paragraphs;
pub use error::{IngestError, Result};
pub use reader::FileReader;

use sha2::{Digest, Sha256};
use std::path::Path;

/// Generate a stable document ID from file path
pub fn generate_doc_id(path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..16])
}

/// Ordered paragraphs of a PDF or text document.
pub async fn extract_text(file_path: &Path) -> Result<Vec<String>> {
    FileReader::read_paragraphs(file_path).await
}

/// Main ingestion pipeline: extract, clean and chunk one document
pub async fn ingest_file(file_path: &Path, max_tokens: usize) -> Result<Vec<Chunk>> {
    let paragraphs = extract_text(file_path).await?;
    let path_str = file_path.to_string_lossy().to_string();
    Ok(ingest_paragraphs(&path_str, &paragraphs, max_tokens))
}

/// Clean and chunk paragraphs that were extracted elsewhere.
pub fn ingest_paragraphs(source: &str, paragraphs: &[String], max_tokens: usize) -> Vec<Chunk> {
    let doc_id = generate_doc_id(source);
    let text = clean_paragraphs(paragraphs);

    let chunker = Chunker::new(ChunkerConfig { max_tokens });
    chunker.chunk_text(&doc_id, &text)
}
