pub mod client;
pub mod error;
pub mod fallback;
pub mod gate;
pub mod llm;
pub mod normalizer;
pub mod parser;
pub mod prompt;
pub mod schema;
pub mod session;

pub use client::{Extract, ExtractionClient, NarrativeOptions, RetryPolicy};
pub use error::{ExtractError, GateError, LlmError};
pub use fallback::{FallbackConfig, FallbackCoordinator};
pub use gate::RequestGate;
pub use llm::{GeminiClient, GenerationConfig, LanguageModel, Role, Turn};
pub use normalizer::{LabelNormalizer, to_identifier, to_relation_type};
pub use parser::parse;
pub use schema::{Node, Relationship, StructuredPayload};
pub use session::{ChatSession, ContextMode};
