pub mod config;
pub mod metrics;
pub mod orchestrator;

pub use config::AppConfig;
pub use metrics::{MetricsSnapshot, RunMetrics};
pub use orchestrator::{Pipeline, RunReport};
