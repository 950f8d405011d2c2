use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use extract::{FallbackConfig, NarrativeOptions, RetryPolicy};
use graph::{LoaderConfig, Neo4jConfig};

/// Run configuration, read from the environment (and `.env`) by [`AppConfig::from_env`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub neo4j: Neo4jSettings,
    pub llm: LlmSettings,
    pub concurrency: ConcurrencyConfig,
    pub retry: RetryConfig,
    pub chunking: ChunkingConfig,
    pub loader: LoaderSettings,
    pub narrative: NarrativeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Neo4jSettings {
    pub uri: String,
    pub user: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub database: String,
    pub pool_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(skip_serializing, default)]
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    /// One conversation for the whole run instead of a fresh context per request
    pub shared_session: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    pub max_workers: usize,
    pub requests_per_sec: f64,
    pub burst: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub quota_delay_secs: u64,
    pub max_quota_retries: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub document_tokens: usize,
    pub fallback_max_depth: usize,
    pub fallback_min_words: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderSettings {
    pub batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeConfig {
    pub enabled: bool,
    pub language: String,
    pub temperature: f32,
}

impl Default for Neo4jSettings {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "password".to_string(),
            database: "neo4j".to_string(),
            pool_size: 50,
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout_secs: 120,
            shared_session: true,
        }
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            requests_per_sec: 1.0,
            burst: 1,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            quota_delay_secs: 8,
            max_quota_retries: None,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            document_tokens: 3000,
            fallback_max_depth: 2,
            fallback_min_words: 120,
        }
    }
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            batch_size: graph::DEFAULT_BATCH_SIZE,
        }
    }
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            language: "English".to_string(),
            temperature: 0.2,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a configuration from any variable source; unset variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let string = |name: &str, default: String| lookup(name).unwrap_or(default);

        let config = Self {
            neo4j: Neo4jSettings {
                uri: string("NEO4J_URI", defaults.neo4j.uri),
                user: string("NEO4J_USER", defaults.neo4j.user),
                password: string("NEO4J_PASSWORD", defaults.neo4j.password),
                database: string("NEO4J_DB", defaults.neo4j.database),
                pool_size: parsed(&lookup, "NEO4J_POOL_SIZE", defaults.neo4j.pool_size)?,
            },
            llm: LlmSettings {
                api_key: string("GEMINI_API_KEY", defaults.llm.api_key),
                model: string("GEMINI_MODEL", defaults.llm.model),
                base_url: string("GEMINI_BASE_URL", defaults.llm.base_url),
                timeout_secs: defaults.llm.timeout_secs,
                shared_session: parsed(&lookup, "LLM_SHARED_SESSION", defaults.llm.shared_session)?,
            },
            concurrency: ConcurrencyConfig {
                max_workers: parsed(&lookup, "MAX_WORKERS", defaults.concurrency.max_workers)?,
                requests_per_sec: parsed(&lookup, "LLM_RATE_PER_SEC", defaults.concurrency.requests_per_sec)?,
                burst: parsed(&lookup, "LLM_BURST", defaults.concurrency.burst)?,
            },
            retry: RetryConfig {
                max_attempts: parsed(&lookup, "LLM_MAX_ATTEMPTS", defaults.retry.max_attempts)?,
                quota_delay_secs: defaults.retry.quota_delay_secs,
                max_quota_retries: match lookup("LLM_MAX_QUOTA_RETRIES") {
                    Some(raw) => Some(
                        raw.trim()
                            .parse()
                            .with_context(|| format!("LLM_MAX_QUOTA_RETRIES must be a number, got {raw:?}"))?,
                    ),
                    None => defaults.retry.max_quota_retries,
                },
            },
            chunking: ChunkingConfig {
                document_tokens: parsed(&lookup, "CHUNK_TOKENS", defaults.chunking.document_tokens)?,
                fallback_max_depth: parsed(&lookup, "FALLBACK_MAX_DEPTH", defaults.chunking.fallback_max_depth)?,
                fallback_min_words: parsed(&lookup, "FALLBACK_MIN_WORDS", defaults.chunking.fallback_min_words)?,
            },
            loader: LoaderSettings {
                batch_size: parsed(&lookup, "LOAD_BATCH_SIZE", defaults.loader.batch_size)?,
            },
            narrative: NarrativeConfig {
                language: string("NARRATIVE_LANGUAGE", defaults.narrative.language),
                ..defaults.narrative
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the request gate cannot enforce.
    pub fn validate(&self) -> Result<()> {
        let rate = self.concurrency.requests_per_sec;
        if !rate.is_finite() || rate <= 0.0 {
            bail!("LLM_RATE_PER_SEC must be a positive number, got {rate}");
        }
        if self.concurrency.burst == 0 {
            bail!("LLM_BURST must be at least 1");
        }
        Ok(())
    }

    pub fn neo4j_config(&self) -> Neo4jConfig {
        Neo4jConfig {
            uri: self.neo4j.uri.clone(),
            user: self.neo4j.user.clone(),
            password: self.neo4j.password.clone(),
            database: self.neo4j.database.clone(),
            max_connections: self.neo4j.pool_size,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            quota_delay: Duration::from_secs(self.retry.quota_delay_secs),
            max_quota_retries: self.retry.max_quota_retries,
        }
    }

    pub fn fallback_config(&self) -> FallbackConfig {
        FallbackConfig {
            max_depth: self.chunking.fallback_max_depth,
            min_words: self.chunking.fallback_min_words,
        }
    }

    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            batch_size: self.loader.batch_size,
        }
    }

    pub fn narrative_options(&self) -> NarrativeOptions {
        NarrativeOptions {
            language: self.narrative.language.clone(),
            temperature: self.narrative.temperature,
        }
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a valid value, got {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.neo4j.uri, "bolt://localhost:7687");
        assert_eq!(config.neo4j.pool_size, 50);
        assert_eq!(config.llm.model, "gemini-2.5-flash");
        assert!(config.llm.shared_session);
        assert_eq!(config.concurrency.max_workers, 4);
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.retry.max_quota_retries, None);
        assert_eq!(config.chunking.fallback_max_depth, 2);
        assert_eq!(config.loader.batch_size, 250);
        assert_eq!(config.narrative.language, "English");
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("NEO4J_URI", "bolt://db:7687"),
            ("NEO4J_DB", "docs"),
            ("NEO4J_POOL_SIZE", " 8 "),
            ("LLM_SHARED_SESSION", "false"),
            ("LLM_RATE_PER_SEC", "2.5"),
            ("LLM_MAX_QUOTA_RETRIES", "6"),
            ("LOAD_BATCH_SIZE", "100"),
            ("NARRATIVE_LANGUAGE", "Sinhala"),
        ]))
        .unwrap();

        assert_eq!(config.neo4j_config().uri, "bolt://db:7687");
        assert_eq!(config.neo4j_config().database, "docs");
        assert_eq!(config.neo4j_config().max_connections, 8);
        assert!(!config.llm.shared_session);
        assert_eq!(config.concurrency.requests_per_sec, 2.5);
        assert_eq!(config.retry_policy().max_quota_retries, Some(6));
        assert_eq!(config.retry_policy().quota_delay, Duration::from_secs(8));
        assert_eq!(config.loader_config().batch_size, 100);
        assert_eq!(config.narrative_options().language, "Sinhala");
        assert_eq!(config.narrative_options().temperature, 0.2);
    }

    #[test]
    fn test_invalid_number_is_reported() {
        let err = AppConfig::from_lookup(lookup(&[("MAX_WORKERS", "many")])).unwrap_err();
        assert!(err.to_string().contains("MAX_WORKERS"));
    }

    #[test]
    fn test_unusable_rate_limits_are_rejected() {
        for rate in ["0", "-1.5", "NaN", "inf"] {
            let err = AppConfig::from_lookup(lookup(&[("LLM_RATE_PER_SEC", rate)])).unwrap_err();
            assert!(err.to_string().contains("LLM_RATE_PER_SEC"), "{rate}: {err}");
        }
        let err = AppConfig::from_lookup(lookup(&[("LLM_BURST", "0")])).unwrap_err();
        assert!(err.to_string().contains("LLM_BURST"));
        // negative bursts do not parse as a count
        let err = AppConfig::from_lookup(lookup(&[("LLM_BURST", "-3")])).unwrap_err();
        assert!(err.to_string().contains("LLM_BURST"));
        assert!(AppConfig::from_lookup(lookup(&[("LLM_RATE_PER_SEC", "0.25"), ("LLM_BURST", "3")])).is_ok());
    }

    #[test]
    fn test_secrets_not_serialized() {
        let mut config = AppConfig::default();
        config.neo4j.password = "hunter2".to_string();
        config.llm.api_key = "secret-key".to_string();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("secret-key"));
    }
}
