use futures::future::{BoxFuture, FutureExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{info, warn};

use crate::client::Extract;
use crate::error::ExtractError;
use crate::schema::StructuredPayload;

#[derive(Debug, Clone)]
pub struct FallbackConfig {
    /// Split levels allowed below the original text
    pub max_depth: usize,
    /// Texts with fewer words are never split
    pub min_words: usize,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            min_words: 120,
        }
    }
}

/// Retries failed extractions by halving the text.
///
/// Halves are extracted one after the other and merged in order. A half that
/// still fails is logged and left out; only when every half fails does the
/// split itself fail.
pub struct FallbackCoordinator<E> {
    extractor: E,
    config: FallbackConfig,
    splits: AtomicUsize,
}

impl<E: Extract> FallbackCoordinator<E> {
    pub fn new(extractor: E, config: FallbackConfig) -> Self {
        Self {
            extractor,
            config,
            splits: AtomicUsize::new(0),
        }
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    /// Number of splits performed so far.
    pub fn splits(&self) -> usize {
        self.splits.load(Ordering::Relaxed)
    }

    pub async fn extract_with_fallback(&self, text: &str) -> Result<StructuredPayload, ExtractError> {
        self.extract_at(text, 0).await
    }

    fn extract_at<'a>(&'a self, text: &'a str, depth: usize) -> BoxFuture<'a, Result<StructuredPayload, ExtractError>> {
        async move {
            let err = match self.extractor.extract(text).await {
                Ok(payload) => return Ok(payload),
                Err(err) => err,
            };

            let words = text.split_whitespace().count();
            if depth >= self.config.max_depth || words < self.config.min_words {
                return Err(err);
            }
            let Some((left, right)) = ingest::bisect(text) else {
                return Err(err);
            };

            self.splits.fetch_add(1, Ordering::Relaxed);
            info!(depth, words, error = %err, "extraction failed, splitting text in two");

            let mut parts = Vec::with_capacity(2);
            for (part, half) in [left, right].iter().enumerate() {
                match self.extract_at(half, depth + 1).await {
                    Ok(payload) => parts.push(payload),
                    Err(e) => warn!(depth = depth + 1, part, error = %e, "sub-chunk skipped"),
                }
            }

            if parts.is_empty() {
                return Err(ExtractError::AllPartsFailed {
                    depth,
                    source: Box::new(err),
                });
            }
            Ok(StructuredPayload::merge(parts))
        }
        .boxed()
    }
}

#[async_trait::async_trait]
impl<E: Extract> Extract for FallbackCoordinator<E> {
    async fn extract(&self, text: &str) -> Result<StructuredPayload, ExtractError> {
        self.extract_with_fallback(text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Fails on any text containing `poison`, echoes the word count otherwise.
    struct StubExtractor {
        calls: Mutex<Vec<usize>>,
    }

    impl StubExtractor {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<usize> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Extract for StubExtractor {
        async fn extract(&self, text: &str) -> Result<StructuredPayload, ExtractError> {
            let words = text.split_whitespace().count();
            self.calls.lock().unwrap().push(words);
            if text.contains("poison") {
                return Err(ExtractError::MalformedResponse {
                    reason: "stub".to_string(),
                    raw: String::new(),
                });
            }
            Ok(StructuredPayload {
                statements: vec![format!("CREATE (:Part {{words: {words}}})")],
                leaders: vec!["part".to_string()],
                ..StructuredPayload::default()
            })
        }
    }

    fn words(word: &str, n: usize) -> String {
        vec![word; n].join(" ")
    }

    #[tokio::test]
    async fn test_success_returns_result_without_splitting() {
        let coordinator = FallbackCoordinator::new(StubExtractor::new(), FallbackConfig::default());
        let text = words("fine", 500);

        let payload = coordinator.extract_with_fallback(&text).await.unwrap();

        assert_eq!(payload.statements, vec!["CREATE (:Part {words: 500})"]);
        assert_eq!(coordinator.extractor().calls(), vec![500]);
        assert_eq!(coordinator.splits(), 0);
    }

    #[tokio::test]
    async fn test_always_failing_extractor_terminates() {
        for max_depth in [0, 1, 2, 3] {
            let config = FallbackConfig { max_depth, min_words: 1 };
            let coordinator = FallbackCoordinator::new(StubExtractor::new(), config);

            let err = coordinator
                .extract_with_fallback(&words("poison", 64))
                .await
                .unwrap_err();

            let expected_calls = (1usize << (max_depth + 1)) - 1;
            assert_eq!(coordinator.extractor().calls().len(), expected_calls);
            if max_depth == 0 {
                assert!(err.is_malformed());
            } else {
                assert!(matches!(err, ExtractError::AllPartsFailed { depth: 0, .. }));
            }
        }
    }

    #[tokio::test]
    async fn test_failed_half_contributes_nothing() {
        let coordinator = FallbackCoordinator::new(StubExtractor::new(), FallbackConfig::default());
        let text = format!("{} {}", words("fine", 100), words("poison", 100));

        let payload = coordinator.extract_with_fallback(&text).await.unwrap();

        // the poisoned half has fewer than 120 words and is not split again
        assert_eq!(payload.statements, vec!["CREATE (:Part {words: 100})"]);
        assert_eq!(coordinator.extractor().calls(), vec![200, 100, 100]);
        assert_eq!(coordinator.splits(), 1);
    }

    #[tokio::test]
    async fn test_small_text_is_not_split() {
        let coordinator = FallbackCoordinator::new(StubExtractor::new(), FallbackConfig::default());
        let result = coordinator.extract_with_fallback(&words("poison", 119)).await;

        assert!(result.unwrap_err().is_malformed());
        assert_eq!(coordinator.extractor().calls().len(), 1);
    }

    /// Only succeeds on texts of at most `max_words` words.
    struct SizeLimited {
        max_words: usize,
    }

    #[async_trait]
    impl Extract for SizeLimited {
        async fn extract(&self, text: &str) -> Result<StructuredPayload, ExtractError> {
            let words = text.split_whitespace().count();
            if words > self.max_words {
                return Err(ExtractError::MalformedResponse {
                    reason: "too long".to_string(),
                    raw: String::new(),
                });
            }
            Ok(StructuredPayload {
                statements: vec![format!("CREATE (:Part {{first: '{}'}})", text.split_whitespace().next().unwrap_or(""))],
                leaders: vec!["part".to_string()],
                ..StructuredPayload::default()
            })
        }
    }

    #[tokio::test]
    async fn test_merges_halves_in_order() {
        let coordinator = FallbackCoordinator::new(SizeLimited { max_words: 150 }, FallbackConfig::default());
        let text = format!("{} {}", words("left", 150), words("right", 150));

        let payload = coordinator.extract_with_fallback(&text).await.unwrap();

        assert_eq!(
            payload.statements,
            vec!["CREATE (:Part {first: 'left'})", "CREATE (:Part {first: 'right'})"]
        );
        assert_eq!(payload.leaders, vec!["part"]);
    }
}
