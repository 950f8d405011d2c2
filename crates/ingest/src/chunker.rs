use crate::chunk::Chunk;

pub struct ChunkerConfig {
    pub max_tokens: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self { max_tokens: 3_000 }
    }
}

pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn chunk_text(&self, doc_id: &str, text: &str) -> Vec<Chunk> {
        split(text, self.config.max_tokens)
            .into_iter()
            .enumerate()
            .map(|(index, piece)| Chunk::new(doc_id.to_string(), index, piece))
            .collect()
    }
}

/// Cheap token estimate for one word: a quarter of its length, at least one.
pub fn word_tokens(word: &str) -> usize {
    (word.chars().count() / 4).max(1)
}

pub fn estimate_tokens(text: &str) -> usize {
    text.split_whitespace().map(word_tokens).sum()
}

/// Split `text` on word boundaries into pieces of at most `max_tokens`.
///
/// Space-joining the result gives back the whitespace-normalized input. A single
/// word larger than the budget becomes its own piece and is never cut.
pub fn split(text: &str, max_tokens: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    let mut buffer_tokens = 0;

    for word in text.split_whitespace() {
        let tokens = word_tokens(word);
        if !buffer.is_empty() && buffer_tokens + tokens > max_tokens {
            out.push(buffer.join(" "));
            buffer.clear();
            buffer_tokens = 0;
        }
        buffer.push(word);
        buffer_tokens += tokens;
    }

    if !buffer.is_empty() {
        out.push(buffer.join(" "));
    }
    out
}

/// Cut `text` into two word-bounded halves using half its token estimate as budget.
///
/// Returns `None` when there is nothing to cut (fewer than two words).
pub fn bisect(text: &str) -> Option<(String, String)> {
    let budget = estimate_tokens(text).div_ceil(2);
    let mut pieces = split(text, budget).into_iter();
    let first = pieces.next()?;
    let rest: Vec<String> = pieces.collect();
    if rest.is_empty() {
        return None;
    }
    Some((first, rest.join(" ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "The quick brown fox\njumps over   the lazy dog.\n\nA longer paragraph \
        follows with extraordinarily verbose vocabulary and\tsome tabs.";

    #[test]
    fn test_basic_chunking() {
        let chunker = Chunker::new(ChunkerConfig { max_tokens: 5 });
        let chunks = chunker.chunk_text("test-doc", SAMPLE);

        assert!(chunks.len() > 1);
        assert_eq!(chunks[0].doc_id, "test-doc");
        assert_eq!(chunks[1].index, 1);
        assert_ne!(chunks[0].chunk_id, chunks[1].chunk_id);
    }

    #[test]
    fn test_round_trip_reconstructs_normalized_text() {
        let normalized = SAMPLE.split_whitespace().collect::<Vec<_>>().join(" ");
        for budget in [1, 2, 3, 7, 50, 10_000] {
            let pieces = split(SAMPLE, budget);
            assert_eq!(pieces.join(" "), normalized, "budget {budget}");
            assert!(pieces.iter().all(|p| !p.is_empty()));
        }
    }

    #[test]
    fn test_pieces_respect_budget() {
        for budget in [1, 2, 4, 9] {
            for piece in split(SAMPLE, budget) {
                let single_word = piece.split_whitespace().count() == 1;
                assert!(estimate_tokens(&piece) <= budget || single_word, "{piece:?}");
            }
        }
    }

    #[test]
    fn test_oversized_word_is_kept_whole() {
        let word = "pneumonoultramicroscopicsilicovolcanoconiosis";
        let pieces = split(&format!("a {word} b"), 2);
        assert_eq!(pieces, vec!["a", word, "b"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(split("", 10).is_empty());
        assert!(split("  \n\t ", 10).is_empty());
    }

    #[test]
    fn test_word_tokens() {
        assert_eq!(word_tokens("a"), 1);
        assert_eq!(word_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens("a abcdefgh"), 3);
    }

    #[test]
    fn test_bisect_gives_two_halves() {
        let text = "one two three four five six seven eight";
        let (left, right) = bisect(text).unwrap();
        assert_eq!(left, "one two three four");
        assert_eq!(right, "five six seven eight");
        assert_eq!(format!("{left} {right}"), text);
    }

    #[test]
    fn test_bisect_single_word() {
        assert!(bisect("lonely").is_none());
        assert!(bisect("").is_none());
    }
}
