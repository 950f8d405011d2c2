use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static NON_IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("identifier pattern is valid"));

static CAMEL_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\p{Ll})(\p{Lu})").expect("camel-case pattern is valid"));

/// Make `raw` a safe graph identifier.
///
/// Spaces, punctuation and apostrophes become `_`, runs collapse, and a
/// leading digit gets an `N_` prefix so the result always starts with a letter.
pub fn to_identifier(raw: &str) -> String {
    let replaced = NON_IDENT.replace_all(raw.trim(), "_");
    let trimmed = replaced.trim_matches('_');

    match trimmed.chars().next() {
        None => "Unknown".to_string(),
        Some(c) if c.is_numeric() => format!("N_{trimmed}"),
        Some(_) => trimmed.to_string(),
    }
}

/// Relationship types are upper snake case: `worksFor` becomes `WORKS_FOR`.
pub fn to_relation_type(raw: &str) -> String {
    let split = CAMEL_BOUNDARY.replace_all(raw, "${1}_${2}");
    to_identifier(&split).to_uppercase()
}

pub struct LabelNormalizer {
    /// Maps lowercase identifier -> first spelling seen
    aliases: HashMap<String, String>,
}

impl LabelNormalizer {
    pub fn new() -> Self {
        Self {
            aliases: HashMap::new(),
        }
    }

    /// Normalize a node label, reusing the first spelling seen for labels
    /// that only differ by case.
    pub fn normalize(&mut self, label: &str) -> String {
        let ident = to_identifier(label);
        self.aliases
            .entry(ident.to_lowercase())
            .or_insert(ident)
            .clone()
    }

    pub fn get_aliases(&self) -> &HashMap<String, String> {
        &self.aliases
    }
}

impl Default for LabelNormalizer {
    fn default() -> Self {
        Self::new()
    }
}
