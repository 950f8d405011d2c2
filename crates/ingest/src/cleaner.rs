use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

static BULLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\u{2022}\u{2023}\u{25E6}\u{2043}\-\*]\s+").expect("bullet pattern is valid")
});

/// Lines seen on at least this share of all lines are page furniture.
const HEADER_FOOTER_FRACTION: f64 = 0.2;

/// Turn extracted paragraphs into one clean, single-spaced text.
pub fn clean_paragraphs(paragraphs: &[String]) -> String {
    let lines: Vec<&str> = paragraphs
        .iter()
        .flat_map(|p| p.lines())
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let lines = dedupe_headers_footers(lines, HEADER_FOOTER_FRACTION);
    let lines = fix_hyphenation(&lines);

    let joined = lines
        .iter()
        .map(|l| BULLET.replace(l, "").into_owned())
        .collect::<Vec<_>>()
        .join(" ");

    // `split_whitespace` also treats NBSP as a separator
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Repeated page headers and footers are kept once, at their first occurrence.
fn dedupe_headers_footers(lines: Vec<&str>, max_fraction: f64) -> Vec<&str> {
    let mut freq: HashMap<&str, usize> = HashMap::new();
    for line in &lines {
        *freq.entry(*line).or_insert(0) += 1;
    }

    let cutoff = max_fraction * lines.len() as f64;
    let mut seen = HashSet::new();
    lines
        .into_iter()
        .filter(|line| {
            let count = freq[line];
            if count > 1 && count as f64 >= cutoff {
                seen.insert(*line)
            } else {
                true
            }
        })
        .collect()
}

/// Join words broken across a line wrap with a trailing hyphen.
fn fix_hyphenation(lines: &[&str]) -> Vec<String> {
    let mut out = Vec::new();
    let mut buffer = String::new();

    for line in lines {
        if line.ends_with('-') && !line.ends_with("--") {
            buffer.push_str(&line[..line.len() - 1]);
        } else {
            buffer.push_str(line);
            out.push(std::mem::take(&mut buffer));
        }
    }
    if !buffer.is_empty() {
        out.push(buffer);
    }
    out
}
